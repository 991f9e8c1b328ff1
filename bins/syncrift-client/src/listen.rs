//! Long-running mode: stay connected, print notifications and follow battles

use std::collections::HashSet;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use syncrift::{App, Stage};
use syncrift_core::BattleConfig;
use syncrift_session::NotificationKind;
use tracing::{info, warn};

use crate::require_login;

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Send the ready signal as soon as a battle is created
    #[arg(long)]
    pub auto_ready: bool,

    /// Accept incoming challenges automatically
    #[arg(long)]
    pub accept_challenges: bool,

    /// File whose contents are submitted when a battle starts, `-` for stdin
    #[arg(long, conflicts_with = "answer")]
    pub answer_file: Option<PathBuf>,

    /// Text submitted when a battle starts
    #[arg(long)]
    pub answer: Option<String>,

    /// Exit after the first battle result
    #[arg(long)]
    pub once: bool,
}

impl ListenArgs {
    fn answer(&self) -> Result<Option<String>> {
        match (&self.answer, &self.answer_file) {
            (Some(text), _) => Ok(Some(text.clone())),
            (None, Some(path)) if path.as_os_str() == "-" => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("failed to read answer from stdin")?;
                Ok(Some(text))
            }
            (None, Some(path)) => std::fs::read_to_string(path)
                .map(Some)
                .with_context(|| format!("failed to read {}", path.display())),
            (None, None) => Ok(None),
        }
    }
}

pub async fn run(app: App, args: ListenArgs) -> Result<()> {
    let app = Arc::new(app);
    let username = require_login(&app).await?;
    let answer = args.answer()?;

    let mut stages = app.navigator().subscribe();
    let _watch = app.spawn_credential_watch();
    println!("Listening as {} (ctrl-c to stop)", username);

    let mut seen = HashSet::new();
    let mut poll = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            changed = stages.changed() => {
                if changed.is_err() {
                    break;
                }
                let stage = *stages.borrow_and_update();
                if on_stage(&app, &username, stage, &args, answer.as_deref()) {
                    break;
                }
            }
            _ = poll.tick() => {
                drain_inbox(&app, &mut seen, args.accept_challenges).await;
            }
        }
    }

    if let Some(channel) = app.channel() {
        channel.shutdown();
    }
    Ok(())
}

/// Returns true when listening should stop
fn on_stage(app: &App, username: &str, stage: Stage, args: &ListenArgs, answer: Option<&str>) -> bool {
    let battle = app.battle().snapshot();
    match (stage, battle) {
        (Stage::WaitingRoom, Some(session)) => {
            let opponent = session
                .opponent_of(username)
                .map(|p| p.username.as_str())
                .unwrap_or("unknown opponent");
            println!(
                "Battle #{} ({}) against {}",
                session.battle_id,
                session.category.code(),
                opponent
            );
            if args.auto_ready {
                if let Some(coordinator) = app.coordinator() {
                    coordinator.ready();
                }
            }
            false
        }
        (Stage::Battle, Some(session)) => {
            match session.config() {
                Ok(Some(config)) => print_config(&config),
                Ok(None) => {}
                Err(e) => warn!("Unreadable battle config: {}", e),
            }
            if let (Some(text), Some(coordinator)) = (answer, app.coordinator()) {
                coordinator.submit(text);
            }
            false
        }
        (Stage::Results, Some(session)) => {
            if let Some(result) = &session.result {
                let (own, theirs) = result.scores_for(username);
                let verdict = if result.is_winner(username) { "won" } else { "lost" };
                println!(
                    "You {} battle #{} ({} vs {})",
                    verdict,
                    session.battle_id,
                    own.unwrap_or("-"),
                    theirs.unwrap_or("-")
                );
            }
            args.once
        }
        (Stage::Landing, _) if !app.session().is_authenticated() => {
            println!("Session ended");
            true
        }
        _ => false,
    }
}

fn print_config(config: &BattleConfig) {
    match config {
        BattleConfig::Typing(c) => println!("Type within {}s:\n{}", c.duration, c.text),
        BattleConfig::Css(c) => println!("Replicate {} within {}s", c.image_url, c.duration),
        BattleConfig::Codeforces(c) => println!(
            "{} problem(s), rating {}-{}, {}s",
            c.questions.unwrap_or(1),
            c.min_rating.unwrap_or(800),
            c.max_rating.unwrap_or(3500),
            c.duration
        ),
    }
}

async fn drain_inbox(app: &App, seen: &mut HashSet<String>, accept_challenges: bool) {
    let fresh: Vec<_> = app
        .inbox()
        .entries()
        .into_iter()
        .filter(|e| seen.insert(e.id.clone()))
        .collect();

    for entry in fresh {
        println!("[{}] {}", entry.title(), entry.description());
        if accept_challenges && entry.kind == NotificationKind::Challenge {
            match app.inbox().accept(&entry.id, app.session()).await {
                Ok(true) => println!("Accepted challenge from {}", entry.from.as_deref().unwrap_or("?")),
                Ok(false) => {}
                Err(e) => warn!("Failed to accept challenge: {}", e.user_message()),
            }
        }
    }
    app.inbox().mark_all_read();
}
