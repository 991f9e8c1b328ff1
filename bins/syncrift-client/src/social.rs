//! friends / challenge subcommands

use anyhow::{anyhow, bail, Result};
use clap::{Args, Subcommand};
use syncrift::App;
use syncrift_core::{BattleCategory, Challenge, CodeforcesOptions, Profile};

use crate::require_login;

#[derive(Subcommand, Debug)]
pub enum FriendsCommand {
    /// List friends with their presence
    List,
    /// List incoming friend requests
    Pending,
    /// Send a friend request
    Add { username: String },
    /// Accept a friend request
    Accept { username: String },
    /// Decline a friend request
    Decline { username: String },
    /// Remove a friend
    Remove { username: String },
}

#[derive(Subcommand, Debug)]
pub enum ChallengeCommand {
    /// Challenge a friend
    Create {
        username: String,
        /// TB (typing), CSS or CF (codeforces)
        #[arg(long, short, default_value = "TB")]
        category: BattleCategory,
        #[command(flatten)]
        codeforces: CodeforcesArgs,
    },
    Accept { challenge_id: i64 },
    Decline { challenge_id: i64 },
    /// Challenges waiting for an answer from you
    Pending,
    /// Challenges you sent
    Sent,
}

/// Problem set for CF challenges; unset values take the defaults
#[derive(Args, Debug)]
pub struct CodeforcesArgs {
    #[arg(long)]
    questions: Option<u32>,
    #[arg(long)]
    min_rating: Option<u32>,
    #[arg(long)]
    max_rating: Option<u32>,
    /// Minutes
    #[arg(long)]
    duration: Option<u32>,
}

impl CodeforcesArgs {
    fn is_empty(&self) -> bool {
        self.questions.is_none()
            && self.min_rating.is_none()
            && self.max_rating.is_none()
            && self.duration.is_none()
    }

    fn options(&self) -> CodeforcesOptions {
        let defaults = CodeforcesOptions::default();
        CodeforcesOptions {
            questions: self.questions.unwrap_or(defaults.questions),
            min_rating: self.min_rating.unwrap_or(defaults.min_rating),
            max_rating: self.max_rating.unwrap_or(defaults.max_rating),
            duration: self.duration.unwrap_or(defaults.duration),
        }
    }
}

fn print_profiles(profiles: &[Profile]) {
    if profiles.is_empty() {
        println!("(none)");
    }
    for p in profiles {
        let status = p
            .status
            .map(|s| format!("{:?}", s).to_lowercase())
            .unwrap_or_else(|| "unknown".to_string());
        println!("{:<20} {}", p.username, status);
    }
}

fn print_challenges(challenges: &[Challenge]) {
    if challenges.is_empty() {
        println!("(none)");
    }
    for c in challenges {
        println!(
            "#{:<6} {} -> {} {} {}",
            c.challenge_id,
            c.sender_username.as_deref().unwrap_or("?"),
            c.recipient_username.as_deref().unwrap_or("?"),
            c.event_type.map(|e| e.code()).unwrap_or("-"),
            c.time_remaining_seconds
                .map(|s| format!("({}s left)", s))
                .unwrap_or_default()
        );
    }
}

pub async fn friends(app: &App, cmd: FriendsCommand) -> Result<()> {
    require_login(app).await?;
    let session = app.session();

    let result = match cmd {
        FriendsCommand::List => session.fetch_friends().await.map(|f| print_profiles(&f)),
        FriendsCommand::Pending => session
            .fetch_pending_requests()
            .await
            .map(|p| print_profiles(&p)),
        FriendsCommand::Add { username } => session
            .send_friend_request(&username)
            .await
            .map(|_| println!("Friend request sent to {}", username)),
        FriendsCommand::Accept { username } => session
            .accept_friend_request(&username)
            .await
            .map(|_| println!("{} is now your friend", username)),
        FriendsCommand::Decline { username } => session
            .decline_friend_request(&username)
            .await
            .map(|_| println!("Declined {}", username)),
        FriendsCommand::Remove { username } => session
            .remove_friend(&username)
            .await
            .map(|_| println!("Removed {}", username)),
    };
    result.map_err(|e| anyhow!(e.user_message()))
}

pub async fn challenge(app: &App, cmd: ChallengeCommand) -> Result<()> {
    require_login(app).await?;
    let session = app.session();

    let result = match cmd {
        ChallengeCommand::Create {
            username,
            category,
            codeforces,
        } => {
            let sent = match category {
                BattleCategory::Codeforces => {
                    session
                        .create_codeforces_challenge(&username, codeforces.options())
                        .await
                }
                _ if !codeforces.is_empty() => {
                    bail!("problem-set options only apply to CF challenges")
                }
                _ => session.create_challenge(&username, category).await,
            };
            sent.map(|c| println!("Challenge #{} sent to {}", c.challenge_id, username))
        }
        ChallengeCommand::Accept { challenge_id } => session
            .accept_challenge(challenge_id)
            .await
            .map(|_| println!("Accepted challenge #{}", challenge_id)),
        ChallengeCommand::Decline { challenge_id } => session
            .decline_challenge(challenge_id)
            .await
            .map(|_| println!("Declined challenge #{}", challenge_id)),
        ChallengeCommand::Pending => session
            .pending_challenges()
            .await
            .map(|c| print_challenges(&c)),
        ChallengeCommand::Sent => session.sent_challenges().await.map(|c| print_challenges(&c)),
    };
    result.map_err(|e| anyhow!(e.user_message()))
}
