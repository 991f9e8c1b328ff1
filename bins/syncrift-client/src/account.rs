//! login / signup / logout / whoami

use std::io::{self, BufRead, Write};

use anyhow::{bail, Result};
use clap::Args;
use syncrift::App;
use syncrift_core::SignupForm;

use crate::require_login;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Username or email
    pub identifier: String,

    /// Password; prompted for when omitted
    #[arg(long, env = "SYNCRIFT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args, Debug)]
pub struct SignupArgs {
    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub email: String,

    #[arg(long, default_value = "")]
    pub first_name: String,

    #[arg(long, default_value = "")]
    pub last_name: String,

    /// Password; prompted for when omitted
    #[arg(long, env = "SYNCRIFT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

fn prompt_password(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn login(app: &App, args: LoginArgs) -> Result<()> {
    let password = prompt_password(args.password)?;
    match app.session().login(&args.identifier, &password).await {
        Ok(username) => {
            println!("Logged in as {}", username);
            Ok(())
        }
        Err(e) => bail!(e.user_message()),
    }
}

pub async fn signup(app: &App, args: SignupArgs) -> Result<()> {
    let password = prompt_password(args.password)?;
    let form = SignupForm {
        first_name: args.first_name,
        last_name: args.last_name,
        username: args.username,
        email: args.email,
        password_confirmation: password.clone(),
        password,
    };

    match app.session().signup(&form).await {
        Ok(true) => println!("Account created, logged in as {}", form.username),
        Ok(false) => println!("Account created, log in with `syncrift login {}`", form.username),
        Err(e) => bail!(e.user_message()),
    }
    Ok(())
}

pub fn logout(app: &App) -> Result<()> {
    app.session().logout();
    println!("Logged out");
    Ok(())
}

pub async fn whoami(app: &App) -> Result<()> {
    let username = require_login(app).await?;
    println!("{}", username);
    Ok(())
}
