//! Interactive prompts for connection values missing from the command line.

use dialoguer::{Confirm, Input, Password};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Result type for prompt operations.
pub type PromptResult<T> = Result<T, PromptError>;

/// Errors that can occur while prompting.
#[derive(Debug)]
pub enum PromptError {
    /// A value is missing and there is no terminal to ask on.
    NotInteractive(&'static str),
    /// Terminal IO failed or the prompt was interrupted.
    Io(std::io::Error),
}

impl std::fmt::Display for PromptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInteractive(flag) => {
                write!(f, "{} is required (stdin is not a terminal)", flag)
            }
            Self::Io(e) => write!(f, "prompt failed: {}", e),
        }
    }
}

impl std::error::Error for PromptError {}

impl From<dialoguer::Error> for PromptError {
    fn from(e: dialoguer::Error) -> Self {
        Self::Io(std::io::Error::other(e.to_string()))
    }
}

/// Connection values gathered from flags and the config file.
#[derive(Debug, Default)]
pub struct ConnectionValues {
    pub mdbfile: Option<PathBuf>,
    pub host: Option<String>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ConnectionValues {
    /// Flags whose values are still unknown, in prompt order.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.mdbfile.is_none() {
            missing.push("--mdbfile");
        }
        if self.host.is_none() {
            missing.push("--psql_host");
        }
        if self.database.is_none() {
            missing.push("--psql_db");
        }
        if self.user.is_none() {
            missing.push("--psql_user");
        }
        if self.password.is_none() {
            missing.push("--psql_pass");
        }
        missing
    }
}

/// Ask for every missing value. Returns whether anything was asked.
pub fn fill_missing(values: &mut ConnectionValues) -> PromptResult<bool> {
    let missing = values.missing();
    if missing.is_empty() {
        return Ok(false);
    }
    if !std::io::stdin().is_terminal() {
        return Err(PromptError::NotInteractive(missing[0]));
    }

    if values.mdbfile.is_none() {
        let path: String = Input::new()
            .with_prompt("Access database file")
            .interact_text()?;
        values.mdbfile = Some(PathBuf::from(path.trim()));
    }

    if values.host.is_none() {
        let host: String = Input::new()
            .with_prompt("PostgreSQL host")
            .default("localhost".to_string())
            .interact_text()?;
        values.host = Some(host);
    }

    if values.database.is_none() {
        let database: String = Input::new()
            .with_prompt("PostgreSQL database")
            .interact_text()?;
        values.database = Some(database);
    }

    if values.user.is_none() {
        let user: String = Input::new()
            .with_prompt("PostgreSQL user")
            .default("postgres".to_string())
            .interact_text()?;
        values.user = Some(user);
    }

    if values.password.is_none() {
        let password: String = Password::new()
            .with_prompt("PostgreSQL password")
            .allow_empty_password(true)
            .interact()?;
        values.password = Some(password);
    }

    Ok(true)
}

/// Confirm a yes/no option, defaulting to its current value.
pub fn confirm_flag(prompt: &str, current: bool) -> PromptResult<bool> {
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(current)
        .interact()?)
}
