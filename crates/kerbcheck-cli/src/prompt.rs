//! Interactive credential prompt.
//!
//! Used only when remediating and the password environment variable is unset.

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Password, theme::ColorfulTheme};

/// Ask for the password of `username` without echoing it.
pub fn prompt_password(username: &str) -> Result<String> {
    eprintln!(
        "{} SPN registration needs the password of {}",
        style("?").yellow().bold(),
        style(username).cyan()
    );

    Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Password")
        .interact()
        .context("Failed to read the administrator password")
}
