//! Interactive prompts and MFA code sources.

use std::{io, process::Command};

use dialoguer::{Input, Select, theme::ColorfulTheme};
use log::{info, warn};

use crate::error::{Error, Result};

/// Length of a TOTP code issued by an MFA device.
pub const MFA_CODE_LENGTH: usize = 6;

pub type Validator = fn(&str) -> Result<(), &'static str>;

/// Interactive collaborator. Interrupting a prompt yields [`Error::Cancelled`].
pub trait Prompter {
    /// Returns the index of the chosen item.
    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize>;

    fn input(&self, prompt: &str, validate: Validator) -> Result<String>;
}

/// Client-side check of an MFA code. STS stays authoritative on correctness.
pub fn validate_mfa_code(code: &str) -> Result<(), &'static str> {
    if code.is_empty() {
        Err("a code is required")
    } else if code.len() != MFA_CODE_LENGTH {
        Err("the code must have exactly 6 digits")
    } else if !code.chars().all(|c| c.is_ascii_digit()) {
        Err("the code must be numeric")
    } else {
        Ok(())
    }
}

/// [`Prompter`] rendering to the terminal.
#[derive(Default)]
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl Prompter for TerminalPrompter {
    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize> {
        Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact_opt()
            .map_err(prompt_error)?
            .ok_or(Error::Cancelled)
    }

    fn input(&self, prompt: &str, validate: Validator) -> Result<String> {
        Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .validate_with(|input: &String| validate(input.trim()))
            .interact_text()
            .map(|input| input.trim().to_string())
            .map_err(prompt_error)
    }
}

/// Takes the item at the index returned by [`Prompter::select`].
pub fn take_selected<T>(items: Vec<T>, index: usize) -> Result<T> {
    let len = items.len();
    items.into_iter().nth(index).ok_or_else(|| {
        Error::Prompt(format!("selection {index} is out of range for {len} items"))
    })
}

fn prompt_error(e: dialoguer::Error) -> Error {
    match e {
        dialoguer::Error::IO(e) if e.kind() == io::ErrorKind::Interrupted => Error::Cancelled,
        dialoguer::Error::IO(e) => Error::Prompt(e.to_string()),
    }
}

/// 1Password item holding the TOTP of the MFA device.
#[derive(Debug, Clone)]
pub struct OnePasswordItem {
    pub account: String,
    pub item: String,
}

impl OnePasswordItem {
    pub fn new(account: Option<String>, item: Option<String>) -> Option<Self> {
        Some(Self {
            account: account?,
            item: item?,
        })
    }

    /// Reads the current code through the `op` CLI.
    ///
    /// Any failure, including a malformed code, returns `None` so the caller
    /// can fall back to asking the user.
    pub fn otp(&self) -> Option<String> {
        let output = Command::new("op")
            .args(["item", "get", "--account", &self.account, &self.item, "--otp"])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let otp = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if validate_mfa_code(&otp).is_ok() {
                    info!("Retrieved MFA code from 1Password");
                    return Some(otp);
                }
                warn!("1Password returned a malformed MFA code");
            }
            Ok(output) => warn!(
                "1Password exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => warn!("Failed to run the 1Password CLI: {e}"),
        }
        warn!("Falling back to manual input");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_six_digits() {
        assert_eq!(validate_mfa_code("012345"), Ok(()));
    }

    #[test]
    fn rejects_malformed_codes() {
        for code in ["", "12345", "1234567", "12a456", "12 456"] {
            assert!(validate_mfa_code(code).is_err(), "{code:?} accepted");
        }
    }

    #[test]
    fn interrupt_is_cancellation() {
        let interrupted = dialoguer::Error::IO(io::Error::from(io::ErrorKind::Interrupted));
        assert!(prompt_error(interrupted).is_cancelled());

        let broken = dialoguer::Error::IO(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(matches!(prompt_error(broken), Error::Prompt(_)));
    }

    #[test]
    fn selection_out_of_range_is_a_prompt_error() {
        let items = vec!["a".to_string(), "b".to_string()];
        assert_eq!(take_selected(items.clone(), 1).unwrap(), "b");

        let err = take_selected(items, 2).unwrap_err();
        assert!(matches!(&err, Error::Prompt(_)), "{err:?}");
        assert!(!err.is_cancelled());
    }

    #[test]
    fn one_password_needs_account_and_item() {
        assert!(OnePasswordItem::new(Some("work".into()), None).is_none());
        assert!(OnePasswordItem::new(None, Some("aws".into())).is_none());
        assert!(OnePasswordItem::new(Some("work".into()), Some("aws".into())).is_some());
    }
}
