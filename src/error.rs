//! Error taxonomy shared by every command.
//!
//! Errors are plain values; `main` is the only place that decides how an error
//! turns into a process exit.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not determine home directory")]
    HomeDir,

    /// Store file missing or not parseable as INI.
    #[error("Failed to load AWS credentials file {}: {message}", path.display())]
    ConfigLoad { path: PathBuf, message: String },

    #[error(
        "AWS profile {long_term} not available! Please create a long-term profile with the suffix \"-mfa\", e.g. [{profile}] -> [{long_term}]"
    )]
    ProfileNotFound { profile: String, long_term: String },

    #[error("The profile {profile} does not have the key '{key}'")]
    IncompleteProfile { profile: String, key: &'static str },

    #[error("Expiration ({value}) in profile \"{profile}\" is in the wrong format ({expected}): {reason}")]
    MalformedExpiration {
        profile: String,
        value: String,
        expected: &'static str,
        reason: chrono::ParseError,
    },

    #[error("No MFA devices have been configured for this user")]
    NoMfaDevice,

    #[error("Invalid MFA code: {0}")]
    InvalidMfaCode(&'static str),

    #[error("An error occurred while listing MFA devices: {0}")]
    MfaDeviceListing(String),

    #[error("An error occurred while retrieving the session token: {0}")]
    TokenIssuance(String),

    #[error("Failed to write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The user interrupted a prompt.
    #[error("Cancelled")]
    Cancelled,

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("No profiles found in {}", .0.display())]
    NoProfiles(PathBuf),

    #[error("Invalid image reference '{reference}': {reason}")]
    InvalidImageReference { reference: String, reason: String },

    #[error("Image {repository}:{tag} not found")]
    ImageNotFound { repository: String, tag: String },

    #[error("ECR request failed: {0}")]
    Registry(String),

    #[error("The kube config could not be loaded from {}: {message}", path.display())]
    KubeconfigLoad { path: PathBuf, message: String },

    #[error("There are no contexts defined in {}", .0.display())]
    NoContexts(PathBuf),

    #[error("current-context is not configured in {}", .0.display())]
    NoCurrentContext(PathBuf),

    #[error("The context {0} does not exist in the kube config")]
    UnknownContext(String),

    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_profile_names_the_key() {
        let err = Error::IncompleteProfile {
            profile: "dev-mfa".to_string(),
            key: "aws_secret_access_key",
        };
        assert_eq!(
            err.to_string(),
            "The profile dev-mfa does not have the key 'aws_secret_access_key'"
        );
    }

    #[test]
    fn only_cancelled_is_cancelled() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::NoMfaDevice.is_cancelled());
    }
}
