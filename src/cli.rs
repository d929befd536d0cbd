//! Command-line interface definitions.

use std::{ffi::OsString, path::PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::{
    error::Result,
    login::{DEFAULT_REGION, LoginConfig},
    prompt::OnePasswordItem,
    store::ProfileStore,
};

/// Day-to-day AWS and Kubernetes chores.
///
/// Refreshes MFA session credentials, picks AWS profiles, retags ECR images
/// and switches kube contexts.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate short-term credentials with MFA authentication
    #[command(visible_aliases = ["log", "l"])]
    Login(LoginArgs),

    /// Select an AWS profile from the credentials file
    #[command(visible_alias = "sp")]
    SelectProfile(SelectProfileArgs),

    /// Retag an ECR image, no downloads necessary
    Tag(TagArgs),

    /// Print the current kube context
    #[command(visible_alias = "cc")]
    CurrentContext(KubeArgs),

    /// Switch to another kube context
    #[command(visible_alias = "sc")]
    SwitchContext(KubeArgs),
}

#[derive(Args)]
pub struct LoginArgs {
    /// AWS profile to authenticate; its long-term keys live in `<profile>-mfa`
    #[arg(short, long, env = "AWS_PROFILE", default_value = "default")]
    pub profile: String,

    /// Path to AWS credentials file [default: ~/.aws/credentials]
    #[arg(short = 'c', long = "config", env = "AWS_SHARED_CREDENTIALS_FILE")]
    pub credentials_path: Option<PathBuf>,

    /// Session duration in seconds (900-129600) [default: chosen by STS]
    #[arg(
        short,
        long,
        env = "AWS_SESSION_DURATION",
        value_parser = clap::value_parser!(u32).range(900..=129_600)
    )]
    pub duration: Option<u32>,

    /// Region used when the long-term profile does not set one
    #[arg(long, default_value = DEFAULT_REGION)]
    pub region: String,

    /// 1Password account for automatic MFA code retrieval
    #[arg(long, env = "OPSKIT_OP_ACCOUNT")]
    pub op_account: Option<String>,

    /// 1Password item name containing the TOTP
    #[arg(long, env = "OPSKIT_OP_ITEM_NAME")]
    pub op_item_name: Option<String>,
}

impl LoginArgs {
    pub fn into_config(self) -> Result<LoginConfig> {
        Ok(LoginConfig {
            profile: self.profile,
            credentials_path: credentials_path(self.credentials_path)?,
            fallback_region: self.region,
            duration: self.duration,
            one_password: OnePasswordItem::new(self.op_account, self.op_item_name),
        })
    }
}

#[derive(Args)]
pub struct SelectProfileArgs {
    /// Path to AWS credentials file [default: ~/.aws/credentials]
    #[arg(short = 'c', long = "config", env = "AWS_SHARED_CREDENTIALS_FILE")]
    pub credentials_path: Option<PathBuf>,

    /// Only print the export command
    #[arg(long)]
    pub no_clipboard: bool,
}

impl SelectProfileArgs {
    pub fn credentials_path(&self) -> Result<PathBuf> {
        credentials_path(self.credentials_path.clone())
    }
}

#[derive(Args)]
pub struct TagArgs {
    /// Existing image, `repository:tag` or `tag`
    pub source: String,

    /// New tag, `repository:tag` or `tag`
    pub target: String,

    /// The ECR repository name, used for bare tags
    #[arg(short, long)]
    pub repository: Option<String>,

    /// AWS profile used for ECR
    #[arg(short, long)]
    pub profile: Option<String>,

    /// AWS region of the repository
    #[arg(long)]
    pub region: Option<String>,
}

#[derive(Args)]
pub struct KubeArgs {
    /// Kube config file [default: ~/.kube/config]
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<OsString>,
}

fn credentials_path(path: Option<PathBuf>) -> Result<PathBuf> {
    path.map_or_else(ProfileStore::default_path, Ok)
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, error::ErrorKind};

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("opskit").chain(args.iter().copied()))
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn login_flags() {
        let cli = parse(&["l", "-p", "dev", "-c", "/tmp/credentials", "-d", "3600"]).unwrap();
        let Command::Login(args) = cli.command else {
            panic!("expected login");
        };
        let config = args.into_config().unwrap();
        assert_eq!(config.profile, "dev");
        assert_eq!(config.credentials_path, PathBuf::from("/tmp/credentials"));
        assert_eq!(config.duration, Some(3600));
        assert_eq!(config.fallback_region, DEFAULT_REGION);
        assert!(config.one_password.is_none());
    }

    #[test]
    fn login_duration_is_bounded() {
        let err = parse(&["login", "-p", "dev", "-d", "60"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn tag_takes_two_images() {
        let cli = parse(&["tag", "1.0", "stable", "-r", "app"]).unwrap();
        let Command::Tag(args) = cli.command else {
            panic!("expected tag");
        };
        assert_eq!(args.source, "1.0");
        assert_eq!(args.target, "stable");
        assert_eq!(args.repository.as_deref(), Some("app"));

        let err = parse(&["tag", "app:1.0"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn context_aliases() {
        assert!(matches!(
            parse(&["cc"]).unwrap().command,
            Command::CurrentContext(_)
        ));
        assert!(matches!(
            parse(&["sc", "--kubeconfig", "/tmp/kube"]).unwrap().command,
            Command::SwitchContext(KubeArgs { kubeconfig: Some(_) })
        ));
        assert!(matches!(
            parse(&["sp", "--no-clipboard"]).unwrap().command,
            Command::SelectProfile(SelectProfileArgs {
                no_clipboard: true,
                ..
            })
        ));
    }
}
