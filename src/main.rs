//! opskit
//!
//! A handful of small commands around AWS and Kubernetes:
//!
//! - `login` keeps MFA session credentials in `~/.aws/credentials` fresh,
//!   reusing the stored session until it expires.
//! - `select-profile` picks a profile and hands back an `export AWS_PROFILE=`
//!   statement, on stdout and on the clipboard.
//! - `tag` adds a tag to an ECR image by copying its manifest.
//! - `current-context` / `switch-context` read and change the kube context.
//!
//! Every command runs once and stops at the first error. Errors travel back
//! here as values; this is the only place deciding the exit status.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};

mod cli;
mod clipboard;
mod context;
mod credentials;
mod ecr;
mod error;
mod login;
mod prompt;
mod selector;
mod store;

use cli::{Cli, Command, KubeArgs, LoginArgs, SelectProfileArgs, TagArgs};
use clipboard::{ClipboardOutcome, SystemClipboard};
use context::KubeContexts;
use credentials::AwsIdentity;
use ecr::{EcrRegistry, ImageRef};
use error::Error;
use login::CredentialManager;
use prompt::TerminalPrompter;
use store::ProfileStore;

#[tokio::main]
async fn main() -> ExitCode {
    // INFO by default, RUST_LOG still wins.
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();

    let Cli { command } = Cli::parse();

    match run(command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.downcast_ref::<Error>().is_some_and(Error::is_cancelled) => {
            eprintln!("Alright then, nothing was changed. Exiting..");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs one subcommand to completion.
///
/// # Returns
///
/// * `Ok(())` - The command finished
/// * `Err(anyhow::Error)` - The first failure, usually wrapping an
///   [`error::Error`] that `main` inspects for cancellation
async fn run(command: Command) -> Result<()> {
    match command {
        Command::Login(args) => login(args).await,
        Command::SelectProfile(args) => select_profile(args),
        Command::Tag(args) => tag(args).await,
        Command::CurrentContext(args) => current_context(args),
        Command::SwitchContext(args) => switch_context(args),
    }
}

async fn login(args: LoginArgs) -> Result<()> {
    let config = args.into_config()?;
    let outcome = CredentialManager::new(config, AwsIdentity, TerminalPrompter::default())
        .ensure()
        .await?;
    debug!("Session valid until {}", outcome.expiration());
    Ok(())
}

fn select_profile(args: SelectProfileArgs) -> Result<()> {
    let store = ProfileStore::load(args.credentials_path()?)?;
    let profile = selector::select_profile(&store, &TerminalPrompter::default())?;

    let export = selector::export_statement(&profile);
    println!("{export}");
    if !args.no_clipboard {
        copy_to_clipboard(&export);
    }
    Ok(())
}

/// Best-effort copy; failures are logged as warnings and never fail the command.
fn copy_to_clipboard(text: &str) {
    let copied = SystemClipboard::new()
        .and_then(|mut board| clipboard::copy(&mut board, text, clipboard::HOLD));
    match copied {
        Ok(ClipboardOutcome::Copied) => info!("Export command written to clipboard"),
        Ok(ClipboardOutcome::Superseded) => {
            warn!("The clipboard was overwritten, the export command is lost")
        }
        Err(e) => warn!("Something went wrong while copying to clipboard: {e}"),
    }
}

async fn tag(args: TagArgs) -> Result<()> {
    let repository = args.repository.as_deref();
    let source = ImageRef::resolve(&args.source, repository)?;
    let target = ImageRef::resolve(&args.target, repository)?;

    let registry = EcrRegistry::from_env(args.profile.as_deref(), args.region.as_deref()).await;
    ecr::retag(&registry, &source, &target)
        .await
        .with_context(|| format!("Failed to retag {source} -> {target}"))
}

fn current_context(args: KubeArgs) -> Result<()> {
    let contexts = KubeContexts::load(context::kubeconfig_path(args.kubeconfig.as_deref())?)?;
    println!("Current context: {}", contexts.current()?);
    Ok(())
}

fn switch_context(args: KubeArgs) -> Result<()> {
    let mut contexts = KubeContexts::load(context::kubeconfig_path(args.kubeconfig.as_deref())?)?;
    let name = context::switch_interactively(&mut contexts, &TerminalPrompter::default())?;
    info!(
        "Switched to context {name} in {}",
        contexts.path().display()
    );
    Ok(())
}
