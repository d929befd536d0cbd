//! Short-term credential lifecycle.
//!
//! A profile `<name>` holding session credentials is paired with a long-term
//! profile `<name>-mfa` holding the IAM user keys:
//!
//! ```ini
//! [default]
//! aws_access_key_id=ASIA...
//! aws_secret_access_key=...
//! aws_session_token=...
//! expiration=2025-06-01 12:00:00
//!
//! [default-mfa]
//! aws_access_key_id=AKIA...
//! aws_secret_access_key=...
//! aws_mfa_device=arn:aws:iam::123456789012:mfa/device    # optional
//! region=eu-west-1                                       # optional
//! ```
//!
//! [`CredentialManager::ensure`] reuses the session while it is valid and
//! otherwise answers an MFA challenge to issue and persist a new one. Every
//! failure ends the invocation; nothing is retried because an MFA code is
//! single-use.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::info;

use crate::{
    credentials::{IdentityService, LongTermCredentials, SessionCredentials},
    error::{Error, Result},
    prompt::{OnePasswordItem, Prompter, take_selected, validate_mfa_code},
    store::{ProfileName, ProfileRole, ProfileStore},
};

/// Format of the `expiration` key, always UTC.
pub const EXPIRATION_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Region used when the long-term profile does not define one.
pub const DEFAULT_REGION: &str = "eu-west-1";

const KEY_ACCESS_KEY_ID: &str = "aws_access_key_id";
const KEY_SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
const KEY_SESSION_TOKEN: &str = "aws_session_token";
const KEY_EXPIRATION: &str = "expiration";
const KEY_REGION: &str = "region";
const KEY_MFA_DEVICE: &str = "aws_mfa_device";

/// Everything a login needs, resolved from flags and environment up front.
#[derive(Debug, Clone)]
pub struct LoginConfig {
    /// Profile receiving the session. A long-term name is accepted too.
    pub profile: String,
    pub credentials_path: PathBuf,
    /// Region used when the long-term profile has none.
    pub fallback_region: String,
    /// Session duration in seconds; STS picks its default when unset.
    pub duration: Option<u32>,
    pub one_password: Option<OnePasswordItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The stored session has not expired yet.
    StillValid { expiration: DateTime<Utc> },
    Issued { expiration: DateTime<Utc> },
}

impl LoginOutcome {
    pub fn expiration(&self) -> DateTime<Utc> {
        match *self {
            Self::StillValid { expiration } | Self::Issued { expiration } => expiration,
        }
    }
}

/// Settings read from the long-term profile.
#[derive(Debug)]
struct LongTermProfile {
    credentials: LongTermCredentials,
    mfa_device: Option<String>,
}

impl LongTermProfile {
    fn resolve(store: &ProfileStore, profile: &ProfileName, fallback_region: &str) -> Result<Self> {
        let section = profile.section();
        if !store.contains(profile) {
            return Err(Error::ProfileNotFound {
                profile: profile.base().to_string(),
                long_term: section,
            });
        }

        let required = |key: &'static str| {
            store.get(&section, key).ok_or_else(|| Error::IncompleteProfile {
                profile: section.clone(),
                key,
            })
        };

        Ok(Self {
            credentials: LongTermCredentials {
                access_key_id: required(KEY_ACCESS_KEY_ID)?,
                secret_access_key: required(KEY_SECRET_ACCESS_KEY)?,
                region: store
                    .get(&section, KEY_REGION)
                    .unwrap_or_else(|| fallback_region.to_string()),
            },
            mfa_device: store.get(&section, KEY_MFA_DEVICE),
        })
    }
}

/// Returns the expiration of the stored session if it is still valid at `now`.
///
/// A missing section or `expiration` key counts as expired. A value that does
/// not match [`EXPIRATION_FORMAT`], including an empty one, is an error rather
/// than a reason to reissue.
///
/// # Errors
///
/// * `Error::MalformedExpiration` - The stored value does not parse
pub fn valid_session(
    store: &ProfileStore,
    profile: &ProfileName,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    let section = profile.section();
    let Some(value) = store.raw(&section, KEY_EXPIRATION) else {
        return Ok(None);
    };

    let expiration = NaiveDateTime::parse_from_str(&value, EXPIRATION_FORMAT)
        .map_err(|reason| Error::MalformedExpiration {
            profile: section,
            value: value.clone(),
            expected: EXPIRATION_FORMAT,
            reason,
        })?
        .and_utc();

    Ok((expiration > now).then_some(expiration))
}

fn write_session(store: &mut ProfileStore, profile: &ProfileName, session: &SessionCredentials) {
    store.set(profile, KEY_ACCESS_KEY_ID, &session.access_key_id);
    store.set(profile, KEY_SECRET_ACCESS_KEY, &session.secret_access_key);
    store.set(profile, KEY_SESSION_TOKEN, &session.session_token);
    store.set(
        profile,
        KEY_EXPIRATION,
        session.expiration.format(EXPIRATION_FORMAT).to_string(),
    );
}

pub struct CredentialManager<I, P> {
    config: LoginConfig,
    identity: I,
    prompter: P,
}

impl<I, P> CredentialManager<I, P>
where
    I: IdentityService,
    P: Prompter,
{
    pub fn new(config: LoginConfig, identity: I, prompter: P) -> Self {
        Self {
            config,
            identity,
            prompter,
        }
    }

    /// Makes sure the configured profile holds a valid session.
    ///
    /// The stored session is reused while its expiration lies in the future.
    /// Otherwise an MFA device is picked (the configured one, or one listed by
    /// the identity service), a code is collected from 1Password or the
    /// prompt, and the issued session is written to the short-term profile.
    ///
    /// # Returns
    ///
    /// * `Ok(LoginOutcome::StillValid)` - Nothing was requested or written
    /// * `Ok(LoginOutcome::Issued)` - A new session was saved to the store
    ///
    /// # Errors
    ///
    /// * `Error::ConfigLoad` - The credentials file is missing or unreadable
    /// * `Error::ProfileNotFound` / `Error::IncompleteProfile` - The long-term
    ///   profile is absent or lacks its keys
    /// * `Error::MalformedExpiration` - The stored expiration does not parse
    /// * `Error::NoMfaDevice`, `Error::MfaDeviceListing` - Device discovery failed
    /// * `Error::InvalidMfaCode`, `Error::Cancelled` - No usable code was entered
    /// * `Error::TokenIssuance` - STS rejected the request
    /// * `Error::Persistence` - The store could not be written back
    pub async fn ensure(&self) -> Result<LoginOutcome> {
        let mut store = ProfileStore::load(&self.config.credentials_path)?;

        let requested = ProfileName::parse(&self.config.profile);
        let (short_term, long_term) = match requested.role() {
            ProfileRole::ShortTerm => (requested.clone(), requested.companion()),
            ProfileRole::LongTerm => (requested.companion(), requested),
        };

        let settings = LongTermProfile::resolve(&store, &long_term, &self.config.fallback_region)?;

        if let Some(expiration) = valid_session(&store, &short_term, Utc::now())? {
            info!(
                "You're still authenticated! Your credentials expire at {}",
                expiration.format(EXPIRATION_FORMAT)
            );
            return Ok(LoginOutcome::StillValid { expiration });
        }

        let credentials = settings.credentials;
        let device = match settings.mfa_device {
            Some(device) => device,
            None => self.choose_device(&credentials).await?,
        };
        let code = self.mfa_code(&device)?;

        info!(
            "Fetching credentials for {} in {}",
            short_term.section(),
            credentials.region
        );
        let session = self
            .identity
            .get_session_token(&credentials, &device, &code, self.config.duration)
            .await?;

        write_session(&mut store, &short_term, &session);
        store.save()?;
        info!(
            "Short-term credentials created for profile {}, expiring at {}",
            short_term.section(),
            session.expiration.format(EXPIRATION_FORMAT)
        );

        Ok(LoginOutcome::Issued {
            expiration: session.expiration,
        })
    }

    async fn choose_device(&self, credentials: &LongTermCredentials) -> Result<String> {
        let devices = self.identity.list_mfa_devices(credentials).await?;
        if devices.is_empty() {
            return Err(Error::NoMfaDevice);
        }
        let index = self.prompter.select("Choose an MFA device", &devices, 0)?;
        take_selected(devices, index)
    }

    fn mfa_code(&self, device: &str) -> Result<String> {
        let code = match self.config.one_password.as_ref().and_then(OnePasswordItem::otp) {
            Some(code) => code,
            None => self.prompter.input(
                &format!("Enter the MFA code for {device}"),
                validate_mfa_code,
            )?,
        };
        validate_mfa_code(&code).map_err(Error::InvalidMfaCode)?;
        Ok(code)
    }
}
