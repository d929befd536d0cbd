//! AWS shared credentials file.
//!
//! The store is loaded wholesale, mutated in memory and written back
//! wholesale. Section order and keys this tool does not manage survive a
//! load/save cycle.
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
//! aws_mfa_device=arn:aws:iam::123456789012:mfa/device
//! region=eu-west-1
//! ```

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use configparser::ini::Ini;
use log::debug;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Suffix naming the long-term companion of a profile.
pub const LONG_TERM_SUFFIX: &str = "-mfa";

/// Shown instead of an account id when a profile carries no ARN.
pub const UNKNOWN_ACCOUNT: &str = "????????????";

// configparser writes its default section without a header, which would turn
// `[default]` into headerless keys on save. Keys above the first header land
// here instead and are written back in place.
const PREAMBLE: &str = "<preamble>";

/// Role of a section, derived from its name once when the store is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileRole {
    /// Durable IAM keys, only used to request session tokens.
    LongTerm,
    /// MFA-derived session credentials with an expiration.
    ShortTerm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileName {
    base: String,
    role: ProfileRole,
}

impl ProfileName {
    pub fn parse(section: &str) -> Self {
        match section.strip_suffix(LONG_TERM_SUFFIX) {
            Some(base) if !base.is_empty() => Self::long_term(base),
            _ => Self::short_term(section),
        }
    }

    pub fn long_term(base: &str) -> Self {
        Self {
            base: base.to_string(),
            role: ProfileRole::LongTerm,
        }
    }

    pub fn short_term(base: &str) -> Self {
        Self {
            base: base.to_string(),
            role: ProfileRole::ShortTerm,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn role(&self) -> ProfileRole {
        self.role
    }

    /// The counterpart with the same base and the other role.
    pub fn companion(&self) -> Self {
        match self.role {
            ProfileRole::LongTerm => Self::short_term(&self.base),
            ProfileRole::ShortTerm => Self::long_term(&self.base),
        }
    }

    /// Section header used in the credentials file.
    pub fn section(&self) -> String {
        match self.role {
            ProfileRole::LongTerm => format!("{}{LONG_TERM_SUFFIX}", self.base),
            ProfileRole::ShortTerm => self.base.clone(),
        }
    }
}

/// Extracts the account id, the fifth colon-delimited field, from an ARN.
pub fn account_id(arn: &str) -> Option<&str> {
    arn.split(':').nth(4).filter(|id| !id.is_empty())
}

pub struct ProfileStore {
    path: PathBuf,
    ini: Ini,
    profiles: Vec<ProfileName>,
}

impl ProfileStore {
    /// Default location of the credentials file, `~/.aws/credentials`.
    pub fn default_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".aws").join("credentials"))
            .ok_or(Error::HomeDir)
    }

    /// Reads and parses the credentials file at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the credentials file, usually
    ///   [`ProfileStore::default_path`] or the `--config` flag.
    ///
    /// # Returns
    ///
    /// * `Ok(ProfileStore)` - Every section of the file, in file order
    /// * `Err(Error::ConfigLoad)` - The file is missing, unreadable or not INI
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                return Err(Error::ConfigLoad {
                    path,
                    message: e.to_string(),
                });
            }
        };
        let store = Self::parse(path, &content)?;
        debug!("Loaded credentials from {}", store.path.display());
        Ok(store)
    }

    /// Parses `content` as if it had been read from `path`.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self> {
        let path = path.into();
        let mut ini = Self::parser();
        if let Err(message) = ini.read(content.to_string()) {
            return Err(Error::ConfigLoad { path, message });
        }
        Ok(Self::from_ini(path, ini))
    }

    // `#` and `;` only start a comment at the beginning of a line, values keep them.
    fn parser() -> Ini {
        let mut defaults = Ini::new_cs().defaults();
        defaults.default_section = PREAMBLE.to_string();
        defaults.enable_inline_comments = false;
        Ini::new_from_defaults(defaults)
    }

    fn from_ini(path: PathBuf, ini: Ini) -> Self {
        let profiles = ini
            .sections()
            .iter()
            .filter(|s| s.as_str() != PREAMBLE)
            .map(|s| ProfileName::parse(s))
            .collect();
        Self { path, ini, profiles }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Section names in file order.
    pub fn names(&self) -> Vec<String> {
        self.profiles.iter().map(ProfileName::section).collect()
    }

    pub fn contains(&self, profile: &ProfileName) -> bool {
        let section = profile.section();
        self.profiles.iter().any(|p| p.section() == section)
    }

    /// Value of `key` in `section`. Empty values count as absent.
    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.raw(section, key).filter(|v| !v.is_empty())
    }

    /// Value of `key` in `section` as written, empty values included.
    pub fn raw(&self, section: &str, key: &str) -> Option<String> {
        self.ini.get(section, key)
    }

    /// Sets `key` in the section of `profile`, creating the section if needed.
    pub fn set(&mut self, profile: &ProfileName, key: &str, value: impl Into<String>) {
        if !self.contains(profile) {
            self.profiles.push(profile.clone());
        }
        self.ini.set(&profile.section(), key, Some(value.into()));
    }

    /// Account id of a section, read from `role_arn` or else `aws_mfa_device`.
    pub fn account_id(&self, section: &str) -> String {
        ["role_arn", "aws_mfa_device"]
            .iter()
            .find_map(|key| self.get(section, key))
            .and_then(|arn| account_id(&arn).map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_ACCOUNT.to_string())
    }

    /// Writes the whole store back to its path.
    ///
    /// The content goes to a temporary file in the same directory which then
    /// replaces the original, so readers never see a half-written file. The
    /// temporary file is created with mode 0600 on Unix.
    ///
    /// # Errors
    ///
    /// * `Error::Persistence` - The temporary file could not be created,
    ///   written or moved over the original. The original is left untouched.
    pub fn save(&self) -> Result<()> {
        let persistence = |source| Error::Persistence {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir).map_err(persistence)?;
        file.write_all(self.ini.writes().as_bytes())
            .map_err(persistence)?;
        file.as_file().sync_all().map_err(persistence)?;
        file.persist(&self.path).map_err(|e| persistence(e.error))?;

        debug!("Saved credentials to {}", self.path.display());
        Ok(())
    }
}
