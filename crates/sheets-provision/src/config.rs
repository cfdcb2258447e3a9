//! Configuration loading for the provisioner.
//!
//! Configuration is read from a TOML file and then overlaid with environment
//! variables:
//!
//! ```toml
//! folder_id = "0AbCdEf"
//!
//! [google]
//! access_token = "ya29...."
//! sheets_endpoint = "https://sheets.googleapis.com/v4"
//! drive_endpoint = "https://www.googleapis.com/drive/v3"
//! ```
//!
//! # Resolution Algorithm
//!
//! The first existing file wins:
//!
//! 1. An explicit path (must exist)
//! 2. The path in `SHEETS_PROVISION_CONFIG`
//! 3. `sheets-provision.toml` in the current directory or any parent
//! 4. `sheets-provision/config.toml` in the user config directory
//!
//! A missing file is not an error. `SHEETS_PROVISION_ACCESS_TOKEN` and
//! `SHEETS_PROVISION_FOLDER_ID` override the corresponding file values.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{DEFAULT_DRIVE_ENDPOINT, DEFAULT_SHEETS_ENDPOINT, normalize_base_url};

pub const CONFIG_FILE_NAME: &str = "sheets-provision.toml";
pub const CONFIG_PATH_ENV: &str = "SHEETS_PROVISION_CONFIG";
pub const ACCESS_TOKEN_ENV: &str = "SHEETS_PROVISION_ACCESS_TOKEN";
pub const FOLDER_ID_ENV: &str = "SHEETS_PROVISION_FOLDER_ID";

/// Errors that can occur while resolving or loading configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error when reading a config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error when a config file is malformed.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// An explicitly requested config file does not exist.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// A required setting was not provided by any source.
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    /// A setting is present but unusable.
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Top-level provisioner configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvisionConfig {
    /// Drive folder that spreadsheets are listed in and created under.
    ///
    /// Without a folder, every spreadsheet visible to the token is considered.
    #[serde(default)]
    pub folder_id: Option<String>,

    #[serde(default)]
    pub google: GoogleConfig,
}

/// Access to the Google APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoogleConfig {
    /// OAuth2 bearer token with Sheets and Drive scopes.
    #[serde(default)]
    pub access_token: String,

    #[serde(default = "default_sheets_endpoint")]
    pub sheets_endpoint: String,

    #[serde(default = "default_drive_endpoint")]
    pub drive_endpoint: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            sheets_endpoint: default_sheets_endpoint(),
            drive_endpoint: default_drive_endpoint(),
        }
    }
}

fn default_sheets_endpoint() -> String {
    DEFAULT_SHEETS_ENDPOINT.to_string()
}

fn default_drive_endpoint() -> String {
    DEFAULT_DRIVE_ENDPOINT.to_string()
}

impl ProvisionConfig {
    /// Loads and parses a config file from `path`.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if:
    /// - The file does not exist (`NotFound`)
    /// - The file cannot be read
    /// - The file cannot be parsed as TOML
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)?;
        let config: ProvisionConfig = toml::from_str(&contents)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolves, loads, overlays the environment and validates the config.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if:
    /// - `explicit` is given but does not exist
    /// - A found config file cannot be read or parsed
    /// - No access token is configured, or an endpoint is blank
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let current = std::env::current_dir()?;
        let user_config = dirs::config_dir().map(|dir| dir.join("sheets-provision/config.toml"));
        Self::resolve_with(
            explicit,
            &current,
            user_config.as_deref(),
            &|key| std::env::var(key).ok(),
        )
    }

    /// [`Self::resolve`] with the working directory, user config path and
    /// environment supplied by the caller.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve`].
    pub fn resolve_with(
        explicit: Option<&Path>,
        current_dir: &Path,
        user_config: Option<&Path>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match find_config_file(explicit, current_dir, user_config, env) {
            Some(path) => Self::load(path)?,
            None => {
                debug!("no configuration file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides(env);
        config.validate()?;
        Ok(config)
    }

    /// Overrides file values with `SHEETS_PROVISION_*` variables from `env`.
    pub fn apply_env_overrides(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        if let Some(token) = env(ACCESS_TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.google.access_token = token;
        }
        if let Some(folder_id) = env(FOLDER_ID_ENV).filter(|v| !v.trim().is_empty()) {
            self.folder_id = Some(folder_id);
        }
    }

    /// Checks that the configuration can be used to reach the Google APIs.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` without an access token and
    /// `ConfigError::Invalid` for blank endpoints or a blank folder id.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.google.access_token.trim().is_empty() {
            return Err(ConfigError::Missing("google.access_token"));
        }
        for endpoint in [&self.google.sheets_endpoint, &self.google.drive_endpoint] {
            normalize_base_url(endpoint).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        if self
            .folder_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            return Err(ConfigError::Invalid("folder_id must not be empty".to_string()));
        }
        Ok(())
    }
}

fn find_config_file(
    explicit: Option<&Path>,
    current_dir: &Path,
    user_config: Option<&Path>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Option<PathBuf> {
    // Step 1: Explicit path, checked by the loader
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    // Step 2: Environment variable override
    if let Some(path) = env(CONFIG_PATH_ENV).map(PathBuf::from)
        && path.exists()
    {
        return Some(path);
    }

    // Step 3: Current directory, then parents
    if let Some(path) = current_dir
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|path| path.exists())
    {
        return Some(path);
    }

    // Step 4: User config directory
    user_config.filter(|path| path.exists()).map(Path::to_path_buf)
}
