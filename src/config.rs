//! Configuration file handling.
//!
//! The configuration file is stored at `$GSHEETX_HOME/config.json`. Besides the settings it holds,
//! `Config` knows where the OAuth files and the apply journal live inside the home directory.

use crate::error::Res;
use crate::utils;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "gsheetx";
const CONFIG_VERSION: u8 = 1;
const TIMEOUT_SECS: u64 = 60;
const SECRETS: &str = ".secrets";
const JOURNAL: &str = "journal";
const CLIENT_SECRET_JSON: &str = "client_secret.json";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$GSHEETX_HOME` and from there it loads `$GSHEETX_HOME/config.json`. It provides
/// paths to other items that are either configurable or are expected in a certain location within
/// the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    journal: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory and its subdirectories, copies `secret_file` into
    /// `.secrets/client_secret.json` and writes an initial `config.json`.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the home directory, e.g. `$HOME/.gsheetx`
    /// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON needed to start the Google
    ///   OAuth workflow.
    pub async fn create(dir: impl Into<PathBuf>, secret_file: &Path) -> Res<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the gsheetx home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;
        let journal = root.join(JOURNAL);
        utils::make_dir(&journal).await?;

        let secret_destination = secrets.join(CLIENT_SECRET_JSON);
        utils::copy(secret_file, &secret_destination).await?;
        utils::restrict_permissions(&secret_destination)?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile::default();
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets,
            journal,
            config_path,
            config_file,
        })
    }

    /// Validates that the home directory, the config file and the subdirectories exist, then
    /// loads the config file.
    pub async fn load(home: impl Into<PathBuf>) -> Res<Self> {
        let maybe_relative = home.into();
        if !maybe_relative.is_dir() {
            bail!(
                "The gsheetx home directory is missing '{}', have you run 'gsheetx init'?",
                maybe_relative.display()
            )
        }
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let config = Self {
            secrets: root.join(SECRETS),
            journal: root.join(JOURNAL),
            root,
            config_path,
            config_file,
        };
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        if !config.journal.is_dir() {
            bail!(
                "The journal directory is missing '{}'",
                config.journal.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    /// Where template apply keeps its step journals.
    pub fn journal(&self) -> &Path {
        &self.journal
    }

    /// The deadline for each individual call to Google.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config_file.timeout_secs)
    }

    /// Replaces the configured timeout for this process only. `None` keeps the configured value.
    pub fn with_timeout_secs(mut self, timeout_secs: Option<u64>) -> Self {
        if let Some(secs) = timeout_secs.filter(|s| *s > 0) {
            self.config_file.timeout_secs = secs;
        }
        self
    }

    /// Returns the stored `client_secret_path` if it is absolute, otherwise resolves the relative
    /// path against the home directory.
    pub fn client_secret_path(&self) -> PathBuf {
        self.resolve(self.config_file.client_secret_path())
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves the relative path
    /// against the home directory.
    pub fn token_path(&self) -> PathBuf {
        self.resolve(self.config_file.token_path())
    }

    fn resolve(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "gsheetx",
///   "config_version": 1,
///   "timeout_secs": 60,
///   "client_secret_path": ".secrets/client_secret.json",
///   "token_path": ".secrets/token.json"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "gsheetx"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Per-call timeout for Google requests
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,

    /// Path to the OAuth 2.0 client credentials file (optional, relative to the home directory or
    /// absolute). Defaults to $GSHEETX_HOME/.secrets/client_secret.json
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret_path: Option<PathBuf>,

    /// Path to the OAuth token file (optional, relative to the home directory or absolute).
    /// Defaults to $GSHEETX_HOME/.secrets/token.json
    #[serde(skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    TIMEOUT_SECS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            timeout_secs: TIMEOUT_SECS,
            client_secret_path: None,
            token_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads and validates a ConfigFile from `path`.
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .with_context(|| format!("Failed to load config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.timeout_secs > 0,
            "Invalid timeout_secs in config file: it must be greater than zero"
        );
        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        utils::serialize(path, self)
            .await
            .context("Unable to write config file")
    }

    fn client_secret_path(&self) -> PathBuf {
        self.client_secret_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON))
    }

    fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }
}
