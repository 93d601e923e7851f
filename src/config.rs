//! Configuration file handling.
//!
//! The configuration file is stored at `$EXPENSES_HOME/config.json` and holds the URL of the
//! expense API. The same directory holds `prefs.json`, the key-value store for presentation
//! preferences, and `.secrets/session.json`, the saved login token.

use crate::error::{ErrorType, IntoResult, Res, Result};
use crate::model::Session;
use crate::utils;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

const APP_NAME: &str = "expenses";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CONFIG_JSON: &str = "config.json";
const PREFS_JSON: &str = "prefs.json";
const SESSION_JSON: &str = "session.json";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$EXPENSES_HOME` and from there it loads `$EXPENSES_HOME/config.json`. It provides
/// paths to the other files that are expected in a certain location within the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    api_url: Url,
}

impl Config {
    /// Creates the home directory, its secrets subdirectory, and an initial `config.json`
    /// pointing at `api_url`.
    ///
    /// # Errors
    /// - Returns an error if `api_url` is not a valid URL.
    /// - Returns an error if any file operations fail.
    pub async fn create(dir: impl Into<PathBuf>, api_url: &str) -> Result<Self> {
        Self::create_inner(dir.into(), api_url)
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(maybe_relative: PathBuf, api_url: &str) -> Res<Self> {
        let api_url = parse_api_url(api_url)?;
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the expenses home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;
        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            api_url: api_url.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;
        debug!("Wrote {}", config_path.display());

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            api_url,
        })
    }

    /// This will
    /// - validate that the home directory and the config file exist
    /// - load the config file
    /// - validate that the secrets directory exists
    /// - return the loaded configuration object
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(maybe_relative: PathBuf) -> Res<Self> {
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The expenses home directory is missing, run 'expenses init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let api_url = parse_api_url(&config_file.api_url)?;

        let secrets = root.join(SECRETS);
        if !secrets.is_dir() {
            bail!("The secrets directory is missing '{}'", secrets.display())
        }
        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            api_url,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn config_version(&self) -> u8 {
        self.config_file.config_version
    }

    /// The key-value store of presentation preferences.
    pub fn prefs_path(&self) -> PathBuf {
        self.root.join(PREFS_JSON)
    }

    pub fn session_path(&self) -> PathBuf {
        self.secrets.join(SESSION_JSON)
    }

    /// Loads the saved session, if the user has logged in.
    pub async fn load_session(&self) -> Result<Option<Session>> {
        let path = self.session_path();
        if !path.is_file() {
            return Ok(None);
        }
        utils::deserialize(&path)
            .await
            .map(Some)
            .pub_result(ErrorType::Io)
    }

    /// Saves `session` with owner-only permissions.
    pub async fn save_session(&self, session: &Session) -> Result<()> {
        let path = self.session_path();
        async {
            let json = serde_json::to_string_pretty(session)
                .context("Failed to serialize the session")?;
            utils::write_private(&path, json).await
        }
        .await
        .pub_result(ErrorType::Io)
    }

    /// Removes the saved session. Returns whether there was one.
    pub async fn clear_session(&self) -> Result<bool> {
        utils::remove_if_exists(&self.session_path())
            .await
            .pub_result(ErrorType::Io)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "expenses",
///   "config_version": 1,
///   "api_url": "http://localhost:5000/api"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "expenses"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Base URL of the expense API
    api_url: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            api_url: String::new(),
        }
    }
}

impl ConfigFile {
    async fn load(path: &Path) -> Res<Self> {
        let config: ConfigFile = utils::deserialize(path).await?;
        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        Ok(config)
    }

    async fn save(&self, path: &Path) -> Res<()> {
        utils::serialize(path, self)
            .await
            .context("Unable to write config file")
    }
}

/// Parses the API base URL, which must be http or https.
fn parse_api_url(s: &str) -> Res<Url> {
    let url = Url::parse(s).with_context(|| format!("Invalid API URL '{s}'"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!("The API URL must use http or https, not '{other}'"),
    }
}
