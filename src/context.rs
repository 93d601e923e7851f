//! The application context: configuration, theme preference and login session, passed
//! explicitly to every command handler.

use crate::api::{ExpenseApi, Mode};
use crate::error::{ErrorType, IntoResult, Res, Result};
use crate::model::Session;
use crate::{utils, Config};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The preference key under which the dark mode flag is persisted.
pub const DARK_MODE_KEY: &str = "expenseTracker_darkMode";

/// Light or dark presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

serde_plain::derive_display_from_serialize!(Theme);
serde_plain::derive_fromstr_from_deserialize!(Theme);

impl Theme {
    pub fn from_dark(dark: bool) -> Self {
        if dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn is_dark(&self) -> bool {
        *self == Theme::Dark
    }

    pub fn toggled(&self) -> Self {
        Theme::from_dark(!self.is_dark())
    }
}

/// A small persistent key-value store of JSON values, backed by a single file. Every change is
/// written through immediately.
#[derive(Debug, Clone)]
pub struct Prefs {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl Prefs {
    /// Loads the store at `path`. A missing file is an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Res<Self> {
        let path = path.into();
        let values = if path.is_file() {
            utils::deserialize(&path).await?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub async fn set(&mut self, key: impl Into<String>, value: Value) -> Res<()> {
        self.values.insert(key.into(), value);
        self.save().await
    }

    pub async fn remove(&mut self, key: &str) -> Res<bool> {
        let removed = self.values.remove(key).is_some();
        if removed {
            self.save().await?;
        }
        Ok(removed)
    }

    async fn save(&self) -> Res<()> {
        utils::serialize(&self.path, &self.values).await
    }
}

/// The current theme plus the store it is persisted to.
#[derive(Debug, Clone)]
pub struct ThemeState {
    mode: Theme,
    prefs: Prefs,
}

impl ThemeState {
    /// Uses the persisted preference when there is one, otherwise `system`.
    pub fn init(prefs: Prefs, system: Theme) -> Self {
        let mode = match saved_theme(&prefs) {
            Some(saved) => saved,
            None => system,
        };
        debug!("Theme initialized to {mode}");
        Self { mode, prefs }
    }

    pub fn mode(&self) -> Theme {
        self.mode
    }

    /// Whether the user has chosen a theme explicitly.
    pub fn has_preference(&self) -> bool {
        saved_theme(&self.prefs).is_some()
    }

    /// Sets and persists the theme.
    pub async fn set(&mut self, theme: Theme) -> Res<()> {
        self.prefs
            .set(DARK_MODE_KEY, Value::Bool(theme.is_dark()))
            .await?;
        self.mode = theme;
        Ok(())
    }

    /// Flips and persists the theme, returning the new one.
    pub async fn toggle(&mut self) -> Res<Theme> {
        let next = self.mode.toggled();
        self.set(next).await?;
        Ok(next)
    }

    /// Forgets the persisted preference and follows `system` again.
    pub async fn follow_system(&mut self, system: Theme) -> Res<()> {
        self.prefs.remove(DARK_MODE_KEY).await?;
        self.mode = system;
        Ok(())
    }

    /// Applies a change of the system theme. It only takes effect when the user has no persisted
    /// preference. Returns whether the theme changed.
    pub fn on_system_change(&mut self, system: Theme) -> bool {
        if self.has_preference() || self.mode == system {
            return false;
        }
        self.mode = system;
        true
    }
}

fn saved_theme(prefs: &Prefs) -> Option<Theme> {
    match prefs.get(DARK_MODE_KEY)? {
        Value::Bool(dark) => Some(Theme::from_dark(*dark)),
        other => {
            warn!("Ignoring unexpected value for {DARK_MODE_KEY}: {other}");
            None
        }
    }
}

/// Reads the terminal's `COLORFGBG` variable to guess whether the background is dark.
pub fn detect_system_theme() -> Theme {
    system_theme_from(std::env::var("COLORFGBG").ok().as_deref())
}

/// `COLORFGBG` looks like `"15;0"` (foreground;background); background colors 0-6 and 8 are
/// dark.
fn system_theme_from(colorfgbg: Option<&str>) -> Theme {
    let background = colorfgbg
        .and_then(|s| s.rsplit(';').next())
        .and_then(|bg| bg.trim().parse::<u8>().ok());
    match background {
        Some(0..=6 | 8) => Theme::Dark,
        _ => Theme::Light,
    }
}

/// Everything a command handler needs besides its arguments.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: Config,
    mode: Mode,
    theme: ThemeState,
    session: Option<Session>,
}

impl AppContext {
    /// Reads the theme preference (falling back to `system`) and the saved session.
    pub async fn init(config: Config, mode: Mode, system: Theme) -> Result<Self> {
        let prefs = Prefs::load(config.prefs_path())
            .await
            .pub_result(ErrorType::Config)?;
        let theme = ThemeState::init(prefs, system);
        let session = config.load_session().await?;
        Ok(Self {
            config,
            mode,
            theme,
            session,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn theme(&self) -> &ThemeState {
        &self.theme
    }

    pub fn theme_mut(&mut self) -> &mut ThemeState {
        &mut self.theme
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Saves `session` and uses it for subsequent API clients.
    pub async fn log_in(&mut self, session: Session) -> Result<()> {
        self.config.save_session(&session).await?;
        self.session = Some(session);
        Ok(())
    }

    /// Forgets the session. Returns whether there was one.
    pub async fn log_out(&mut self) -> Result<bool> {
        self.session = None;
        self.config.clear_session().await
    }

    /// Creates the API client for the current session.
    pub fn api(&self) -> Result<Box<dyn ExpenseApi>> {
        crate::api::api(&self.config, self.session(), self.mode).pub_result(ErrorType::Config)
    }
}
