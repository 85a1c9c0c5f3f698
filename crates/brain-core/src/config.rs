//! Configuration for brainview
//!
//! Stored in .brain/config.toml (found by walking up from the working
//! directory), or in the user config directory.

use crate::poller::PollerConfig;
use crate::session::session_lifetime;
use crate::{Error, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project-local config directory
pub const BRAIN_DIR: &str = ".brain";
pub const CONFIG_FILE: &str = "config.toml";
/// Directory name under the user config and state directories
pub const APP_DIR: &str = "brainview";

pub const ENV_TASKS_URL: &str = "BRAIN_TASKS_URL";
pub const ENV_SYNC_URL: &str = "BRAIN_SYNC_URL";

/// Shown in place of passwords when config is printed
pub const REDACTED: &str = "********";

/// brainview configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name shown in headers when the task document carries none
    pub project_name: String,

    /// Backend endpoints
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Sync poller settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Display settings
    #[serde(default)]
    pub display: DisplayConfig,

    /// Login gate settings
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_name: "brain".to_string(),
            endpoints: EndpointsConfig::default(),
            sync: SyncConfig::default(),
            display: DisplayConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// URL serving the task document
    pub tasks_url: String,

    /// Base URL of the sync service (`/api/sync/...` is appended)
    pub sync_base_url: String,

    /// Base URL for task updates (`/<id>/update` is appended).
    /// Updates stay local when unset.
    pub task_update_url: Option<String>,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            tasks_url: "http://localhost:3000/brain/ACTIVE_TASKS.json".to_string(),
            sync_base_url: "http://localhost:8002".to_string(),
            task_update_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub poll_interval_secs: u64,
    pub fresh_window_secs: u64,
    pub notification_secs: u64,
    pub manual_settle_secs: u64,
    /// Entries shown in the history view
    pub history_limit: usize,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            fresh_window_secs: 60,
            notification_secs: 5,
            manual_settle_secs: 2,
            history_limit: crate::sync::HISTORY_LIMIT,
            request_timeout_secs: 10,
        }
    }
}

impl SyncConfig {
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            fresh_window: Duration::from_secs(self.fresh_window_secs),
            notification_ttl: Duration::from_secs(self.notification_secs),
            manual_settle: Duration::from_secs(self.manual_settle_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Use colors in output
    pub colors: bool,

    /// Date format for display
    pub date_format: String,

    /// Maximum title length before truncation
    pub max_title_length: usize,

    /// Commit message characters shown in sync history
    pub message_preview_chars: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            colors: true,
            date_format: "%Y-%m-%d %H:%M".to_string(),
            max_title_length: 80,
            message_preview_chars: crate::sync::MESSAGE_PREVIEW_CHARS,
        }
    }
}

impl DisplayConfig {
    /// Render `ts` in local time. A format chrono cannot render falls back
    /// to RFC 3339 instead of panicking.
    pub fn format_time(&self, ts: DateTime<Utc>) -> String {
        let local = ts.with_timezone(&Local);
        let mut out = String::new();
        match write!(out, "{}", local.format(&self.date_format)) {
            Ok(()) => out,
            Err(_) => local.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session lifetime
    pub session_hours: u64,

    /// Accounts accepted by the login gate
    pub users: Vec<UserEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_hours: 24,
            users: Vec::new(),
        }
    }
}

/// One `[[auth.users]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Where a config was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    /// `.brain/config.toml` in the working directory or an ancestor
    Project(PathBuf),
    /// `$XDG_CONFIG_HOME/brainview/config.toml`
    User(PathBuf),
    /// Nothing on disk; defaults only
    Defaults,
}

impl ConfigLocation {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigLocation::Project(p) | ConfigLocation::User(p) => Some(p),
            ConfigLocation::Defaults => None,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config
            .validate()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Copy safe to print: user passwords are masked
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for user in &mut config.auth.users {
            user.password = REDACTED.to_string();
        }
        config
    }

    /// Reject values that would otherwise fail at display or login time
    pub fn validate(&self) -> Result<()> {
        validate_date_format(&self.display.date_format)?;
        if session_lifetime(self.auth.session_hours).is_none() {
            return Err(Error::Config(format!(
                "auth.session_hours out of range: {}",
                self.auth.session_hours
            )));
        }
        Ok(())
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Find the config file that applies from `start`
    pub fn locate_from(start: &Path) -> ConfigLocation {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(BRAIN_DIR).join(CONFIG_FILE);
            if candidate.exists() {
                return ConfigLocation::Project(candidate);
            }
            if !current.pop() {
                break;
            }
        }

        match user_config_path() {
            Some(path) if path.exists() => ConfigLocation::User(path),
            _ => ConfigLocation::Defaults,
        }
    }

    pub fn locate() -> Result<ConfigLocation> {
        Ok(Self::locate_from(&std::env::current_dir()?))
    }

    /// Load whichever config applies, with environment overrides applied
    pub fn resolve() -> Result<(Self, ConfigLocation)> {
        let location = Self::locate()?;
        let mut config = match location.path() {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        tracing::debug!(?location, "configuration resolved");
        Ok((config, location))
    }

    /// Override endpoints from the environment
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_TASKS_URL) {
            self.endpoints.tasks_url = url;
        }
        if let Some(url) = non_empty(ENV_SYNC_URL) {
            self.endpoints.sync_base_url = url;
        }
    }

    /// Set a value by dotted key (e.g. `sync.poll_interval_secs`)
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .parse()
                .map_err(|_| Error::Config(format!("Invalid value for {}: {}", key, value)))
        }

        match key {
            "project_name" => self.project_name = value.to_string(),
            "endpoints.tasks_url" => self.endpoints.tasks_url = value.to_string(),
            "endpoints.sync_base_url" => self.endpoints.sync_base_url = value.to_string(),
            "endpoints.task_update_url" => {
                self.endpoints.task_update_url =
                    Some(value.to_string()).filter(|v| !v.is_empty() && v != "none")
            }
            "sync.poll_interval_secs" => self.sync.poll_interval_secs = parse(key, value)?,
            "sync.fresh_window_secs" => self.sync.fresh_window_secs = parse(key, value)?,
            "sync.notification_secs" => self.sync.notification_secs = parse(key, value)?,
            "sync.manual_settle_secs" => self.sync.manual_settle_secs = parse(key, value)?,
            "sync.history_limit" => self.sync.history_limit = parse(key, value)?,
            "sync.request_timeout_secs" => self.sync.request_timeout_secs = parse(key, value)?,
            "display.colors" => self.display.colors = parse(key, value)?,
            "display.date_format" => self.display.date_format = value.to_string(),
            "display.max_title_length" => self.display.max_title_length = parse(key, value)?,
            "display.message_preview_chars" => {
                self.display.message_preview_chars = parse(key, value)?
            }
            "auth.session_hours" => self.auth.session_hours = parse(key, value)?,
            _ => return Err(Error::Config(format!("Unknown config key: {}", key))),
        }
        self.validate()
    }

    /// Create `.brain/config.toml` under `root`
    pub fn init_project(root: &Path) -> Result<PathBuf> {
        let dir = root.join(BRAIN_DIR);
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            return Err(Error::AlreadyInitialized(path.display().to_string()));
        }
        std::fs::create_dir_all(&dir)?;
        std::fs::write(&path, Self::default_with_comments())?;
        Ok(path)
    }

    /// Generate a default config file with comments
    pub fn default_with_comments() -> String {
        r#"# brainview configuration

# Name shown when the task document carries no project info
project_name = "brain"

[endpoints]
# URL serving the task document (phased or flat shape)
# Overridden by BRAIN_TASKS_URL
tasks_url = "http://localhost:3000/brain/ACTIVE_TASKS.json"

# Base URL of the sync service; /api/sync/status, /history and /manual are appended
# Overridden by BRAIN_SYNC_URL
sync_base_url = "http://localhost:8002"

# Base URL for task updates; POST <url>/<id>/update with form field `status`
# Status changes stay local when unset
# task_update_url = "http://localhost:8000/brain/task"

[sync]
# Seconds between status checks
poll_interval_secs = 30

# A success newer than this raises a notification
fresh_window_secs = 60

# Seconds a notification stays visible
notification_secs = 5

# Seconds to wait after a manual trigger before re-checking
manual_settle_secs = 2

# Entries shown in the sync history
history_limit = 5

# Per-request HTTP timeout
request_timeout_secs = 10

[display]
# Use colors in output
colors = true

# Date format for display (strftime format)
date_format = "%Y-%m-%d %H:%M"

# Maximum title length before truncation
max_title_length = 80

# Commit message characters shown in sync history
message_preview_chars = 50

[auth]
# Session lifetime for the terminal viewer
session_hours = 24

# Accounts for the terminal viewer's login screen.
# This is a convenience gate, not access control.
# [[auth.users]]
# username = "admin"
# password = "change-me"
# display_name = "Administrator"
# role = "admin"
"#
        .to_string()
    }
}

/// Check a strftime format string without rendering anything
pub fn validate_date_format(format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(Error::Config(format!("Invalid date_format: {}", format)));
    }
    Ok(())
}

/// `$XDG_CONFIG_HOME/brainview/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// `$XDG_STATE_HOME/brainview`, falling back to `~/.local/state/brainview`
pub fn state_dir() -> Result<PathBuf> {
    let base = std::env::var("XDG_STATE_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")))
        .ok_or_else(|| Error::Config("Could not determine state directory".into()))?;

    Ok(base.join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_commented_default_parses_to_defaults() {
        let config: Config = toml::from_str(&Config::default_with_comments()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.endpoints.tasks_url, defaults.endpoints.tasks_url);
        assert_eq!(config.sync.poll_interval_secs, 30);
        assert_eq!(config.sync.history_limit, 5);
        assert_eq!(config.display.message_preview_chars, 50);
        assert_eq!(config.auth.session_hours, 24);
        assert!(config.auth.users.is_empty());
        assert!(config.endpoints.task_update_url.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [sync]
            poll_interval_secs = 10

            [[auth.users]]
            username = "admin"
            password = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.sync.poll_interval_secs, 10);
        assert_eq!(config.sync.notification_secs, 5);
        assert_eq!(config.auth.users[0].username, "admin");
        assert_eq!(config.auth.users[0].display_name, None);

        let poller = config.sync.poller_config();
        assert_eq!(poller.poll_interval, Duration::from_secs(10));
        assert_eq!(poller.manual_settle, Duration::from_secs(2));
    }

    #[test]
    fn test_locate_walks_up_to_project_dir() {
        let tmp = TempDir::new().unwrap();
        let path = Config::init_project(tmp.path()).unwrap();
        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(Config::locate_from(&nested), ConfigLocation::Project(path));
        assert!(matches!(
            Config::init_project(tmp.path()),
            Err(Error::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_env_overrides_endpoints() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            ENV_TASKS_URL => Some("http://tasks.test/doc.json".to_string()),
            ENV_SYNC_URL => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.endpoints.tasks_url, "http://tasks.test/doc.json");
        assert_eq!(
            config.endpoints.sync_base_url,
            EndpointsConfig::default().sync_base_url
        );
    }

    #[test]
    fn test_set_key_and_save_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);

        let mut config = Config::default();
        config.set_key("sync.poll_interval_secs", "45").unwrap();
        config
            .set_key("endpoints.task_update_url", "http://api.test/brain/task")
            .unwrap();
        assert!(config.set_key("display.colors", "maybe").is_err());
        assert!(config.set_key("nope", "1").is_err());
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.sync.poll_interval_secs, 45);
        assert_eq!(
            loaded.endpoints.task_update_url.as_deref(),
            Some("http://api.test/brain/task")
        );
    }

    #[test]
    fn test_invalid_date_format_is_rejected_on_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(&path, "[display]\ndate_format = \"%Y-%Q\"\n").unwrap();

        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
        assert!(validate_date_format("%Y-%m-%d %H:%M").is_ok());
        assert!(validate_date_format("%Y-%Q").is_err());

        let mut config = Config::default();
        assert!(config.set_key("display.date_format", "%Q").is_err());
    }

    #[test]
    fn test_redacted_masks_passwords() {
        let mut config = Config::default();
        config.auth.users.push(UserEntry {
            username: "admin".to_string(),
            password: "secret".to_string(),
            display_name: None,
            role: None,
        });

        let shown = serde_json::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("secret"));
        assert!(shown.contains(REDACTED));
        assert_eq!(config.auth.users[0].password, "secret");
    }

    #[test]
    fn test_format_time_survives_bad_format() {
        let ts = Utc::now();
        let display = DisplayConfig {
            date_format: "%Y-%Q".to_string(),
            ..DisplayConfig::default()
        };
        let rendered = display.format_time(ts);
        assert_eq!(
            DateTime::parse_from_rfc3339(&rendered).unwrap().with_timezone(&Utc),
            ts
        );

        let display = DisplayConfig {
            date_format: "%Y".to_string(),
            ..DisplayConfig::default()
        };
        assert_eq!(
            display.format_time(ts),
            ts.with_timezone(&Local).format("%Y").to_string()
        );
    }

    #[test]
    fn test_out_of_range_session_hours_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(&path, "[auth]\nsession_hours = 10000000000000\n").unwrap();

        assert!(matches!(Config::load(&path), Err(Error::Config(_))));

        let mut config = Config::default();
        assert!(config.set_key("auth.session_hours", "10000000000000").is_err());
        assert!(config.set_key("auth.session_hours", "48").is_ok());
    }
}
