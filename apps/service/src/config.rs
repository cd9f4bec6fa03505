use std::time::Duration;
use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_CHECK_INTERVAL_SECONDS: i64 = 60;
pub const DEFAULT_PROBE_TIMEOUT_SECONDS: i64 = 10;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read config file: {0}")]
    ReadFailed(#[source] io::Error),
    #[error("Failed to write config file: {0}")]
    WriteFailed(#[source] io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("No config path available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: Monitor,
    pub database: Database,
    pub notifications: Notifications,
    pub retention: Retention,
}

/// Check cycle settings
///
/// Signed so that a non-positive value in the file is recognised and
/// replaced instead of failing to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    pub check_interval_seconds: i64,
    pub probe_timeout_seconds: i64,
    /// Unset means no cap on probes running at once
    pub max_concurrent_probes: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub path: path::PathBuf,
}

/// Mail relay credentials, delivery is disabled unless all of them are set
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Notifications {
    pub endpoint: Option<String>,
    pub sender: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Retention {
    /// Check results older than this are deleted, 0 keeps everything
    pub check_result_days: u32,
    pub cleanup_interval_seconds: u64,
}

/// Everything needed to talk to the mail relay
#[derive(Clone, PartialEq, Eq)]
pub struct MailCredentials {
    pub endpoint: String,
    pub sender: String,
    pub username: String,
    pub password: String,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            check_interval_seconds: DEFAULT_CHECK_INTERVAL_SECONDS,
            probe_timeout_seconds: DEFAULT_PROBE_TIMEOUT_SECONDS,
            max_concurrent_probes: None,
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self { path: path::PathBuf::from("vigil.db") }
    }
}

impl Default for Retention {
    fn default() -> Self {
        Self { check_result_days: 30, cleanup_interval_seconds: 3600 }
    }
}

impl Monitor {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds.max(1) as u64)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds.max(1) as u64)
    }
}

impl Notifications {
    /// `None` when any credential is missing or blank
    pub fn credentials(&self) -> Option<MailCredentials> {
        let present = |value: &Option<String>| value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(String::from);

        let endpoint = present(&self.endpoint)?;
        let username = present(&self.username)?;
        let password = present(&self.password)?;
        let sender = present(&self.sender).unwrap_or_else(|| username.clone());

        Some(MailCredentials { endpoint, sender, username, password })
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/vigil/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("vigil/config.toml"))
}

/// Keep `value` when positive, otherwise warn and use `default`
fn positive_or_default(name: &str, value: i64, default: i64) -> i64 {
    if value > 0 {
        value
    } else {
        warn!("{} must be positive, got {}; using default of {}", name, value, default);
        default
    }
}

const MASKED: &str = "********";

impl fmt::Debug for Notifications {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifications")
            .field("endpoint", &self.endpoint)
            .field("sender", &self.sender)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| MASKED))
            .finish()
    }
}

impl fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailCredentials")
            .field("endpoint", &self.endpoint)
            .field("sender", &self.sender)
            .field("username", &self.username)
            .field("password", &MASKED)
            .finish()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let or_unset = |value: &Option<String>| value.clone().unwrap_or_else(|| "<unset>".to_string());

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Check Interval (s)", &self.monitor.check_interval_seconds)?;
        write_1(f, "Probe Timeout (s)", &self.monitor.probe_timeout_seconds)?;
        write_1(
            f,
            "Max Concurrent Probes",
            &self.monitor.max_concurrent_probes.map_or("unbounded".to_string(), |n| n.to_string()),
        )?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path.display())?;
        write_title_1(f, "Notifications")?;
        write_1(f, "Endpoint", &or_unset(&self.notifications.endpoint))?;
        write_1(f, "Sender", &or_unset(&self.notifications.sender))?;
        write_1(f, "Username", &or_unset(&self.notifications.username))?;
        write_1(f, "Password", &self.notifications.password.as_ref().map_or("<unset>", |_| MASKED))?;
        write_title_1(f, "Retention")?;
        write_1(f, "Check Result Days", &self.retention.check_result_days)?;
        write_1(f, "Cleanup Interval (s)", &self.retention.cleanup_interval_seconds)?;

        Ok(())
    }
}

impl Config {
    /// Load the config file, apply environment overrides and fix invalid values
    pub fn load(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let mut config = Self::from_config(optional_path)?;
        config.apply_env(|name| env::var(name).ok());
        config.normalize();
        Ok(config)
    }

    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/vigil/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(Error::ReadFailed)?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::WriteFailed)?;
        }

        fs::write(path, config_str).map_err(Error::WriteFailed)
    }

    /// Override file values from the environment
    ///
    /// An interval or timeout variable that is set but does not parse is
    /// treated as invalid and replaced by the default.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("CHECK_INTERVAL_SECONDS") {
            self.monitor.check_interval_seconds = raw.trim().parse().unwrap_or_else(|_| {
                warn!("CHECK_INTERVAL_SECONDS is not a number: {:?}", raw);
                0
            });
        }
        if let Some(raw) = lookup("PROBE_TIMEOUT_SECONDS") {
            self.monitor.probe_timeout_seconds = raw.trim().parse().unwrap_or_else(|_| {
                warn!("PROBE_TIMEOUT_SECONDS is not a number: {:?}", raw);
                0
            });
        }
        if let Some(user) = lookup("EMAIL_USER") {
            self.notifications.username = Some(user);
        }
        if let Some(pass) = lookup("EMAIL_PASS") {
            self.notifications.password = Some(pass);
        }
        if let Some(endpoint) = lookup("EMAIL_RELAY_URL") {
            self.notifications.endpoint = Some(endpoint);
        }
        if let Some(path) = lookup("VIGIL_DATABASE_PATH") {
            self.database.path = path::PathBuf::from(path);
        }
    }

    /// Replace invalid values with their defaults
    pub fn normalize(&mut self) {
        self.monitor.check_interval_seconds = positive_or_default(
            "check_interval_seconds",
            self.monitor.check_interval_seconds,
            DEFAULT_CHECK_INTERVAL_SECONDS,
        );
        self.monitor.probe_timeout_seconds = positive_or_default(
            "probe_timeout_seconds",
            self.monitor.probe_timeout_seconds,
            DEFAULT_PROBE_TIMEOUT_SECONDS,
        );

        if self.monitor.max_concurrent_probes == Some(0) {
            self.monitor.max_concurrent_probes = None;
        }

        if self.retention.cleanup_interval_seconds == 0 {
            self.retention.cleanup_interval_seconds = Retention::default().cleanup_interval_seconds;
        }

        if self.notifications.credentials().is_none() {
            warn!("EMAIL_USER, EMAIL_PASS or relay endpoint not set. Email notifications will be disabled.");
        }
    }
}
