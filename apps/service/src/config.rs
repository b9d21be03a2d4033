use std::{env, fmt, fs, path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::history::{DEFAULT_RETENTION_DAYS, RetentionPolicy};
use crate::targets::{DEFAULT_TARGET_IDS, DEFAULT_URL_TEMPLATE, Target, TargetRegistry};

const MIN_INTERVAL_SECS: u64 = 10;
const MAX_INTERVAL_SECS: u64 = 86_400;
const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub monitoring: Monitoring,
    pub targets: Targets,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitoring {
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub retention_days: u32,
    pub history_path: path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Targets {
    /// `{id}` is replaced by each entry of `ids`.
    pub url_template: String,
    pub ids: Vec<String>,
    /// Targets with an explicit URL, probed after the templated ones.
    pub extra: Vec<ExtraTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraTarget {
    pub id: String,
    pub url: String,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/statusboard/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("statusboard/config.toml"))
}

impl Default for Server {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 3005 }
    }
}

impl Default for Monitoring {
    fn default() -> Self {
        Self {
            interval_secs: 3 * 60 * 60,
            timeout_secs: 5,
            retention_days: DEFAULT_RETENTION_DAYS,
            history_path: "history.json".into(),
        }
    }
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.into(),
            ids: DEFAULT_TARGET_IDS.iter().map(|id| (*id).to_string()).collect(),
            extra: Vec::new(),
        }
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

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Server")?;
        write_1(f, "Bind Address", &self.server.bind)?;
        write_1(f, "Port", &self.server.port)?;
        write_title_1(f, "Monitoring")?;
        write_1(f, "Interval (s)", &self.monitoring.interval_secs)?;
        write_1(f, "Timeout (s)", &self.monitoring.timeout_secs)?;
        write_1(f, "Retention (days)", &self.monitoring.retention_days)?;
        write_1(f, "History File", &self.monitoring.history_path.display())?;
        write_title_1(f, "Targets")?;
        write_1(f, "URL Template", &self.targets.url_template)?;
        write_1(f, "Templated", &self.targets.ids.len())?;
        write_1(f, "Explicit", &self.targets.extra.len())?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/statusboard/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Apply `BIND` and `PORT` from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| env::var(name).ok())
    }

    /// Apply `BIND` and `PORT` from `lookup`. Unparseable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(bind) = lookup("BIND").filter(|bind| !bind.trim().is_empty()) {
            self.server.bind = bind;
        }
        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %port, "Ignoring invalid PORT"),
            }
        }
        self
    }

    /// Clamp out-of-range monitoring values, warning about each change.
    pub fn validated(mut self) -> Self {
        let monitoring = &mut self.monitoring;

        monitoring.interval_secs =
            clamp_logged("interval_secs", monitoring.interval_secs, MIN_INTERVAL_SECS, MAX_INTERVAL_SECS);
        monitoring.timeout_secs =
            clamp_logged("timeout_secs", monitoring.timeout_secs, MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
        if monitoring.retention_days == 0 {
            warn!("retention_days must be at least 1, using 1");
            monitoring.retention_days = 1;
        }

        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.monitoring.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.monitoring.timeout_secs)
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.monitoring.retention_days)
    }

    /// Templated targets followed by explicit ones; duplicate ids keep the first.
    pub fn registry(&self) -> TargetRegistry {
        let templated = self.targets.ids.iter().map(|id| Target::from_template(&self.targets.url_template, id));
        let explicit = self.targets.extra.iter().map(|extra| Target::new(&extra.id, &extra.url));
        TargetRegistry::new(templated.chain(explicit))
    }
}

fn clamp_logged(name: &str, value: u64, min: u64, max: u64) -> u64 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!(setting = name, value, clamped, "Configuration value out of range");
    }
    clamped
}
