use serde::Deserialize;
use std::collections::HashMap;
use std::{env, fs, path::Path};
use thiserror::Error;
use tracing::{error, info};

pub const DEFAULT_CONFIG_PATH: &str = "sitewatch.toml";
/// Upper bound for every `*_seconds` setting (one day).
pub const MAX_DURATION_SECONDS: u64 = 86_400;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("Invalid monitored URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Monitored URL '{url}' resolves to '{address}', which has no server entry")]
    UnknownServer { url: String, address: String },
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
}

#[derive(Deserialize, Clone)]
pub struct ServerEntry {
    pub name: String,
    pub login: String,
    pub password: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
}

// Keeps the password out of logs.
impl std::fmt::Debug for ServerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerEntry")
            .field("name", &self.name)
            .field("login", &self.login)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct MonitorConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub servers: HashMap<String, ServerEntry>,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
    #[serde(default = "default_auto_restart_delay")]
    pub auto_restart_delay_seconds: u64,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
    #[serde(default = "default_cancel_on_recovery")]
    pub cancel_on_recovery: bool,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_check_interval() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_auto_restart_delay() -> u64 {
    10
}

fn default_command_timeout() -> u64 {
    120
}

fn default_cancel_on_recovery() -> bool {
    true
}

impl MonitorConfig {
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Fills in Telegram credentials from `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`
    /// when they are set, so secrets can stay out of the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = env::var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Ok(chat_id) = env::var("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = chat_id;
        }
    }

    /// Strips surrounding whitespace from Telegram credentials. Incoming chat ids
    /// are compared verbatim against `telegram.chat_id`.
    pub fn normalize(&mut self) {
        self.telegram.bot_token = self.telegram.bot_token.trim().to_string();
        self.telegram.chat_id = self.telegram.chat_id.trim().to_string();
    }

    /// Checks required fields and numeric bounds. Cross-references between
    /// URLs and servers are checked when the target registry is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.urls.is_empty() {
            return Err(ConfigError::MissingField("urls".to_string()));
        }
        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::MissingField("telegram.bot_token".to_string()));
        }
        if self.telegram.chat_id.trim().is_empty() {
            return Err(ConfigError::MissingField("telegram.chat_id".to_string()));
        }
        for (address, server) in &self.servers {
            if server.name.trim().is_empty() {
                return Err(ConfigError::MissingField(format!("servers.\"{address}\".name")));
            }
            if server.login.trim().is_empty() {
                return Err(ConfigError::MissingField(format!("servers.\"{address}\".login")));
            }
            if server.password.is_empty() {
                return Err(ConfigError::MissingField(format!(
                    "servers.\"{address}\".password"
                )));
            }
        }
        for (field, value) in [
            ("check_interval_seconds", self.check_interval_seconds),
            ("probe_timeout_seconds", self.probe_timeout_seconds),
            ("command_timeout_seconds", self.command_timeout_seconds),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        for (field, value) in [
            ("check_interval_seconds", self.check_interval_seconds),
            ("probe_timeout_seconds", self.probe_timeout_seconds),
            ("auto_restart_delay_seconds", self.auto_restart_delay_seconds),
            ("command_timeout_seconds", self.command_timeout_seconds),
        ] {
            if value > MAX_DURATION_SECONDS {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("must not exceed {MAX_DURATION_SECONDS}"),
                });
            }
        }
        Ok(())
    }
}

pub fn load_config(config_path_str: &str) -> Result<MonitorConfig, ConfigError> {
    let config_path = Path::new(config_path_str);
    // Canonicalize only for the log line; a missing file is reported by the read below.
    let absolute_path_display = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.to_path_buf());
    info!(path = ?absolute_path_display, "Attempting to load config.");

    let config_str = fs::read_to_string(config_path).map_err(|source| {
        error!(path = %config_path_str, error = %source, "Failed to read config file.");
        ConfigError::Read {
            path: config_path_str.to_string(),
            source,
        }
    })?;

    let mut config = MonitorConfig::from_toml_str(&config_str, config_path_str)?;
    config.apply_env_overrides();
    config.normalize();
    config.validate()?;

    info!(
        urls = config.urls.len(),
        servers = config.servers.len(),
        check_interval_seconds = config.check_interval_seconds,
        auto_restart_delay_seconds = config.auto_restart_delay_seconds,
        "Loaded config successfully."
    );
    Ok(config)
}
