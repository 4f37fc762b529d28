//! Application configuration

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::errors::RecorderError;
use crate::freqmap::{FreqMap, FreqMapEntry};

/// Table written to unless configured otherwise
pub const DEFAULT_TABLE: &str = "dw_packets";

/// Longest identifier PostgreSQL keeps without truncating
const MAX_IDENTIFIER_LEN: usize = 63;

/// Longest table name whose derived index names, `<table>_callsign_idx`
/// being the longest, still fit in an identifier
const MAX_TABLE_LEN: usize = MAX_IDENTIFIER_LEN - "_callsign_idx".len();

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub mqtt: MqttConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub freqmap: Vec<FreqMapEntry>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MqttTransport {
    #[default]
    Tcp,
    Tls,
    /// Websocket over TLS, `host` must then be the full `wss://` URL
    Wss,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub topics: Vec<String>,
    pub client_id: String,
    #[serde(default)]
    pub transport: MqttTransport,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_keep_alive")]
    pub keep_alive: Duration,
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(5)
}

/// Connection parameters of the packet database
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub dbname: String,
    /// Identifies this recorder when several share one table
    #[serde(default)]
    pub instance: i32,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(File::with_name("config/default").required(false))
    }

    /// Load from an explicit configuration file, environment still applies
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::build(File::from(path))
    }

    fn build<S>(file: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("APRSRECORDER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("mqtt.topics"),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn freq_map(&self) -> FreqMap {
        FreqMap::new(self.freqmap.clone())
    }
}

impl DatabaseConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), RecorderError> {
        Self::require("Database name", &self.dbname)?;
        Self::require("Database username", &self.username)?;
        Self::require("Database password", &self.password)?;
        self.validate_table()?;
        Ok(())
    }

    fn require(what: &str, value: &str) -> Result<(), RecorderError> {
        if value.is_empty() {
            return Err(RecorderError::ConfigurationError {
                message: format!("{} has zero length", what),
            });
        }
        Ok(())
    }

    /// The table name ends up in DDL, so only plain identifiers are accepted
    fn validate_table(&self) -> Result<(), RecorderError> {
        let mut chars = self.table.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid_start || !valid_rest || self.table.len() > MAX_TABLE_LEN {
            return Err(RecorderError::ConfigurationError {
                message: format!("Invalid table name {:?}", self.table),
            });
        }
        Ok(())
    }

    /// Host, when one is configured
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().filter(|host| !host.is_empty())
    }

    /// Port, when one is explicitly configured
    pub fn port(&self) -> Option<u16> {
        self.port.filter(|port| *port != 0)
    }

    /// Connection target for these parameters.
    ///
    /// A remote host is always reached with TLS required. Host and port are
    /// left to the driver defaults when not configured.
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .username(&self.username)
            .password(&self.password)
            .database(&self.dbname);
        if let Some(host) = self.host() {
            options = options.host(host).ssl_mode(PgSslMode::Require);
        }
        if let Some(port) = self.port() {
            options = options.port(port);
        }
        options
    }
}
