use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

use crate::ledger::CreateAccountParams;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Invalid SERVER_ADDRESS '{0}', expected host:port")]
    ServerAddress(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Extra `EnvFilter` directives appended after `log_level`
    #[serde(default = "default_log_directives")]
    pub log_directives: Vec<String>,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL; overridden by `DB_SOURCE`
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

// sqlx logs every statement at info
fn default_log_directives() -> Vec<String> {
    vec!["sqlx=warn".to_string()]
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout_ms: 5000,
        }
    }
}

/// Transfer transaction limits. `0` disables a limit.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LedgerConfig {
    /// Deadline for a whole transfer unit of work
    #[serde(default)]
    pub tx_timeout_ms: u64,
    /// Postgres `lock_timeout` for row-lock waits
    #[serde(default)]
    pub lock_timeout_ms: u64,
    /// Accounts opened at startup (in-memory backend only)
    #[serde(default)]
    pub seed_accounts: Vec<CreateAccountParams>,
}

impl LedgerConfig {
    pub fn tx_timeout(&self) -> Option<Duration> {
        (self.tx_timeout_ms > 0).then(|| Duration::from_millis(self.tx_timeout_ms))
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        (self.lock_timeout_ms > 0).then(|| Duration::from_millis(self.lock_timeout_ms))
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml`, then apply environment overrides
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        let mut config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: config_path,
            source,
        })?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// `DB_SOURCE` replaces the postgres URL, `SERVER_ADDRESS` the gateway host:port
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("DB_SOURCE").filter(|s| !s.is_empty()) {
            self.postgres_url = Some(url);
        }
        if let Some(addr) = lookup("SERVER_ADDRESS").filter(|s| !s.is_empty()) {
            let (host, port) = addr
                .rsplit_once(':')
                .ok_or_else(|| ConfigError::ServerAddress(addr.clone()))?;
            self.gateway.port = port
                .parse()
                .map_err(|_| ConfigError::ServerAddress(addr.clone()))?;
            self.gateway.host = host.to_string();
        }
        Ok(())
    }
}
