pub mod toml_config;

use crate::utils::error::Result;
use crate::utils::validation::{
    validate_database_url, validate_positive_number, validate_range, validate_required_field,
    Validate,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use toml_config::TomlConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "org-chart")]
#[command(about = "Department hierarchy and employee directory over HTTP")]
pub struct ServerCli {
    /// Path to an optional TOML configuration file
    #[arg(short, long, env = "APP_CONFIG")]
    pub config: Option<String>,

    #[arg(long, env = "APP_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "APP_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "APP_STORAGE", value_enum)]
    pub storage: Option<StorageKind>,

    #[arg(long)]
    pub max_connections: Option<u32>,

    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Apply the database schema before serving
    #[arg(long)]
    pub migrate: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

/// Effective configuration: built-in defaults, then the TOML file, then CLI/env values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageKind,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub run_migrations: bool,
    pub verbose: bool,
    pub json_logs: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            storage: StorageKind::Postgres,
            database_url: None,
            max_connections: 10,
            acquire_timeout_secs: 5,
            request_timeout_secs: 30,
            run_migrations: false,
            verbose: false,
            json_logs: false,
        }
    }
}

impl AppConfig {
    pub fn resolve(cli: &ServerCli) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = &cli.config {
            config.apply_file(&TomlConfig::from_file(path)?);
        }
        config.apply_cli(cli);
        Ok(config)
    }

    pub fn apply_file(&mut self, file: &TomlConfig) {
        if let Some(host) = &file.server.host {
            self.host = host.clone();
        }
        if let Some(port) = file.server.port {
            self.port = port;
        }
        if let Some(timeout) = file.server.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        if let Some(storage) = file.database.storage {
            self.storage = storage;
        }
        if let Some(url) = &file.database.url {
            self.database_url = Some(url.clone());
        }
        if let Some(max) = file.database.max_connections {
            self.max_connections = max;
        }
        if let Some(timeout) = file.database.acquire_timeout_secs {
            self.acquire_timeout_secs = timeout;
        }
        if let Some(migrate) = file.database.run_migrations {
            self.run_migrations = migrate;
        }
        if let Some(verbose) = file.logging.verbose {
            self.verbose = verbose;
        }
        if let Some(json) = file.logging.json {
            self.json_logs = json;
        }
    }

    pub fn apply_cli(&mut self, cli: &ServerCli) {
        if let Some(host) = &cli.host {
            self.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(url) = &cli.database_url {
            self.database_url = Some(url.clone());
        }
        if let Some(storage) = cli.storage {
            self.storage = storage;
        }
        if let Some(max) = cli.max_connections {
            self.max_connections = max;
        }
        if let Some(timeout) = cli.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        // 旗標只能開啟，不會覆蓋檔案中的 true
        self.run_migrations |= cli.migrate;
        self.verbose |= cli.verbose;
        self.json_logs |= cli.json_logs;
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_range("server.port", self.port, 1, u16::MAX)?;
        validate_positive_number(
            "server.request_timeout_secs",
            self.request_timeout_secs,
            1,
        )?;
        validate_positive_number("database.max_connections", self.max_connections as u64, 1)?;

        if self.storage == StorageKind::Postgres {
            let url = validate_required_field("database.url", &self.database_url)?;
            validate_database_url("database.url", url)?;
        }

        Ok(())
    }
}
