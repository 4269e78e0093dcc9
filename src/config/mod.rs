pub mod cli;
pub mod toml_config;

pub use cli::{CliConfig, Environment, LogFormat};
pub use toml_config::TomlConfig;

use crate::utils::error::Result;
use crate::utils::validation::{
    validate_api_name, validate_backend, validate_non_empty_string, validate_range, validate_url,
    Validate,
};
use std::time::Duration;

const BYTES_PER_MB: usize = 1024 * 1024;

/// Settings after flags, environment and the optional config file are merged.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub cors_origin: String,
    pub backend: String,
    pub api_name: String,
    pub hf_token: Option<String>,
    pub timeout_secs: u64,
    pub max_upload_mb: usize,
    pub log_format: LogFormat,
    pub verbose: bool,
}

impl RelayConfig {
    /// 讀取 CLI 參數，若指定了設定檔則以檔案中的值覆蓋
    pub fn from_cli(cli: CliConfig) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };
        Ok(Self::merge(cli, file))
    }

    pub fn merge(cli: CliConfig, file: TomlConfig) -> Self {
        let TomlConfig {
            server,
            backend,
            limits,
        } = file;

        Self {
            host: server.host.unwrap_or(cli.host),
            port: server.port.unwrap_or(cli.port),
            environment: server.environment.unwrap_or(cli.environment),
            cors_origin: server.cors_origin.unwrap_or(cli.cors_origin),
            log_format: server.log_format.unwrap_or(cli.log_format),
            backend: backend.target.unwrap_or(cli.backend),
            api_name: backend.api_name.unwrap_or(cli.api_name),
            hf_token: backend.hf_token.or(cli.hf_token).filter(|t| !t.is_empty()),
            timeout_secs: limits.timeout_secs.unwrap_or(cli.timeout_secs),
            max_upload_mb: limits.max_upload_mb.unwrap_or(cli.max_upload_mb),
            verbose: cli.verbose,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * BYTES_PER_MB
    }
}

impl Validate for RelayConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("host", &self.host)?;
        validate_range("port", self.port, 1, u16::MAX)?;
        validate_url("cors_origin", &self.cors_origin)?;
        validate_backend("backend", &self.backend)?;
        validate_api_name("api_name", &self.api_name)?;
        validate_range("timeout_secs", self.timeout_secs, 1, 600)?;
        validate_range("max_upload_mb", self.max_upload_mb, 1, 100)?;

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}
