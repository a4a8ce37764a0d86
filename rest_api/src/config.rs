// rest_api/src/config.rs

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_yaml2 as serde_yaml;

use lib::config::StorageConfig;

pub const DEFAULT_REST_API_PORT: u16 = 8082;
pub const DEFAULT_REST_API_HOST: &str = "127.0.0.1";
pub const DEFAULT_CONFIG_PATH: &str = "./config/clinic_config.yaml";
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
/// Environment variable that overrides `rest_api.jwt_secret`.
pub const JWT_SECRET_ENV: &str = "CLINIC_JWT_SECRET";
const INSECURE_DEFAULT_SECRET: &str = "clinic-development-secret-change-me";

fn default_port() -> u16 {
    DEFAULT_REST_API_PORT
}

fn default_host() -> String {
    DEFAULT_REST_API_HOST.to_string()
}

fn default_jwt_secret() -> String {
    INSECURE_DEFAULT_SECRET.to_string()
}

fn default_token_ttl_hours() -> i64 {
    DEFAULT_TOKEN_TTL_HOURS
}

/// An administrator created at startup when no account holds its email yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Settings for the HTTP server itself, under `rest_api:`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for RestApiConfig {
    fn default() -> Self {
        RestApiConfig {
            host: default_host(),
            port: default_port(),
            jwt_secret: default_jwt_secret(),
            token_ttl_hours: default_token_ttl_hours(),
            bootstrap_admin: None,
        }
    }
}

impl RestApiConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == INSECURE_DEFAULT_SECRET
    }
}

/// The whole service config file: `rest_api:` plus the `storage:` section
/// shared with the core library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicApiConfig {
    #[serde(default)]
    pub rest_api: RestApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl ClinicApiConfig {
    pub fn from_yaml_str(content: &str) -> Result<ClinicApiConfig> {
        serde_yaml::from_str(content).context("YAML is not a valid clinic API config")
    }

    /// Reads the config file (defaults when it is absent), then applies the
    /// environment, including any `.env` file in the working directory.
    pub fn load(path: &Path) -> Result<ClinicApiConfig> {
        dotenvy::dotenv().ok();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_yaml_str(&content)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?
        } else {
            info!("Config not found at {:?}, using defaults", path);
            ClinicApiConfig::default()
        };

        let config = config.with_secret_override(std::env::var(JWT_SECRET_ENV).ok());
        if config.rest_api.uses_default_secret() {
            warn!("Using the built-in JWT secret; set {} for any real deployment", JWT_SECRET_ENV);
        }
        debug!("Loaded clinic API config for {}:{}", config.rest_api.host, config.rest_api.port);
        Ok(config)
    }

    pub fn with_secret_override(mut self, secret: Option<String>) -> ClinicApiConfig {
        if let Some(secret) = secret.filter(|s| !s.trim().is_empty()) {
            self.rest_api.jwt_secret = secret;
        }
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.rest_api.host, self.rest_api.port)
    }
}
