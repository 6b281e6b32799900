//! TOML-based configuration for cvault
//!
//! The server reads a single file (`cvault.toml` by default). Secrets are never
//! written into it directly: the file names the environment variable that holds
//! each one, and `.env` files are honoured through `dotenvy` at startup.
//!
//! Configuration is loaded once and validated before the listener binds; a
//! missing or short signing secret aborts startup.

use crate::auth::policy::{standard_rules, AccessPolicy, AccessRule, Requirement};
use crate::types::{is_plausible_email, normalize_email};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Minimum signing secret length in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Longest accepted token or code lifetime: one year.
pub const MAX_TTL_SECS: i64 = 366 * 24 * 60 * 60;

/// Root configuration structure loaded from cvault.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Confirmation code delivery
    #[serde(default)]
    pub mail: MailConfig,

    /// Route prefix to role table
    #[serde(default)]
    pub access: AccessConfig,

    /// Initial SYSADMIN account created at startup if absent
    #[serde(default)]
    pub bootstrap: Option<BootstrapConfig>,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Largest accepted request body, in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,

    /// Browser origins allowed to call the API; empty disables CORS
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            body_limit: default_body_limit(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ============= Authentication Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable name containing the JWT signing secret
    #[serde(default = "default_jwt_secret_env")]
    pub jwt_secret_env: String,

    /// Session token lifetime in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: i64,

    /// Confirmation code lifetime in seconds
    #[serde(default = "default_code_ttl")]
    pub code_ttl_secs: i64,

    /// How often expired codes are swept, in seconds
    #[serde(default = "default_sweep_interval")]
    pub code_sweep_interval_secs: u64,

    #[serde(default)]
    pub password: PasswordConfig,
}

fn default_jwt_secret_env() -> String {
    "JWT_SECRET".to_string()
}

fn default_token_ttl() -> i64 {
    3600
}

fn default_code_ttl() -> i64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_env: default_jwt_secret_env(),
            token_ttl_secs: default_token_ttl(),
            code_ttl_secs: default_code_ttl(),
            code_sweep_interval_secs: default_sweep_interval(),
            password: PasswordConfig::default(),
        }
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.token_ttl_secs).unwrap_or(chrono::Duration::MAX)
    }

    pub fn code_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.code_ttl_secs).unwrap_or(chrono::Duration::MAX)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.code_sweep_interval_secs)
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    #[serde(default = "default_iterations")]
    pub iterations: u32,

    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    19 * 1024
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

// ============= Mail Configuration =============

/// Where confirmation codes go.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MailConfig {
    /// Codes are written to the log at debug level (development only)
    #[default]
    Log,

    /// Codes are POSTed as JSON to an HTTP relay
    Webhook {
        /// Relay URL given inline
        #[serde(default)]
        url: Option<String>,

        /// Environment variable holding the relay URL
        #[serde(default)]
        url_env: Option<String>,

        #[serde(default = "default_webhook_timeout")]
        timeout_secs: u64,
    },
}

fn default_webhook_timeout() -> u64 {
    10
}

// ============= Access Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Requirement for paths no rule matches
    #[serde(default = "default_requirement")]
    pub default: Requirement,

    #[serde(default = "standard_rules")]
    pub rules: Vec<AccessRule>,
}

fn default_requirement() -> Requirement {
    Requirement::Authenticated
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            default: default_requirement(),
            rules: standard_rules(),
        }
    }
}

// ============= Bootstrap Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub admin_email: String,

    #[serde(default = "default_admin_name")]
    pub admin_name: String,

    /// Environment variable holding the initial admin password
    pub admin_password_env: String,
}

fn default_admin_name() -> String {
    "System Administrator".to_string()
}

// ============= Errors =============

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Secret in '{0}' is too short: need at least {1} bytes")]
    WeakSecret(String, usize),
}

impl AppConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and the environment variables it references
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret = self.resolve_required(&self.auth.jwt_secret_env)?;
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakSecret(
                self.auth.jwt_secret_env.clone(),
                MIN_JWT_SECRET_LEN,
            ));
        }

        for (field, secs) in [
            ("token_ttl_secs", self.auth.token_ttl_secs),
            ("code_ttl_secs", self.auth.code_ttl_secs),
        ] {
            if !(1..=MAX_TTL_SECS).contains(&secs) {
                return Err(ConfigError::ValidationError(format!(
                    "auth.{} must be between 1 and {} seconds",
                    field, MAX_TTL_SECS
                )));
            }
        }
        if self.auth.code_sweep_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "auth.code_sweep_interval_secs must be positive".to_string(),
            ));
        }

        let password = &self.auth.password;
        argon2::Params::new(
            password.memory_kib,
            password.iterations,
            password.parallelism,
            None,
        )
        .map_err(|e| ConfigError::ValidationError(format!("auth.password: {}", e)))?;

        for origin in &self.server.cors_origins {
            axum::http::HeaderValue::from_str(origin).map_err(|_| {
                ConfigError::ValidationError(format!("invalid CORS origin '{}'", origin))
            })?;
        }

        for rule in &self.access.rules {
            if !rule.prefix.starts_with('/') {
                return Err(ConfigError::ValidationError(format!(
                    "access rule prefix '{}' must start with '/'",
                    rule.prefix
                )));
            }
        }

        if let MailConfig::Webhook { .. } = self.mail {
            let url = self.webhook_url()?;
            reqwest::Url::parse(&url).map_err(|e| {
                ConfigError::ValidationError(format!("mail webhook url '{}': {}", url, e))
            })?;
        }

        if let Some(bootstrap) = &self.bootstrap {
            if !is_plausible_email(&normalize_email(&bootstrap.admin_email)) {
                return Err(ConfigError::ValidationError(format!(
                    "bootstrap.admin_email '{}' is not an email address",
                    bootstrap.admin_email
                )));
            }
            self.resolve_required(&bootstrap.admin_password_env)?;
        }

        Ok(())
    }

    fn resolve_required(&self, name: &str) -> Result<String, ConfigError> {
        self.resolve_env(name)
            .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.is_empty())
    }

    /// Get the JWT signing secret from the environment
    pub fn jwt_secret(&self) -> Result<SecretString, ConfigError> {
        self.resolve_required(&self.auth.jwt_secret_env)
            .map(SecretString::from)
    }

    /// Get the bootstrap admin password, if bootstrap is configured
    pub fn bootstrap_password(&self) -> Result<Option<SecretString>, ConfigError> {
        self.bootstrap
            .as_ref()
            .map(|b| self.resolve_required(&b.admin_password_env).map(SecretString::from))
            .transpose()
    }

    /// Resolve the webhook relay URL; `url_env` wins over `url`
    pub fn webhook_url(&self) -> Result<String, ConfigError> {
        match &self.mail {
            MailConfig::Webhook { url, url_env, .. } => {
                if let Some(env) = url_env {
                    return self.resolve_required(env);
                }
                url.clone().ok_or_else(|| {
                    ConfigError::ValidationError(
                        "mail webhook needs either 'url' or 'url_env'".to_string(),
                    )
                })
            }
            MailConfig::Log => Err(ConfigError::ValidationError(
                "mail kind is not webhook".to_string(),
            )),
        }
    }

    /// Build the access table
    pub fn policy(&self) -> AccessPolicy {
        AccessPolicy::new(self.access.rules.clone(), self.access.default)
    }
}
