//! Configuration loading and constants.
//!
//! Settings come from an optional TOML file, then environment variables
//! (`PORT`, `DATABASE_URL`, `APP_ENV`, ...) override individual fields. The
//! result is read once at startup; there is no runtime reconfiguration.
//! `AppConfig` is the root configuration struct containing all settings.

use const_format::formatcp;
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// HTTP Defaults
// =============================================================================

/// Default bind address (all interfaces)
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Maximum accepted request body size (1 MiB)
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Time in seconds that in-flight requests get to finish once shutdown starts
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Upper bound on releasing the data store at shutdown
pub const STORE_RELEASE_TIMEOUT_SECS: u64 = 5;

/// Health responses must never be served from a cache
pub const CACHE_CONTROL_HEALTH: &str = "no-store";

/// Header used to carry the request ID in and out of the service
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// =============================================================================
// Database Defaults
// =============================================================================

/// Maximum pooled connections
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// How long to wait for a pooled connection before giving up. Must stay below
/// the probe timeout so connection errors surface as errors, not timeouts.
pub const DEFAULT_DB_ACQUIRE_TIMEOUT_MS: u64 = 250;

/// Upper bound on a single health probe round trip. A hung database reports
/// `degraded` once this elapses.
pub const DEFAULT_DB_PROBE_TIMEOUT_MS: u64 = 500;

// =============================================================================
// Logging
// =============================================================================

/// Crate name, used as the default service name and log target
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

/// Crate version reported by the root endpoint
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default log filter when neither --log-level nor RUST_LOG is set
pub const DEFAULT_LOG_FILTER: &str = formatcp!("{}=info,tower_http=info", CRATE_NAME);

// =============================================================================
// Environment Variables
// =============================================================================

pub const ENV_PORT: &str = "PORT";
pub const ENV_HOST: &str = "HOST";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_APP_ENV: &str = "APP_ENV";
pub const ENV_SERVICE_NAME: &str = "SERVICE_NAME";
pub const ENV_CORS_ORIGINS: &str = "CORS_ORIGINS";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

/// Deployment mode the process runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    #[serde(alias = "dev")]
    Development,
    #[serde(alias = "prod")]
    Production,
    Test,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        };
        f.write_str(name)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub environment: Environment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Name reported by the root endpoint
    #[serde(default = "ServiceConfig::default_name")]
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
        }
    }
}

impl ServiceConfig {
    fn default_name() -> String {
        CRATE_NAME.to_string()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
    /// Origins allowed by CORS in production (development allows any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "HttpServerConfig::default_body_limit")]
    pub body_limit_bytes: usize,
    #[serde(default = "HttpServerConfig::default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            cors_origins: Vec::new(),
            body_limit_bytes: Self::default_body_limit(),
            shutdown_grace_seconds: Self::default_shutdown_grace(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        DEFAULT_HTTP_HOST.to_string()
    }

    fn default_port() -> u16 {
        DEFAULT_HTTP_PORT
    }

    fn default_body_limit() -> usize {
        DEFAULT_BODY_LIMIT_BYTES
    }

    fn default_shutdown_grace() -> u64 {
        DEFAULT_SHUTDOWN_GRACE_SECS
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

/// Database connection settings
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string; usually supplied through DATABASE_URL
    pub url: Option<String>,
    #[serde(default = "DatabaseConfig::default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "DatabaseConfig::default_acquire_timeout")]
    pub acquire_timeout_ms: u64,
    #[serde(default = "DatabaseConfig::default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: Self::default_max_connections(),
            acquire_timeout_ms: Self::default_acquire_timeout(),
            probe_timeout_ms: Self::default_probe_timeout(),
        }
    }
}

impl DatabaseConfig {
    fn default_max_connections() -> u32 {
        DEFAULT_DB_MAX_CONNECTIONS
    }

    fn default_acquire_timeout() -> u64 {
        DEFAULT_DB_ACQUIRE_TIMEOUT_MS
    }

    fn default_probe_timeout() -> u64 {
        DEFAULT_DB_PROBE_TIMEOUT_MS
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Connection string with any password replaced, safe for logs.
    pub fn redacted_url(&self) -> String {
        match &self.url {
            Some(url) => redact_url(url),
            None => "<unset>".to_string(),
        }
    }
}

// Manual impl so the connection string never ends up in Debug output.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.redacted_url())
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_ms", &self.acquire_timeout_ms)
            .field("probe_timeout_ms", &self.probe_timeout_ms)
            .finish()
    }
}

/// Placeholder written over credentials in logged connection strings
const REDACTED: &str = "REDACTED";

/// Hide credentials in a connection string: the userinfo password and any
/// `password` query parameter. Strings that do not parse are hidden entirely.
fn redact_url(raw: &str) -> String {
    let Ok(mut url) = url::Url::parse(raw) else {
        return format!("<unparseable {}>", REDACTED);
    };

    if url.password().is_some() && url.set_password(Some(REDACTED)).is_err() {
        return format!("<unparseable {}>", REDACTED);
    }

    let has_password_param = url.query_pairs().any(|(key, _)| key == "password");
    if has_password_param {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| {
                let value = if key == "password" {
                    REDACTED.to_string()
                } else {
                    value.into_owned()
                };
                (key.into_owned(), value)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    url.to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" or "json". Unset picks json in production, text elsewhere.
    pub format: Option<LogFormat>,
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then apply overrides
    /// from the process environment and validate.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => AppConfig::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without applying overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Apply environment overrides using `lookup` to resolve variable names.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_PORT) {
            self.http.port = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(ENV_PORT, &value))?;
        }
        if let Some(value) = lookup(ENV_HOST) {
            self.http.host = value;
        }
        if let Some(value) = lookup(ENV_DATABASE_URL) {
            if !value.trim().is_empty() {
                self.database.url = Some(value);
            }
        }
        if let Some(value) = lookup(ENV_APP_ENV) {
            self.environment = value
                .parse()
                .map_err(|_| ConfigError::invalid(ENV_APP_ENV, &value))?;
        }
        if let Some(value) = lookup(ENV_SERVICE_NAME) {
            self.service.name = value;
        }
        if let Some(value) = lookup(ENV_CORS_ORIGINS) {
            self.http.cors_origins = value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(value) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = Some(
                value
                    .parse()
                    .map_err(|_| ConfigError::invalid(ENV_LOG_FORMAT, &value))?,
            );
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_none() {
            return Err(ConfigError::Validation(format!(
                "No database configured. Set {} or [database] url",
                ENV_DATABASE_URL
            )));
        }
        if self.database.probe_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "database.probe_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.database.acquire_timeout_ms >= self.database.probe_timeout_ms {
            return Err(ConfigError::Validation(format!(
                "database.acquire_timeout_ms ({}) must be less than database.probe_timeout_ms ({})",
                self.database.acquire_timeout_ms, self.database.probe_timeout_ms
            )));
        }
        Ok(())
    }

    /// Effective log format for this environment
    pub fn log_format(&self) -> LogFormat {
        self.logging.format.unwrap_or(if self.environment.is_production() {
            LogFormat::Json
        } else {
            LogFormat::Text
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.http.host, self.http.port);
        addr.parse()
            .map_err(|_| ConfigError::invalid("http.host/http.port", &addr))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

impl ConfigError {
    fn invalid(key: &str, value: &str) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_bind_all_interfaces_on_8080() {
        let config = AppConfig::default();
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.service.name, CRATE_NAME);
        assert_eq!(config.bind_addr().unwrap().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn env_overrides_take_effect() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(lookup_from(&[
                ("PORT", "9090"),
                ("DATABASE_URL", "postgres://app:secret@db:5432/app"),
                ("APP_ENV", "prod"),
                ("CORS_ORIGINS", "https://a.example, https://b.example,"),
            ]))
            .unwrap();

        assert_eq!(config.http.port, 9090);
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://app:secret@db:5432/app")
        );
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(
            config.http.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.log_format(), LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(lookup_from(&[("PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "PORT"));
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(lookup_from(&[("APP_ENV", "staging")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn missing_database_url_fails_validation() {
        let config = AppConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
environment = "test"

[service]
name = "probe"

[http]
port = 3000

[database]
url = "postgres://localhost/probe"
probe_timeout_ms = 250
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.service.name, "probe");
        assert_eq!(config.http.port, 3000);
        assert_eq!(config.http.host, DEFAULT_HTTP_HOST);
        assert_eq!(config.environment, Environment::Test);
        assert_eq!(config.database.probe_timeout(), Duration::from_millis(250));
        assert_eq!(config.log_format(), LogFormat::Text);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http\nport = ").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn database_password_is_redacted() {
        let db = DatabaseConfig {
            url: Some("postgres://app:hunter2@db:5432/app".to_string()),
            ..DatabaseConfig::default()
        };
        assert_eq!(db.redacted_url(), "postgres://app:REDACTED@db:5432/app");
        assert!(!format!("{:?}", db).contains("hunter2"));

        let no_password = DatabaseConfig {
            url: Some("postgres://db/app".to_string()),
            ..DatabaseConfig::default()
        };
        assert_eq!(no_password.redacted_url(), "postgres://db/app");
    }

    #[test]
    fn query_password_is_redacted() {
        let db = DatabaseConfig {
            url: Some("postgres://db:5432/app?user=app&password=hunter2&sslmode=require".to_string()),
            ..DatabaseConfig::default()
        };
        let redacted = db.redacted_url();
        assert!(!redacted.contains("hunter2"), "{redacted}");
        assert!(redacted.contains("password=REDACTED"));
        assert!(redacted.contains("user=app"));
        assert!(redacted.contains("sslmode=require"));
        assert!(!format!("{:?}", db).contains("hunter2"));
    }

    #[test]
    fn unparseable_url_is_hidden() {
        let db = DatabaseConfig {
            url: Some("not a url with hunter2".to_string()),
            ..DatabaseConfig::default()
        };
        assert!(!db.redacted_url().contains("hunter2"));
    }

    #[test]
    fn acquire_timeout_must_stay_below_health_check_timeout() {
        let mut config = AppConfig::default();
        config.database.url = Some("postgres://db/app".to_string());
        assert!(config.validate().is_ok());

        config.database.acquire_timeout_ms = config.database.probe_timeout_ms;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }
}
