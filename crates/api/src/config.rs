use chrono::format::{Item, StrftimeItems};
use domain::models::configuration::default_disallowed_fields;
use domain::models::ExportConfiguration;
use serde::Deserialize;
use shared::validation::validate_csv_separator;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Applies to every route except the export step and download routes.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn pool_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// HMAC key for export nonces.
    #[serde(default)]
    pub nonce_secret: String,

    #[serde(default = "default_nonce_lifetime")]
    pub nonce_lifetime_secs: i64,

    /// Only enable behind proper TLS termination.
    #[serde(default)]
    pub hsts_enabled: bool,
}

/// Where request descriptors are kept between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransientBackend {
    Database,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_entries_per_step")]
    pub entries_per_step: u64,

    #[serde(default = "default_request_data_ttl")]
    pub request_data_ttl_secs: i64,

    #[serde(default = "default_csv_export_separator")]
    pub csv_export_separator: String,

    #[serde(default = "default_disallowed_fields")]
    pub disallowed_fields: Vec<String>,

    /// Uploads root; export files live in `<tmp_dir>/export`.
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_minutes: u64,

    /// Minimum time between two temp file sweeps.
    #[serde(default = "default_sweep_gate")]
    pub sweep_gate_secs: i64,

    #[serde(default = "default_date_format")]
    pub date_format: String,

    #[serde(default)]
    pub gmt_offset_hours: f64,

    /// Appends technical detail to export error messages.
    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_transient_backend")]
    pub transient_backend: TransientBackend,

    #[serde(default)]
    pub delete_after_download: bool,

    #[serde(default = "default_require_referer")]
    pub require_referer: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            entries_per_step: default_entries_per_step(),
            request_data_ttl_secs: default_request_data_ttl(),
            csv_export_separator: default_csv_export_separator(),
            disallowed_fields: default_disallowed_fields(),
            tmp_dir: default_tmp_dir(),
            sweep_interval_minutes: default_sweep_interval(),
            sweep_gate_secs: default_sweep_gate(),
            date_format: default_date_format(),
            gmt_offset_hours: 0.0,
            debug: false,
            transient_backend: default_transient_backend(),
            delete_after_download: false,
            require_referer: default_require_referer(),
        }
    }
}

impl ExportConfig {
    /// Export configuration before extension filters run.
    pub fn defaults(&self) -> ExportConfiguration {
        ExportConfiguration {
            request_data_ttl_secs: self.request_data_ttl_secs,
            entries_per_step: self.entries_per_step,
            csv_export_separator: self.csv_export_separator.clone(),
            disallowed_fields: self.disallowed_fields.clone(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_nonce_lifetime() -> i64 {
    86_400
}
fn default_entries_per_step() -> u64 {
    1000
}
fn default_request_data_ttl() -> i64 {
    86_400
}
fn default_csv_export_separator() -> String {
    ",".to_string()
}
fn default_tmp_dir() -> PathBuf {
    PathBuf::from("data/uploads")
}
fn default_sweep_interval() -> u64 {
    10
}
fn default_sweep_gate() -> i64 {
    3600
}
fn default_date_format() -> String {
    "%B %-d, %Y %-I:%M %P".to_string()
}
fn default_transient_backend() -> TransientBackend {
    TransientBackend::Database
}
fn default_require_referer() -> bool {
    true
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with EE__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("EE").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for tests from embedded defaults plus overrides,
    /// without touching config files.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 20
            min_connections = 5
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []
            nonce_secret = "test-nonce-secret"
            nonce_lifetime_secs = 86400

            [export]
            entries_per_step = 1000
            request_data_ttl_secs = 86400
            csv_export_separator = ","
            tmp_dir = "data/uploads"
            transient_backend = "memory"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        // Validation is left to the caller so tests can build partial configs.
        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "EE__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.security.nonce_secret.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "EE__SECURITY__NONCE_SECRET environment variable must be set".to_string(),
            ));
        }

        if self.export.entries_per_step == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "export.entries_per_step must be greater than 0".to_string(),
            ));
        }

        if validate_csv_separator(&self.export.csv_export_separator).is_err() {
            return Err(ConfigValidationError::InvalidValue(
                "export.csv_export_separator must be a single ASCII character".to_string(),
            ));
        }

        if StrftimeItems::new(&self.export.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigValidationError::InvalidValue(format!(
                "export.date_format is not a valid format string: {}",
                self.export.date_format
            )));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
