use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_STORAGE_BACKEND: &str = "memory";
const DEFAULT_REDIS_NAMESPACE: &str = "pantry";
const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";
const DEFAULT_OTEL_ENDPOINT: &str = "http://localhost:4317";
const SERVICE_NAME: &str = "pantry-api";
const CONFIG_DIR: &str = "config";
const MIN_JWT_SECRET_LEN: usize = 32;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Deployment environment name (development, staging, production, ...)
    #[validate(length(min = 1))]
    pub environment: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    /// Export spans over OTLP/gRPC to `otel_endpoint`
    #[serde(default)]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_endpoint")]
    #[validate(url)]
    pub otel_endpoint: String,

    /// Which repository backend to construct: memory, sql or redis
    #[serde(default = "default_storage_backend")]
    #[validate(custom = "validate_storage_backend")]
    pub storage_backend: String,

    /// Database connection URL, required for the sql backend
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// Run pending migrations when the sql backend starts
    #[serde(default = "default_true_bool")]
    pub auto_migrate: bool,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Key prefix for the redis backend
    #[serde(default = "default_redis_namespace")]
    #[validate(length(min = 1))]
    pub redis_namespace: String,

    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Comma separated list of allowed CORS origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Comma separated list of allowed CORS request headers
    #[serde(default)]
    pub cors_allowed_headers: Option<String>,

    #[serde(default)]
    pub auth_enabled: bool,

    /// HS256 secret used to verify bearer tokens
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default)]
    pub auth_issuer: Option<String>,

    #[serde(default)]
    pub auth_audience: Option<String>,

    /// Base URL of the email HTTP API; selects the email notifier when set
    #[serde(default)]
    #[validate(url)]
    pub email_api_base_url: Option<String>,

    #[serde(default)]
    pub email_api_key: Option<String>,

    #[serde(default)]
    pub email_from: Option<String>,

    #[serde(default = "default_telegram_api_base_url")]
    #[validate(url)]
    pub telegram_api_base_url: String,

    #[serde(default)]
    pub telegram_token: Option<String>,

    #[serde(default)]
    pub telegram_chat_id: Option<String>,

    /// Comma separated recipient emails for the notify job
    #[serde(default)]
    pub notify_recipients: Option<String>,

    #[serde(default = "default_notify_timeout_secs")]
    #[validate(range(min = 1))]
    pub notify_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENV.to_string(),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            log_level: default_log_level(),
            log_json: false,
            otel_enabled: false,
            otel_endpoint: default_otel_endpoint(),
            storage_backend: default_storage_backend(),
            database_url: None,
            db_max_connections: default_db_max_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            auto_migrate: true,
            redis_url: default_redis_url(),
            redis_namespace: default_redis_namespace(),
            request_timeout_secs: default_request_timeout_secs(),
            cors_allowed_origins: None,
            cors_allowed_headers: None,
            auth_enabled: false,
            jwt_secret: None,
            auth_issuer: None,
            auth_audience: None,
            email_api_base_url: None,
            email_api_key: None,
            email_from: None,
            telegram_api_base_url: default_telegram_api_base_url(),
            telegram_token: None,
            telegram_chat_id: None,
            notify_recipients: None,
            notify_timeout_secs: default_notify_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    pub fn cors_origins(&self) -> Vec<String> {
        split_list(self.cors_allowed_origins.as_deref())
    }

    pub fn cors_headers(&self) -> Vec<String> {
        split_list(self.cors_allowed_headers.as_deref())
    }

    pub fn recipients(&self) -> Vec<String> {
        split_list(self.notify_recipients.as_deref())
    }

    /// Collector endpoint when span export is switched on.
    pub fn otel_export_endpoint(&self) -> Option<&str> {
        self.otel_enabled.then_some(self.otel_endpoint.as_str())
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.auth_enabled {
            let secret_len = self
                .jwt_secret
                .as_deref()
                .map(|s| s.trim().chars().count())
                .unwrap_or(0);
            if secret_len < MIN_JWT_SECRET_LEN {
                let mut err = ValidationError::new("jwt_secret_required");
                err.message = Some(
                    "Set APP__JWT_SECRET to at least 32 characters when APP__AUTH_ENABLED=true"
                        .into(),
                );
                errors.add("jwt_secret", err);
            }
        }

        if is_set(&self.telegram_token) && !is_set(&self.telegram_chat_id) {
            let mut err = ValidationError::new("telegram_chat_id_required");
            err.message = Some("A Telegram token needs APP__TELEGRAM_CHAT_ID".into());
            errors.add("telegram_chat_id", err);
        }

        if self.storage_backend.eq_ignore_ascii_case("sql") && !is_set(&self.database_url) {
            let mut err = ValidationError::new("database_url_required");
            err.message = Some("The sql storage backend needs APP__DATABASE_URL".into());
            errors.add("database_url", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_storage_backend() -> String {
    DEFAULT_STORAGE_BACKEND.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_namespace() -> String {
    DEFAULT_REDIS_NAMESPACE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_telegram_api_base_url() -> String {
    DEFAULT_TELEGRAM_API.to_string()
}

fn default_notify_timeout_secs() -> u64 {
    60
}

fn default_otel_endpoint() -> String {
    DEFAULT_OTEL_ENDPOINT.to_string()
}

fn default_true_bool() -> bool {
    true
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_storage_backend(backend: &str) -> Result<(), ValidationError> {
    match backend.to_lowercase().as_str() {
        "memory" | "sql" | "redis" => Ok(()),
        _ => {
            let mut err = ValidationError::new("storage_backend");
            err.message = Some("Must be one of: memory, sql, redis".into());
            Err(err)
        }
    }
}

/// Initializes tracing using the provided log level as the default filter.
/// With an OTLP endpoint, spans are also exported to that collector.
pub fn init_tracing(level: &str, json: bool, otlp_endpoint: Option<&str>) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("pantry_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let Some(endpoint) = otlp_endpoint else {
        init_fmt_only(filter_directive, json);
        return;
    };

    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let resource = Resource::new(vec![KeyValue::new("service.name", SERVICE_NAME)]);
    let tracer = match opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(sdktrace::config().with_resource(resource))
        .install_batch(opentelemetry_sdk::runtime::Tokio)
    {
        Ok(tracer) => tracer,
        Err(err) => {
            init_fmt_only(filter_directive, json);
            error!("Failed to install OTLP pipeline: {}", err);
            return;
        }
    };

    let base = tracing_subscriber::registry()
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(EnvFilter::new(filter_directive));

    if json {
        let _ = base.with(fmt::layer().json()).try_init();
    } else {
        let _ = base.with(fmt::layer()).try_init();
    }
    info!(endpoint, "Exporting spans over OTLP");
}

fn init_fmt_only(filter_directive: String, json: bool) {
    use tracing_subscriber::fmt;

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Flushes spans still queued for export. A no-op when export is off.
pub fn shutdown_tracing() {
    opentelemetry::global::shutdown_tracer_provider();
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] but reads the config files from `dir`.
pub fn load_config_from(dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            dir.display()
        );
    }

    let config = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(dir.join("default")).required(false))
        .add_source(File::from(dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration consistency check failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!(
        backend = %app_config.storage_backend,
        "Configuration loaded successfully"
    );
    Ok(app_config)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn setup_test_config(content: &str) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let mut file = File::create(temp_dir.path().join("default.toml")).unwrap();
        writeln!(file, "{}", content).unwrap();
        temp_dir
    }

    #[test]
    fn loads_values_from_default_file() {
        let dir = setup_test_config(
            r#"
            environment = "development"
            port = 9090
            storage_backend = "sql"
            database_url = "sqlite::memory:"
            notify_recipients = "me@example.com"
            "#,
        );

        let config = load_config_from(dir.path()).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.storage_backend, "sql");
        assert_eq!(config.recipients(), vec!["me@example.com".to_string()]);
    }

    #[test]
    fn invalid_file_fails_validation() {
        let dir = setup_test_config(
            r#"
            storage_backend = "sql"
            log_level = "chatty"
            "#,
        );

        let result = load_config_from(dir.path());
        assert!(matches!(result, Err(AppConfigError::Validation(_))));
    }
}
