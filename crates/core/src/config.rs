use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ml::TrainingConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub engine: EngineConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub source: CatalogSourceKind,
    pub base_url: String,
    pub timeout_secs: u64,
    pub api_token: Option<SecretString>,
    pub database_url: String,
    pub max_connections: u32,
    pub database_timeout_secs: u64,
    /// Serve the built-in dataset when the configured source fails or is empty.
    pub fallback_to_static: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub default_limit: usize,
    /// Seeds trending noise, random samples and model initialization. `None`
    /// draws a fresh seed from the OS.
    pub random_seed: Option<u64>,
    pub epochs: usize,
    pub batch_size_cap: usize,
    pub validation_split: f64,
    pub learning_rate: f64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
    /// Reload the catalog from its source on this interval; 0 disables it.
    pub refresh_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSourceKind {
    Static,
    Http,
    Sqlite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub catalog_source: Option<CatalogSourceKind>,
    pub catalog_base_url: Option<String>,
    pub database_url: Option<String>,
    pub random_seed: Option<u64>,
    pub server_port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["shopwise.toml", "config/shopwise.toml"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig {
                source: CatalogSourceKind::Static,
                base_url: "https://fakestoreapi.com".to_string(),
                timeout_secs: 10,
                api_token: None,
                database_url: "sqlite://shopwise.db".to_string(),
                max_connections: 5,
                database_timeout_secs: 30,
                fallback_to_static: true,
            },
            engine: EngineConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
                refresh_interval_secs: 0,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: crate::recommend::DEFAULT_LIMIT,
            random_seed: None,
            epochs: TrainingConfig::DEFAULT_EPOCHS,
            batch_size_cap: TrainingConfig::DEFAULT_BATCH_SIZE_CAP,
            validation_split: TrainingConfig::DEFAULT_VALIDATION_SPLIT,
            learning_rate: TrainingConfig::DEFAULT_LEARNING_RATE,
        }
    }
}

impl EngineConfig {
    /// Training parameters for one build, seeded with `seed`.
    pub fn training(&self, seed: u64) -> TrainingConfig {
        TrainingConfig {
            epochs: self.epochs,
            batch_size_cap: self.batch_size_cap,
            validation_split: self.validation_split,
            learning_rate: self.learning_rate,
            seed,
            ..TrainingConfig::default()
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for CatalogSourceKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "http" => Ok(Self::Http),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::Validation(format!(
                "unsupported catalog source `{other}` (expected static|http|sqlite)"
            ))),
        }
    }
}

impl CatalogSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Http => "http",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(catalog) = patch.catalog {
            if let Some(source) = catalog.source {
                self.catalog.source = source;
            }
            if let Some(base_url) = catalog.base_url {
                self.catalog.base_url = base_url;
            }
            if let Some(timeout_secs) = catalog.timeout_secs {
                self.catalog.timeout_secs = timeout_secs;
            }
            if let Some(api_token) = catalog.api_token {
                self.catalog.api_token = Some(secret_value(api_token));
            }
            if let Some(database_url) = catalog.database_url {
                self.catalog.database_url = database_url;
            }
            if let Some(max_connections) = catalog.max_connections {
                self.catalog.max_connections = max_connections;
            }
            if let Some(database_timeout_secs) = catalog.database_timeout_secs {
                self.catalog.database_timeout_secs = database_timeout_secs;
            }
            if let Some(fallback_to_static) = catalog.fallback_to_static {
                self.catalog.fallback_to_static = fallback_to_static;
            }
        }

        if let Some(engine) = patch.engine {
            if let Some(default_limit) = engine.default_limit {
                self.engine.default_limit = default_limit;
            }
            if let Some(random_seed) = engine.random_seed {
                self.engine.random_seed = Some(random_seed);
            }
            if let Some(epochs) = engine.epochs {
                self.engine.epochs = epochs;
            }
            if let Some(batch_size_cap) = engine.batch_size_cap {
                self.engine.batch_size_cap = batch_size_cap;
            }
            if let Some(validation_split) = engine.validation_split {
                self.engine.validation_split = validation_split;
            }
            if let Some(learning_rate) = engine.learning_rate {
                self.engine.learning_rate = learning_rate;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(refresh_interval_secs) = server.refresh_interval_secs {
                self.server.refresh_interval_secs = refresh_interval_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SHOPWISE_CATALOG_SOURCE") {
            self.catalog.source = value.parse()?;
        }
        if let Some(value) = read_env("SHOPWISE_CATALOG_BASE_URL") {
            self.catalog.base_url = value;
        }
        if let Some(value) = read_env("SHOPWISE_CATALOG_TIMEOUT_SECS") {
            self.catalog.timeout_secs = parse_u64("SHOPWISE_CATALOG_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_CATALOG_API_TOKEN") {
            self.catalog.api_token = Some(secret_value(value));
        }
        let database_url =
            read_env("SHOPWISE_CATALOG_DATABASE_URL").or_else(|| read_env("SHOPWISE_DATABASE_URL"));
        if let Some(value) = database_url {
            self.catalog.database_url = value;
        }
        if let Some(value) = read_env("SHOPWISE_CATALOG_MAX_CONNECTIONS") {
            self.catalog.max_connections = parse_u32("SHOPWISE_CATALOG_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_CATALOG_DATABASE_TIMEOUT_SECS") {
            self.catalog.database_timeout_secs =
                parse_u64("SHOPWISE_CATALOG_DATABASE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_CATALOG_FALLBACK_TO_STATIC") {
            self.catalog.fallback_to_static =
                parse_bool("SHOPWISE_CATALOG_FALLBACK_TO_STATIC", &value)?;
        }

        if let Some(value) = read_env("SHOPWISE_ENGINE_DEFAULT_LIMIT") {
            self.engine.default_limit = parse_usize("SHOPWISE_ENGINE_DEFAULT_LIMIT", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_ENGINE_RANDOM_SEED") {
            self.engine.random_seed = Some(parse_u64("SHOPWISE_ENGINE_RANDOM_SEED", &value)?);
        }
        if let Some(value) = read_env("SHOPWISE_ENGINE_EPOCHS") {
            self.engine.epochs = parse_usize("SHOPWISE_ENGINE_EPOCHS", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_ENGINE_BATCH_SIZE_CAP") {
            self.engine.batch_size_cap = parse_usize("SHOPWISE_ENGINE_BATCH_SIZE_CAP", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_ENGINE_VALIDATION_SPLIT") {
            self.engine.validation_split = parse_f64("SHOPWISE_ENGINE_VALIDATION_SPLIT", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_ENGINE_LEARNING_RATE") {
            self.engine.learning_rate = parse_f64("SHOPWISE_ENGINE_LEARNING_RATE", &value)?;
        }

        if let Some(value) = read_env("SHOPWISE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SHOPWISE_SERVER_PORT") {
            self.server.port = parse_u16("SHOPWISE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SHOPWISE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("SHOPWISE_SERVER_REFRESH_INTERVAL_SECS") {
            self.server.refresh_interval_secs =
                parse_u64("SHOPWISE_SERVER_REFRESH_INTERVAL_SECS", &value)?;
        }

        let log_level =
            read_env("SHOPWISE_LOGGING_LEVEL").or_else(|| read_env("SHOPWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SHOPWISE_LOGGING_FORMAT").or_else(|| read_env("SHOPWISE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(source) = overrides.catalog_source {
            self.catalog.source = source;
        }
        if let Some(base_url) = overrides.catalog_base_url {
            self.catalog.base_url = base_url;
        }
        if let Some(database_url) = overrides.database_url {
            self.catalog.database_url = database_url;
        }
        if let Some(random_seed) = overrides.random_seed {
            self.engine.random_seed = Some(random_seed);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_catalog(&self.catalog)?;
        validate_engine(&self.engine)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// First existing config file, either the explicit path or one of
/// [`CONFIG_FILE_CANDIDATES`].
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_sqlite_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:"
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.source == CatalogSourceKind::Http {
        let base_url = catalog.base_url.trim();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "catalog.base_url must start with http:// or https:// when catalog.source is http"
                    .to_string(),
            ));
        }
    }

    if catalog.timeout_secs == 0 || catalog.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "catalog.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if let Some(token) = &catalog.api_token {
        if token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "catalog.api_token is set but empty; remove it or provide a token".to_string(),
            ));
        }
    }

    if !is_sqlite_url(&catalog.database_url) {
        return Err(ConfigError::Validation(
            "catalog.database_url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if catalog.max_connections == 0 {
        return Err(ConfigError::Validation(
            "catalog.max_connections must be greater than zero".to_string(),
        ));
    }

    if catalog.database_timeout_secs == 0 || catalog.database_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "catalog.database_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if engine.default_limit == 0 || engine.default_limit > 100 {
        return Err(ConfigError::Validation(
            "engine.default_limit must be in range 1..=100".to_string(),
        ));
    }

    if engine.epochs > 10_000 {
        return Err(ConfigError::Validation("engine.epochs must be at most 10000".to_string()));
    }

    if engine.batch_size_cap == 0 {
        return Err(ConfigError::Validation(
            "engine.batch_size_cap must be greater than zero".to_string(),
        ));
    }

    if !(0.0..1.0).contains(&engine.validation_split) {
        return Err(ConfigError::Validation(
            "engine.validation_split must be in range [0, 1)".to_string(),
        ));
    }

    if !engine.learning_rate.is_finite() || engine.learning_rate <= 0.0 {
        return Err(ConfigError::Validation(
            "engine.learning_rate must be a positive number".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    if server.refresh_interval_secs != 0 && server.refresh_interval_secs < 10 {
        return Err(ConfigError::Validation(
            "server.refresh_interval_secs must be 0 (disabled) or at least 10".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    catalog: Option<CatalogPatch>,
    engine: Option<EnginePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    source: Option<CatalogSourceKind>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    api_token: Option<String>,
    database_url: Option<String>,
    max_connections: Option<u32>,
    database_timeout_secs: Option<u64>,
    fallback_to_static: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    default_limit: Option<usize>,
    random_seed: Option<u64>,
    epochs: Option<usize>,
    batch_size_cap: Option<usize>,
    validation_split: Option<f64>,
    learning_rate: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    refresh_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
