use std::env;
use std::fs;
use std::path::Path;

use secrecy::ExposeSecret;
use shopwise_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let api_token = match &config.catalog.api_token {
        Some(token) => redact_token(token.expose_secret()),
        None => "<unset>".to_string(),
    };
    let random_seed =
        config.engine.random_seed.map_or_else(|| "<entropy>".to_string(), |seed| seed.to_string());

    let fields = vec![
        field(
            "catalog.source",
            config.catalog.source.as_str().to_string(),
            &["SHOPWISE_CATALOG_SOURCE"],
        ),
        field("catalog.base_url", config.catalog.base_url.clone(), &["SHOPWISE_CATALOG_BASE_URL"]),
        field(
            "catalog.timeout_secs",
            config.catalog.timeout_secs.to_string(),
            &["SHOPWISE_CATALOG_TIMEOUT_SECS"],
        ),
        field("catalog.api_token", api_token, &["SHOPWISE_CATALOG_API_TOKEN"]),
        field(
            "catalog.database_url",
            config.catalog.database_url.clone(),
            &["SHOPWISE_CATALOG_DATABASE_URL", "SHOPWISE_DATABASE_URL"],
        ),
        field(
            "catalog.max_connections",
            config.catalog.max_connections.to_string(),
            &["SHOPWISE_CATALOG_MAX_CONNECTIONS"],
        ),
        field(
            "catalog.database_timeout_secs",
            config.catalog.database_timeout_secs.to_string(),
            &["SHOPWISE_CATALOG_DATABASE_TIMEOUT_SECS"],
        ),
        field(
            "catalog.fallback_to_static",
            config.catalog.fallback_to_static.to_string(),
            &["SHOPWISE_CATALOG_FALLBACK_TO_STATIC"],
        ),
        field(
            "engine.default_limit",
            config.engine.default_limit.to_string(),
            &["SHOPWISE_ENGINE_DEFAULT_LIMIT"],
        ),
        field("engine.random_seed", random_seed, &["SHOPWISE_ENGINE_RANDOM_SEED"]),
        field("engine.epochs", config.engine.epochs.to_string(), &["SHOPWISE_ENGINE_EPOCHS"]),
        field(
            "engine.batch_size_cap",
            config.engine.batch_size_cap.to_string(),
            &["SHOPWISE_ENGINE_BATCH_SIZE_CAP"],
        ),
        field(
            "engine.validation_split",
            config.engine.validation_split.to_string(),
            &["SHOPWISE_ENGINE_VALIDATION_SPLIT"],
        ),
        field(
            "engine.learning_rate",
            config.engine.learning_rate.to_string(),
            &["SHOPWISE_ENGINE_LEARNING_RATE"],
        ),
        field(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["SHOPWISE_SERVER_BIND_ADDRESS"],
        ),
        field("server.port", config.server.port.to_string(), &["SHOPWISE_SERVER_PORT"]),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["SHOPWISE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field(
            "server.refresh_interval_secs",
            config.server.refresh_interval_secs.to_string(),
            &["SHOPWISE_SERVER_REFRESH_INTERVAL_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["SHOPWISE_LOGGING_LEVEL", "SHOPWISE_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["SHOPWISE_LOGGING_FORMAT", "SHOPWISE_LOG_FORMAT"],
        ),
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in fields {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

struct Field {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn field(key_path: &'static str, value: String, env_keys: &'static [&'static str]) -> Field {
    Field { key_path, value, env_keys }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let visible: String = trimmed.chars().take(4).collect();
    if trimmed.chars().count() > 8 {
        return format!("{visible}***");
    }

    "<redacted>".to_string()
}
