pub mod config;
pub mod import;
pub mod migrate;
pub mod query;
pub mod status;

use serde::Serialize;
use serde_json::Value;
use shopwise_core::config::{AppConfig, LoadOptions};
use shopwise_core::RecommendationEngine;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, Value::Null)
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: impl Serialize) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(Value::Null) => None,
            Ok(value) => Some(value),
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), 1);
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str, options: &LoadOptions) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options.clone()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn build_runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Loads configuration, opens the configured catalog source and builds the
/// first engine generation on a current-thread runtime.
pub(crate) fn ready_engine(
    command: &str,
    options: &LoadOptions,
) -> Result<(AppConfig, RecommendationEngine), CommandResult> {
    let config = load_config(command, options)?;
    let runtime = build_runtime(command)?;

    let engine = runtime.block_on(async {
        let source = shopwise_catalog::open_source(&config.catalog)
            .await
            .map_err(|error| ("catalog_unavailable", error.to_string(), 4u8))?;
        let engine = RecommendationEngine::new(source, config.engine.clone());
        engine
            .initialize(None)
            .await
            .map_err(|error| ("engine_build", error.to_string(), 5u8))?;
        Ok::<RecommendationEngine, (&'static str, String, u8)>(engine)
    });

    match engine {
        Ok(engine) => Ok((config, engine)),
        Err((error_class, message, exit_code)) => {
            Err(CommandResult::failure(command, error_class, message, exit_code))
        }
    }
}
