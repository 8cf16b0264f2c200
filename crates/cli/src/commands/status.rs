use shopwise_core::config::LoadOptions;

use crate::commands::{ready_engine, CommandResult};

pub fn run(options: &LoadOptions) -> CommandResult {
    let (config, engine) = match ready_engine("status", options) {
        Ok(ready) => ready,
        Err(failure) => return failure,
    };

    let summary = engine.status().summary();
    CommandResult::success_with_data(
        "status",
        format!(
            "engine {} with {} items from `{}` source (model: {})",
            summary.state.as_str(),
            summary.item_count,
            config.catalog.source.as_str(),
            summary.model
        ),
        summary,
    )
}
