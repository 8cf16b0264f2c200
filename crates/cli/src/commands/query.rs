//! Read-only recommendation queries against a freshly built engine.

use shopwise_core::config::LoadOptions;
use shopwise_core::domain::ItemId;
use shopwise_core::RecommendationRequest;

use crate::commands::{ready_engine, CommandResult};

#[derive(Debug, Clone, Default)]
pub struct RecommendArgs {
    pub categories: Vec<String>,
    pub acquired: Vec<u64>,
    pub limit: Option<usize>,
}

fn positive_limit(command: &str, limit: Option<usize>) -> Result<(), CommandResult> {
    if limit == Some(0) {
        return Err(CommandResult::failure(
            command,
            "invalid_argument",
            "--limit must be a positive integer",
            2,
        ));
    }
    Ok(())
}

pub fn recommend(options: &LoadOptions, args: RecommendArgs) -> CommandResult {
    if let Err(failure) = positive_limit("recommend", args.limit) {
        return failure;
    }
    let (_, engine) = match ready_engine("recommend", options) {
        Ok(ready) => ready,
        Err(failure) => return failure,
    };

    let request = RecommendationRequest::new(args.limit.unwrap_or(engine.default_limit()))
        .with_preferences(args.categories)
        .with_acquired(args.acquired.into_iter().map(ItemId).collect());
    let items = engine.get_recommendations(&request);

    CommandResult::success_with_data(
        "recommend",
        format!("{} recommendations (model: {})", items.len(), engine.status().model_label()),
        items,
    )
}

pub fn similar(options: &LoadOptions, id: u64, limit: Option<usize>) -> CommandResult {
    if let Err(failure) = positive_limit("similar", limit) {
        return failure;
    }
    let (_, engine) = match ready_engine("similar", options) {
        Ok(ready) => ready,
        Err(failure) => return failure,
    };

    match engine.get_similar_by_id(ItemId(id), limit.unwrap_or(engine.default_limit())) {
        Ok(items) => CommandResult::success_with_data(
            "similar",
            format!("{} items similar to {id}", items.len()),
            items,
        ),
        Err(error) => CommandResult::failure("similar", "unknown_item", error.to_string(), 6),
    }
}

pub fn trending(options: &LoadOptions, limit: Option<usize>) -> CommandResult {
    if let Err(failure) = positive_limit("trending", limit) {
        return failure;
    }
    let (_, engine) = match ready_engine("trending", options) {
        Ok(ready) => ready,
        Err(failure) => return failure,
    };

    let items = engine.get_trending_products(limit.unwrap_or(engine.default_limit()));
    CommandResult::success_with_data("trending", format!("{} trending items", items.len()), items)
}

pub fn category(options: &LoadOptions, label: &str, limit: Option<usize>) -> CommandResult {
    if let Err(failure) = positive_limit("category", limit) {
        return failure;
    }
    let (_, engine) = match ready_engine("category", options) {
        Ok(ready) => ready,
        Err(failure) => return failure,
    };

    let items =
        engine.get_recommendations_by_category(label, limit.unwrap_or(engine.default_limit()));
    CommandResult::success_with_data(
        "category",
        format!("{} items matching category `{label}`", items.len()),
        items,
    )
}

pub fn personalized(
    options: &LoadOptions,
    categories: &[String],
    limit: Option<usize>,
) -> CommandResult {
    if let Err(failure) = positive_limit("personalized", limit) {
        return failure;
    }
    let (_, engine) = match ready_engine("personalized", options) {
        Ok(ready) => ready,
        Err(failure) => return failure,
    };

    let groups = engine.get_personalized_category_recommendations(
        categories,
        limit.unwrap_or(engine.default_limit()),
    );
    CommandResult::success_with_data(
        "personalized",
        format!("{} category groups", groups.len()),
        groups,
    )
}

pub fn random(options: &LoadOptions, limit: Option<usize>) -> CommandResult {
    if let Err(failure) = positive_limit("random", limit) {
        return failure;
    }
    let (_, engine) = match ready_engine("random", options) {
        Ok(ready) => ready,
        Err(failure) => return failure,
    };

    let items = engine.get_random_products(limit.unwrap_or(engine.default_limit()));
    CommandResult::success_with_data("random", format!("{} sampled items", items.len()), items)
}
