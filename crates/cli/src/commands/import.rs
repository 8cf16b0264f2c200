use serde_json::json;
use shopwise_core::catalog::CatalogSource;
use shopwise_core::config::{CatalogSourceKind, LoadOptions};

use crate::commands::{build_runtime, load_config, CommandResult};

/// Copies the catalog from `from` (static or http; defaults to the
/// configured source, or http when that is sqlite) into the sqlite store.
pub fn run(options: &LoadOptions, from: Option<&str>) -> CommandResult {
    let config = match load_config("import", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let kind = match from.map(str::parse::<CatalogSourceKind>) {
        Some(Ok(kind)) => kind,
        Some(Err(error)) => {
            return CommandResult::failure("import", "invalid_argument", error.to_string(), 2);
        }
        None if config.catalog.source == CatalogSourceKind::Sqlite => CatalogSourceKind::Http,
        None => config.catalog.source,
    };
    if kind == CatalogSourceKind::Sqlite {
        return CommandResult::failure(
            "import",
            "invalid_argument",
            "import source must be `static` or `http`",
            2,
        );
    }

    let runtime = match build_runtime("import") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let mut source_config = config.catalog.clone();
    source_config.source = kind;

    let result = runtime.block_on(async {
        let source = shopwise_catalog::open_source(&source_config)
            .await
            .map_err(|error| ("catalog_unavailable", error.to_string(), 4u8))?;
        let items = source
            .fetch_items()
            .await
            .map_err(|error| ("catalog_unavailable", error.to_string(), 4u8))?;
        if items.is_empty() {
            return Err(("empty_catalog", "source returned no items".to_string(), 5u8));
        }
        let categories = source.fetch_categories().await.unwrap_or_default();

        let store = shopwise_catalog::open_store(&config.catalog)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let imported = store
            .replace_all(&items, &categories)
            .await
            .map_err(|error| ("storage", error.to_string(), 5u8))?;

        Ok::<_, (&'static str, String, u8)>((source.name(), imported, categories.len()))
    });

    match result {
        Ok((source_name, imported, category_count)) => CommandResult::success_with_data(
            "import",
            format!("imported {imported} items from `{source_name}` source"),
            json!({
                "source": source_name,
                "imported": imported,
                "categories": category_count,
                "database_url": config.catalog.database_url,
            }),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("import", error_class, message, exit_code)
        }
    }
}
