pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use shopwise_core::config::{CatalogSourceKind, ConfigError, ConfigOverrides, LoadOptions};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "shopwise",
    about = "Shopwise recommendation CLI",
    long_about = "Query catalog recommendations, inspect engine status, import catalogs into sqlite, and inspect configuration.",
    after_help = "Examples:\n  shopwise recommend --category electronics --acquired 1 --limit 4\n  shopwise similar 3\n  shopwise import --from http\n  shopwise config"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Path to a shopwise.toml configuration file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Catalog source override: static, http or sqlite")]
    source: Option<String>,
    #[arg(long, global = true, help = "Catalog API base URL override")]
    base_url: Option<String>,
    #[arg(long, global = true, help = "Sqlite catalog database URL override")]
    database_url: Option<String>,
    #[arg(long, global = true, help = "Random seed for reproducible training and sampling")]
    seed: Option<u64>,
}

impl GlobalArgs {
    fn load_options(&self) -> Result<LoadOptions, ConfigError> {
        let catalog_source =
            self.source.as_deref().map(str::parse::<CatalogSourceKind>).transpose()?;

        Ok(LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                catalog_source,
                catalog_base_url: self.base_url.clone(),
                database_url: self.database_url.clone(),
                random_seed: self.seed,
                ..ConfigOverrides::default()
            },
        })
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Recommend items for preferred categories, excluding acquired items")]
    Recommend {
        #[arg(long = "category", help = "Preferred category (repeatable)")]
        categories: Vec<String>,
        #[arg(long = "acquired", help = "Id of an item the caller already has (repeatable)")]
        acquired: Vec<u64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "List the items most similar to the given item")]
    Similar {
        id: u64,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "List trending items")]
    Trending {
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "List the highest rated items of a category (substring match)")]
    Category {
        label: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Group top items by up to three preferred categories")]
    Personalized {
        #[arg(required = true)]
        categories: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Sample random items")]
    Random {
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Build the engine and report its status")]
    Status,
    #[command(about = "Copy the catalog from the static dataset or the HTTP API into sqlite")]
    Import {
        #[arg(long, help = "Import source: static or http")]
        from: Option<String>,
    },
    #[command(about = "Apply pending catalog database migrations")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Recommend { .. } => "recommend",
            Self::Similar { .. } => "similar",
            Self::Trending { .. } => "trending",
            Self::Category { .. } => "category",
            Self::Personalized { .. } => "personalized",
            Self::Random { .. } => "random",
            Self::Status => "status",
            Self::Import { .. } => "import",
            Self::Migrate => "migrate",
            Self::Config => "config",
        }
    }
}

/// Library crates log through `tracing`; the CLI keeps stdout for JSON
/// results and sends diagnostics to stderr.
fn init_logging() {
    let filter =
        EnvFilter::try_from_env("SHOPWISE_CLI_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(filter).try_init();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let options = match cli.global.load_options() {
        Ok(options) => options,
        Err(error) => {
            let result = commands::CommandResult::failure(
                cli.command.name(),
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
            println!("{}", result.output);
            return ExitCode::from(result.exit_code);
        }
    };

    let result = match cli.command {
        Command::Recommend { categories, acquired, limit } => commands::query::recommend(
            &options,
            commands::query::RecommendArgs { categories, acquired, limit },
        ),
        Command::Similar { id, limit } => commands::query::similar(&options, id, limit),
        Command::Trending { limit } => commands::query::trending(&options, limit),
        Command::Category { label, limit } => commands::query::category(&options, &label, limit),
        Command::Personalized { categories, limit } => {
            commands::query::personalized(&options, &categories, limit)
        }
        Command::Random { limit } => commands::query::random(&options, limit),
        Command::Status => commands::status::run(&options),
        Command::Import { from } => commands::import::run(&options, from.as_deref()),
        Command::Migrate => commands::migrate::run(&options),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
