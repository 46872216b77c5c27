//! Command-line interface for managing the prompt library.

use clap::{Parser, Subcommand};

use crate::auth::CallerContext;
use crate::config::VaultConfig;
use crate::models::PromptInput;
use crate::query::{ListRequest, SearchRequest};
use crate::services::PromptService;

/// Personal prompt library with engagement-based ranking and full-text search.
#[derive(Parser, Debug)]
#[command(name = "promptvault", version, about)]
pub struct Cli {
    /// Path to the config file (defaults to the platform config dir).
    #[arg(long, env = "PROMPTVAULT_CONFIG", global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Override the database path.
    #[arg(long, env = "PROMPTVAULT_DB", global = true)]
    pub db: Option<std::path::PathBuf>,

    /// Owner identity to act as.
    #[arg(long, env = "PROMPTVAULT_OWNER", global = true)]
    pub owner: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a prompt to the library.
    Add {
        /// URL-safe identifier (lowercase letters, digits, dashes).
        slug: String,
        /// Display name.
        #[arg(long)]
        name: String,
        /// Prompt body; reads stdin when omitted.
        #[arg(long)]
        content: Option<String>,
        /// Short description.
        #[arg(long, default_value = "")]
        description: String,
        /// Tags to associate (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Pin the prompt to the top of list views.
        #[arg(long)]
        pinned: bool,
        /// Mark the prompt as a favorite.
        #[arg(long)]
        favorited: bool,
    },
    /// List prompts in engagement order.
    List {
        /// Restrict to prompts carrying any of these tags (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Search prompts by text.
    Search {
        /// Query text.
        query: String,
        /// Restrict to prompts carrying any of these tags (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show a prompt as JSON.
    Show {
        /// Prompt slug.
        slug: String,
    },
    /// Remove a prompt.
    Rm {
        /// Prompt slug.
        slug: String,
    },
    /// Record a use of a prompt, bumping its rank.
    Touch {
        /// Prompt slug.
        slug: String,
    },
}

/// Runs the parsed CLI command.
///
/// # Errors
///
/// Returns an error if configuration loading, the operation itself, or
/// output serialization fails.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => VaultConfig::load_from_file(path)?,
        None => VaultConfig::load_default(),
    };
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(owner) = cli.owner {
        config.owner_id = owner;
    }

    let service = PromptService::open(&config)?;
    let ctx = CallerContext::new(config.owner_id.clone());

    match cli.command {
        Commands::Add {
            slug,
            name,
            content,
            description,
            tags,
            pinned,
            favorited,
        } => {
            let content = match content {
                Some(text) => text,
                None => read_stdin()?,
            };
            let input = PromptInput::new(slug, name, content)
                .with_description(description)
                .with_tags(tags)
                .pinned(pinned)
                .favorited(favorited);
            let dto = service.create(&ctx, &input)?;
            print_json(&dto)?;
        },
        Commands::List { tags, limit } => {
            let mut request = ListRequest::new().with_tags(tags);
            request.limit = limit;
            let results = service.list(&ctx, &request)?;
            print_summaries(&results);
        },
        Commands::Search { query, tags, limit } => {
            let mut request = SearchRequest::new(query).with_tags(tags);
            request.limit = limit;
            let results = service.search(&ctx, &request)?;
            print_summaries(&results);
        },
        Commands::Show { slug } => match service.get(&ctx, &slug)? {
            Some(dto) => print_json(&dto)?,
            None => anyhow::bail!("no prompt with slug '{slug}'"),
        },
        Commands::Rm { slug } => {
            if !service.delete(&ctx, &slug)? {
                anyhow::bail!("no prompt with slug '{slug}'");
            }
        },
        Commands::Touch { slug } => match service.record_usage(&ctx, &slug)? {
            Some(count) => {
                tracing::info!(slug, count, "recorded usage");
            },
            None => anyhow::bail!("no prompt with slug '{slug}'"),
        },
    }

    Ok(())
}

fn read_stdin() -> anyhow::Result<String> {
    use std::io::Read;
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

#[allow(clippy::print_stdout)]
fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_summaries(results: &[crate::models::PromptDto]) {
    for dto in results {
        let pin = if dto.pinned { "* " } else { "  " };
        let tags = if dto.tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", dto.tags.join(", "))
        };
        println!("{pin}{:<24} {}{tags}", dto.slug, dto.name);
    }
}
