use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::mpsc;

use offline_reader::config::Config;
use offline_reader::recipes::{ExtractionRecipe, RecipeStore};
use offline_reader::storage::{Database, DatabaseError, NewSource, SourceKind};
use offline_reader::sync::{SyncEvent, Synchronizer};
use offline_reader::util::build_client;

/// Get the default data directory path (~/.config/offline-reader/)
fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("offline-reader"))
}

#[derive(Parser, Debug)]
#[command(
    name = "offline-reader",
    about = "Keeps readable offline copies of articles from feeds and web pages"
)]
struct Args {
    /// Directory holding the database, recipes, images, and config.toml
    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a source
    Add {
        url: String,
        #[arg(long, value_enum, default_value_t = SourceKind::Syndication)]
        kind: SourceKind,
        #[arg(long)]
        title: Option<String>,
        /// Articles to pre-download per sync (0 = none)
        #[arg(long, default_value_t = 0)]
        download_limit: i64,
        #[arg(long)]
        category: Option<String>,
    },
    /// List sources
    List,
    /// Edit a source
    Edit {
        id: i64,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, value_enum)]
        kind: Option<SourceKind>,
        #[arg(long)]
        download_limit: Option<i64>,
        #[arg(long, conflicts_with = "clear_category")]
        category: Option<String>,
        #[arg(long)]
        clear_category: bool,
    },
    /// Remove a source and all of its articles
    Remove { id: i64 },
    /// Synchronize one source, or every source
    Sync {
        #[arg(long, value_name = "ID")]
        source: Option<i64>,
    },
    /// List a source's articles
    Articles { source_id: i64 },
    /// Download an article's full content for offline reading
    Fetch { article_id: i64 },
    /// Mark an article as favorite (kept regardless of retention)
    Favorite {
        article_id: i64,
        #[arg(long)]
        unset: bool,
    },
    /// Mark an article as read
    Read {
        article_id: i64,
        #[arg(long)]
        unset: bool,
    },
    /// Manage extraction recipes
    #[command(subcommand)]
    Recipes(RecipeCommand),
}

#[derive(Subcommand, Debug)]
enum RecipeCommand {
    /// List recipes in match order
    List,
    /// Import recipes from a JSON file (one recipe or an array)
    Import { file: PathBuf },
    /// Export all recipes as a JSON array
    Export {
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Delete the recipe at INDEX as shown by `recipes list`
    Delete { index: usize },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
        println!("Created data directory: {}", data_dir.display());
    }

    let config = Config::load(&data_dir.join("config.toml")).context("Failed to load config")?;
    let recipes = RecipeStore::new(data_dir.join("recipes"));

    if let Command::Recipes(command) = args.command {
        return run_recipes(&recipes, command).await;
    }

    let db_path = data_dir.join("reader.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: The database is locked by another process. Please try again.");
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    match args.command {
        Command::Add {
            url,
            kind,
            title,
            download_limit,
            category,
        } => {
            let id = db
                .insert_source(&NewSource {
                    url,
                    title,
                    kind,
                    download_limit,
                    category,
                })
                .await
                .context("Failed to add source")?;
            println!("Added source {id}");
        }
        Command::List => {
            for source in db.list_sources().await? {
                let synced = source
                    .last_synced
                    .map(format_time)
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{:>4}  {:<12} {:<40} [{}] limit={} synced={}  {}",
                    source.id,
                    source.kind,
                    source.title,
                    source.category.as_deref().unwrap_or("-"),
                    source.download_limit,
                    synced,
                    source.url
                );
            }
        }
        Command::Edit {
            id,
            url,
            title,
            kind,
            download_limit,
            category,
            clear_category,
        } => {
            let mut source = db
                .get_source(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No source with id {id}"))?;
            if let Some(url) = url {
                source.url = url;
            }
            if let Some(title) = title {
                source.title = title;
            }
            if let Some(kind) = kind {
                source.kind = kind;
            }
            if let Some(limit) = download_limit {
                source.download_limit = limit;
            }
            if clear_category {
                source.category = None;
            } else if category.is_some() {
                source.category = category;
            }
            db.update_source(&source).await?;
            println!("Updated source {id}");
        }
        Command::Remove { id } => {
            if db.delete_source(id).await? {
                println!("Removed source {id}");
            } else {
                anyhow::bail!("No source with id {id}");
            }
        }
        Command::Sync { source } => {
            let sources = match source {
                Some(id) => vec![db
                    .get_source(id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("No source with id {id}"))?],
                None => db.list_sources().await?,
            };

            let (event_tx, event_rx) = mpsc::channel::<SyncEvent>(64);
            let printer = tokio::spawn(print_events(event_rx));

            let client = build_client(&config.user_agent).context("Failed to build HTTP client")?;
            let synchronizer = Synchronizer::new(
                db.clone(),
                client,
                recipes,
                data_dir.join("images"),
                config.sync_settings(),
            )
            .with_events(event_tx);

            let reports = synchronizer.sync_all(&sources).await;
            drop(synchronizer);
            let _ = printer.await;

            for report in reports {
                match &report.error {
                    Some(error) => println!("source {}: failed ({error})", report.source_id),
                    None if !report.fetched => println!("source {}: unreachable", report.source_id),
                    None => println!(
                        "source {}: {} new, {} updated, {} pruned, {} cached, {} images",
                        report.source_id,
                        report.inserted,
                        report.updated,
                        report.pruned,
                        report.cached,
                        report.images
                    ),
                }
            }
        }
        Command::Articles { source_id } => {
            for article in db.get_articles_for_source(source_id).await? {
                let flags = format!(
                    "{}{}{}",
                    if article.read { ' ' } else { '*' },
                    if article.favorite { 'F' } else { ' ' },
                    if article.cached { 'C' } else { ' ' }
                );
                println!(
                    "{:>6} {} {}  {}",
                    article.id,
                    flags,
                    format_time(article.published),
                    article.title
                );
            }
        }
        Command::Fetch { article_id } => {
            let article = db
                .get_article_by_id(article_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No article with id {article_id}"))?;
            let client = build_client(&config.user_agent).context("Failed to build HTTP client")?;
            let synchronizer = Synchronizer::new(
                db.clone(),
                client,
                recipes,
                data_dir.join("images"),
                config.sync_settings(),
            );
            if synchronizer.download_article_content(&article).await {
                println!("Article {article_id} is available offline");
            } else {
                anyhow::bail!("Failed to download article {article_id}");
            }
        }
        Command::Favorite { article_id, unset } => {
            if !db.set_article_favorite(article_id, !unset).await? {
                anyhow::bail!("No article with id {article_id}");
            }
        }
        Command::Read { article_id, unset } => {
            if !db.set_article_read(article_id, !unset).await? {
                anyhow::bail!("No article with id {article_id}");
            }
        }
        Command::Recipes(_) => {}
    }

    Ok(())
}

async fn run_recipes(store: &RecipeStore, command: RecipeCommand) -> Result<()> {
    store
        .ensure_defaults()
        .await
        .context("Failed to write default recipes")?;

    match command {
        RecipeCommand::List => {
            for (index, recipe) in store.load_all().await?.iter().enumerate() {
                println!("{index:>3}  {}", describe_recipe(recipe));
            }
        }
        RecipeCommand::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read import file: {}", file.display()))?;
            let imported = store.import(&json).await.context("Failed to import recipes")?;
            println!("Imported {} recipe(s)", imported.len());
        }
        RecipeCommand::Export { output } => match output {
            Some(path) => {
                let path = store
                    .export_to(&path)
                    .await
                    .with_context(|| format!("Failed to export recipes to {}", path.display()))?;
                println!("Exported recipes to: {}", path.display());
            }
            None => println!("{}", store.export_all().await?),
        },
        RecipeCommand::Delete { index } => {
            let recipes = store.load_all().await?;
            let recipe = recipes
                .get(index)
                .ok_or_else(|| anyhow::anyhow!("No recipe at index {index}"))?;
            let removed = store.delete(recipe).await?;
            println!("Deleted {removed} record(s) for {}", recipe.domain_pattern);
        }
    }

    Ok(())
}

fn describe_recipe(recipe: &ExtractionRecipe) -> String {
    let name = recipe.source_name.as_deref().unwrap_or("-");
    format!("{:<32} {:<24} {:?}", recipe.domain_pattern, name, recipe.strategy)
}

async fn print_events(mut rx: mpsc::Receiver<SyncEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            SyncEvent::FeedFailed { source_id } => {
                eprintln!("source {source_id}: feed could not be fetched")
            }
            SyncEvent::ArticlesPruned { source_id, removed } => {
                eprintln!("source {source_id}: removed {removed} old article(s)")
            }
            SyncEvent::SyncFailed { source_id, error } => {
                eprintln!("source {source_id}: {error}")
            }
            other => tracing::debug!(event = ?other, "Sync event"),
        }
    }
}

fn format_time(timestamp: i64) -> String {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
