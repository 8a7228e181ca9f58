//! # TAXII Bridge CLI (`taxii`)
//!
//! Administration commands for the bridge: database setup, service
//! configuration, and inspection of polls and stored content blocks.
//!
//! ## Usage
//!
//! ```bash
//! taxii --config ./config/taxii.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `taxii init` | Create the SQLite database and tables |
//! | `taxii config show` | Print the effective service configuration |
//! | `taxii config validate <file>` | Check a JSON service configuration without storing it |
//! | `taxii config import <file>` | Validate and store a JSON service configuration |
//! | `taxii config remove-server <name>` | Delete a server and its feeds |
//! | `taxii poll last <feed>` | Show the most recent poll of a feed |
//! | `taxii poll history <feed>` | List every poll of a feed |
//! | `taxii content list` | List stored content blocks |
//! | `taxii content show <id>` | Print one content block |
//!
//! Feeds are addressed as `hostname:feedname`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use taxii_bridge::config::{self, Config};
use taxii_bridge::service::{
    display_config, feed_key, load_service_config, ConfigRepository, ServiceConfig,
};
use taxii_bridge::store::{ContentQuery, SqliteStore, Store};
use taxii_bridge::{db, logging, migrate};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// TAXII Bridge CLI — poll TAXII feeds into a STIX repository.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "taxii",
    about = "TAXII Bridge — poll TAXII feeds into a STIX repository",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/taxii.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the poll, content, and service
    /// configuration tables. Running it again is harmless.
    Init,

    /// Inspect or change the TAXII service configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect recorded polls.
    Poll {
        #[command(subcommand)]
        action: PollAction,
    },

    /// Inspect stored content blocks.
    Content {
        #[command(subcommand)]
        action: ContentAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration, upgrading a flat one if found.
    Show,

    /// Validate a JSON configuration file without storing it.
    ///
    /// Flat single-server files are upgraded before validation.
    Validate {
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// Validate a JSON configuration file and store it.
    Import {
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// Remove a TAXII server and all of its feeds.
    RemoveServer {
        /// Server name.
        name: String,
    },
}

#[derive(Subcommand)]
enum PollAction {
    /// Show the most recent poll of a feed.
    Last {
        /// Feed key, `hostname:feedname`.
        feed: String,
    },

    /// List every poll of a feed, newest first.
    History {
        /// Feed key, `hostname:feedname`.
        feed: String,

        /// Maximum number of polls to show.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum ContentAction {
    /// List content blocks, oldest poll first.
    List {
        /// Only blocks from this feed name.
        #[arg(long)]
        feed: Option<String>,

        /// Only blocks whose last import failed.
        #[arg(long)]
        failed: bool,

        /// Maximum number of blocks to list.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print a content block with its import errors and raw content.
    Show {
        /// Content block id.
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => config_show(&cfg).await?,
            ConfigAction::Validate { file } => config_validate(&cfg, &file)?,
            ConfigAction::Import { file } => config_import(&cfg, &file).await?,
            ConfigAction::RemoveServer { name } => config_remove_server(&cfg, &name).await?,
        },
        Commands::Poll { action } => match action {
            PollAction::Last { feed } => poll_last(&cfg, &feed).await?,
            PollAction::History { feed, limit } => poll_history(&cfg, &feed, limit).await?,
        },
        Commands::Content { action } => match action {
            ContentAction::List {
                feed,
                failed,
                limit,
            } => content_list(&cfg, feed, failed, limit).await?,
            ContentAction::Show { id } => content_show(&cfg, &id).await?,
        },
    }

    Ok(())
}

async fn open_store(cfg: &Config) -> Result<SqliteStore> {
    Ok(SqliteStore::new(db::connect(cfg).await?))
}

/// Reads a service configuration file, upgrading a flat one, and checks it.
fn read_service_config(cfg: &Config, file: &Path) -> Result<(ServiceConfig, bool)> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let raw: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let loaded = load_service_config(Some(raw))?;
    if let Err(invalid) = loaded.config.validate_all(&cfg.sources()) {
        for message in &invalid.messages {
            eprintln!("  - {}", message);
        }
        anyhow::bail!("configuration has {} problem(s)", invalid.messages.len());
    }
    Ok((loaded.config, loaded.migrated))
}

async fn config_show(cfg: &Config) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let service = ConfigRepository::new(pool.clone()).load().await?;

    for (label, value) in display_config(&service)? {
        println!("{:<22} {}", format!("{}:", label), value);
    }

    for (name, server) in &service.taxii_servers {
        println!();
        println!("Server {} ({}:{})", name, server.hostname, server.port);
        println!("  poll path:  {}", server.poll_path);
        println!("  inbox path: {}", server.inbox_path);
        if server.feeds.is_empty() {
            println!("  (no feeds)");
        }
        for (id, feed) in &server.feeds {
            println!(
                "  [{}] {} -> {}  ({})",
                id,
                feed.feed_name,
                feed.source,
                feed_key(server, feed)
            );
        }
    }

    pool.close().await;
    Ok(())
}

fn config_validate(cfg: &Config, file: &Path) -> Result<()> {
    let (service, migrated) = read_service_config(cfg, file)?;
    if migrated {
        println!("Flat configuration upgraded to server \"Migrated\".");
    }
    println!(
        "Configuration is valid ({} server(s)).",
        service.taxii_servers.len()
    );
    Ok(())
}

async fn config_import(cfg: &Config, file: &Path) -> Result<()> {
    let (service, _) = read_service_config(cfg, file)?;

    let pool = db::connect(cfg).await?;
    ConfigRepository::new(pool.clone())
        .save(&service, &cfg.sources())
        .await?;
    pool.close().await;

    println!(
        "Imported service configuration ({} server(s)).",
        service.taxii_servers.len()
    );
    Ok(())
}

async fn config_remove_server(cfg: &Config, name: &str) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let removed = ConfigRepository::new(pool.clone()).remove_server(name).await?;
    pool.close().await;

    println!("Removed server {} ({} feed(s)).", name, removed.feeds.len());
    Ok(())
}

async fn poll_last(cfg: &Config, feed: &str) -> Result<()> {
    let store = open_store(cfg).await?;
    match store.last_poll(feed).await? {
        Some(poll) => {
            println!("Feed:    {}", poll.feed);
            println!("End:     {}", poll.end.format(TIME_FORMAT));
            println!("Ran at:  {}", poll.runtime.format(TIME_FORMAT));
        }
        None => println!("No polls recorded for {}.", feed),
    }
    store.pool().close().await;
    Ok(())
}

async fn poll_history(cfg: &Config, feed: &str, limit: Option<usize>) -> Result<()> {
    let store = open_store(cfg).await?;
    let mut polls = store.list_polls(feed).await?;
    if let Some(limit) = limit {
        polls.truncate(limit);
    }

    if polls.is_empty() {
        println!("No polls recorded for {}.", feed);
    } else {
        println!("{:<25} {:<25}", "END", "RAN AT");
        for poll in &polls {
            println!(
                "{:<25} {:<25}",
                poll.end.format(TIME_FORMAT).to_string(),
                poll.runtime.format(TIME_FORMAT).to_string()
            );
        }
    }
    store.pool().close().await;
    Ok(())
}

async fn content_list(
    cfg: &Config,
    feed: Option<String>,
    failed: bool,
    limit: Option<usize>,
) -> Result<()> {
    let store = open_store(cfg).await?;
    let query = ContentQuery {
        feed,
        import_failed: failed.then_some(true),
        limit,
        ..ContentQuery::default()
    };
    let blocks = store.find_content(&query).await?;

    if blocks.is_empty() {
        println!("No content blocks found.");
    } else {
        println!(
            "{:<36}  {:<23}  {:<20}  {:<8}  LABEL",
            "ID", "POLLED", "FEED", "STATUS"
        );
        for block in &blocks {
            let status = if block.import_failed { "failed" } else { "ok" };
            println!(
                "{:<36}  {:<23}  {:<20}  {:<8}  {}",
                block.id,
                block.poll_time.format(TIME_FORMAT).to_string(),
                block.feed,
                status,
                block.block_label
            );
        }
        println!("{} block(s)", blocks.len());
    }
    store.pool().close().await;
    Ok(())
}

async fn content_show(cfg: &Config, id: &str) -> Result<()> {
    let store = open_store(cfg).await?;
    let block = store
        .get_content(id)
        .await?
        .with_context(|| format!("No content block with id {}", id))?;

    println!("ID:            {}", block.id);
    println!("Message ID:    {}", block.message_id);
    println!("Server:        {}", block.hostname);
    println!("Feed:          {}", block.feed);
    println!("Label:         {}", block.block_label);
    println!("Polled:        {}", block.poll_time.format(TIME_FORMAT));
    println!("Time range:    {}", block.timerange);
    println!("Analyst:       {}", block.analyst);
    println!("Header source: {}", block.use_hdr_src);
    println!("Import failed: {}", block.import_failed);
    if !block.errors.is_empty() {
        println!("Errors:");
        for error in &block.errors {
            println!("  - {}", error);
        }
    }
    println!("--- content ---");
    println!("{}", block.content);

    store.pool().close().await;
    Ok(())
}
