use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use fastrss::config::Config;
use fastrss::feed::export_opml;
use fastrss::pipeline;
use fastrss::server;
use fastrss::storage::{Database, DatabaseError, Source};

#[derive(Parser, Debug)]
#[command(
    name = "fastrss",
    version,
    about = "Concurrent RSS aggregator with keyword filtering and a JSON read API"
)]
struct Args {
    /// Configuration file
    #[arg(long, global = true, value_name = "FILE", default_value = "fastrss.toml")]
    config: PathBuf,

    /// SQLite database (overrides config and FASTRSS_DATABASE)
    #[arg(long, global = true, value_name = "FILE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, filter and store articles from every source
    Fetch {
        /// Repeat every N minutes until Ctrl-C
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
        interval_minutes: Option<u64>,
    },
    /// Serve the read-only JSON API
    Serve,
    /// Print the effective source list
    Sources {
        /// Print as an OPML document
        #[arg(long)]
        opml: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    config.apply_env_overrides();
    if let Some(database) = args.database {
        config.database_path = database;
    }

    let sources = config.resolve_sources().await;

    match args.command {
        Command::Sources { opml } => print_sources(&sources, opml),
        Command::Fetch { interval_minutes } => {
            if sources.is_empty() {
                tracing::warn!("No valid sources configured, nothing to fetch");
            }
            let db = open_database(&config).await?;
            run_fetch(&db, &config, &sources, interval_minutes).await;
            Ok(())
        }
        Command::Serve => {
            let db = open_database(&config).await?;
            server::serve(db, &config.server.bind).await
        }
    }
}

/// Opening the store is the only failure that stops the process.
async fn open_database(config: &Config) -> Result<Database> {
    let path = config
        .database_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    match Database::open(path).await {
        Ok(db) => {
            tracing::info!(path = %path, "Opened article database");
            Ok(db)
        }
        Err(DatabaseError::Locked) => {
            eprintln!("Error: The database at {path} is locked by another process. Please try again.");
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database {}: {}", path, e)),
    }
}

async fn run_fetch(db: &Database, config: &Config, sources: &[Source], interval_minutes: Option<u64>) {
    loop {
        let report = pipeline::run_once(db, config, sources).await;
        tracing::info!(
            fetched = report.fetched,
            filtered = report.filtered,
            saved = report.saved,
            duplicates = report.duplicates,
            failed_sources = ?report.failed_sources,
            "Run finished"
        );
        log_newest(db).await;

        let Some(minutes) = interval_minutes else {
            break;
        };

        tracing::info!(minutes, "Waiting for next run");
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(minutes.saturating_mul(60))) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping");
                break;
            }
        }
    }
}

async fn log_newest(db: &Database) {
    match db.get_articles_page(3, 0).await {
        Ok(articles) => {
            for (i, article) in articles.iter().enumerate() {
                tracing::info!(
                    rank = i + 1,
                    source = %article.source,
                    title = %article.title,
                    "Newest article"
                );
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to read newest articles"),
    }
}

fn print_sources(sources: &[Source], opml: bool) -> Result<()> {
    if opml {
        println!("{}", export_opml(sources).context("Failed to render OPML")?);
        return Ok(());
    }

    let width = sources.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for source in sources {
        println!("{:width$}  {}", source.name, source.url, width = width);
    }
    Ok(())
}
