use clap::Parser;
use nd_core::{ArticleStorage, Config, Result};
use nd_scrapers::cli::format_run;
use nd_scrapers::{handle_command, ScraperArgs, ScraperCommands as NdScraperCommands, ScraperManager};
use nd_web::{create_app, AppState};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    /// Accepts `90`, `45s`, `30m`, `1h15m30s`, `1d` and the like; bare numbers
    /// are seconds.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut digits = String::new();
        let mut seen_number = false;

        for c in s.trim().chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            if c.is_whitespace() {
                continue;
            }
            let value: u64 = digits
                .parse()
                .map_err(|_| format!("Expected a number before '{}'", c))?;
            let unit = match c {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86400,
                other => return Err(format!("Invalid duration unit: {}", other)),
            };
            total_seconds = value
                .checked_mul(unit)
                .and_then(|secs| total_seconds.checked_add(secs))
                .ok_or_else(|| "Duration too large".to_string())?;
            digits.clear();
            seen_number = true;
        }

        if !digits.is_empty() {
            let secs = digits
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_seconds = total_seconds
                .checked_add(secs)
                .ok_or_else(|| "Duration too large".to_string())?;
            seen_number = true;
        }

        if !seen_number {
            return Err("Duration must include a number".to_string());
        }
        if total_seconds == 0 {
            return Err("Duration must be greater than zero".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(name = "newsdesk", author, version, about = "Collects BBC News, CNN and Reuters articles into a local archive", long_about = None)]
pub struct Cli {
    /// Storage backend: sqlite or memory
    #[arg(long)]
    storage: Option<String>,
    /// SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Scrape one source (bbc, cnn, reuters) or all of them
    Scrape {
        #[arg(required = false)]
        source: Option<String>,
        /// Repeat with this interval (e.g. 1h, 30m, 1h15m30s)
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    /// List available scrapers
    List,
    /// Scrape and store a single article url
    Url { url: String },
    /// Serve the dashboard and JSON API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Background scraping interval (defaults to the configured one)
        #[arg(long)]
        scrape_interval: Option<HumanDuration>,
        /// Serve without background scraping
        #[arg(long)]
        no_scrape: bool,
    },
    /// Show storage and source status
    Status,
    /// Print collection statistics as JSON
    Stats,
    /// Show the most recent scrape runs
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Create or upgrade the database schema
    Migrate,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(storage) = &cli.storage {
        config.storage = storage.clone();
    }
    if let Some(database) = &cli.database {
        config.database_path = database.clone();
    }
}

/// Runs a cycle, sleeps, repeats. A failed cycle is logged and the loop goes on.
async fn run_periodic(manager: Arc<ScraperManager>, source: Option<String>, interval: Duration) {
    info!("🔁 Running in periodic mode with a {}s interval", interval.as_secs());
    loop {
        info!("Starting scrape cycle");
        let args = ScraperArgs {
            command: NdScraperCommands::Source {
                source: source.clone(),
            },
        };
        if let Err(e) = handle_command(args, &manager).await {
            error!(error = %e, "Scrape cycle failed");
        }
        info!("Waiting {}s before next scrape", interval.as_secs());
        tokio::time::sleep(interval).await;
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("👋 Shutting down");
}

async fn serve(
    manager: Arc<ScraperManager>,
    host: String,
    port: u16,
    scrape_interval: Option<Duration>,
) -> Result<()> {
    if let Some(interval) = scrape_interval {
        tokio::spawn(run_periodic(manager.clone(), None, interval));
    }

    let app = create_app(AppState::new(manager));
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!("🌐 Dashboard listening on http://{}:{}", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn print_status(config: &Config, storage: &Arc<dyn ArticleStorage>, manager: &ScraperManager) -> Result<()> {
    let stats = storage.statistics().await?;

    println!("Storage:  {} ({})", config.storage, config.database_path.display());
    println!("Articles: {} total, {} in the last 24h", stats.total_articles, stats.recent_articles);
    println!(
        "Updated:  {}",
        stats
            .last_updated
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    println!("Sources:");
    for meta in manager.list_scrapers() {
        let count = stats.all_articles_by_source.get(meta.name).copied().unwrap_or(0);
        println!("  {} {:<10} {:>6} articles  {}", meta.emoji, meta.name, count, meta.base_url);
    }
    Ok(())
}

async fn print_runs(storage: &Arc<dyn ArticleStorage>, limit: u32) -> Result<()> {
    let runs = storage.recent_scrape_runs(limit).await?;
    if runs.is_empty() {
        println!("No scrape runs recorded yet");
    }
    for run in runs {
        println!(
            "{}  {:>6.1}s  {}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            (run.finished_at - run.started_at).num_milliseconds() as f64 / 1000.0,
            format_run(&run)
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::from_env()?;
    apply_overrides(&mut config, &cli);

    let storage = nd_storage::create_storage(&config.storage, &config.database_path).await?;
    let manager = Arc::new(ScraperManager::with_default_scrapers(
        storage.clone(),
        config.scrape.clone(),
    )?);

    let scraper_names: Vec<&str> = manager.list_scrapers().iter().map(|m| m.name).collect();
    info!("🦗 Scrapers initialized: {}", scraper_names.join(", "));

    match cli.command {
        Commands::Scrape { source, interval } => {
            info!(
                "🦗 Scraping articles from {}",
                source.as_deref().unwrap_or("all sources")
            );
            match interval {
                Some(interval) => run_periodic(manager, source, interval.0).await,
                None => {
                    let args = ScraperArgs {
                        command: NdScraperCommands::Source { source },
                    };
                    handle_command(args, &manager).await?;
                }
            }
        }
        Commands::List => {
            let args = ScraperArgs {
                command: NdScraperCommands::List,
            };
            handle_command(args, &manager).await?;
        }
        Commands::Url { url } => {
            info!("Scraping single URL: {}", url);
            let args = ScraperArgs {
                command: NdScraperCommands::Url { url },
            };
            handle_command(args, &manager).await?;
        }
        Commands::Serve {
            host,
            port,
            scrape_interval,
            no_scrape,
        } => {
            let interval = if no_scrape {
                None
            } else {
                Some(scrape_interval.map(|d| d.0).unwrap_or(config.scrape_interval))
            };
            serve(
                manager,
                host.unwrap_or(config.host.clone()),
                port.unwrap_or(config.port),
                interval,
            )
            .await?;
        }
        Commands::Status => print_status(&config, &storage, &manager).await?,
        Commands::Stats => {
            let stats = storage.statistics().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Runs { limit } => print_runs(&storage, limit).await?,
        Commands::Migrate => {
            // Opening the backend applies pending migrations.
            println!(
                "✨ {} storage ready at {} ({} articles)",
                config.storage,
                config.database_path.display(),
                storage.count().await?
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_duration() {
        let parse = |s: &str| HumanDuration::from_str(s).map(|d| d.0.as_secs());
        assert_eq!(parse("90"), Ok(90));
        assert_eq!(parse("45s"), Ok(45));
        assert_eq!(parse("30m"), Ok(1800));
        assert_eq!(parse("1h15m30s"), Ok(4530));
        assert_eq!(parse("1d 2h"), Ok(93600));
        assert!(parse("").is_err());
        assert!(parse("h").is_err());
        assert!(parse("10x").is_err());
        assert!(parse("0m").is_err());
        assert_eq!(parse("300000000000000d"), Err("Duration too large".to_string()));
        assert_eq!(
            parse("18446744073709551615s1s"),
            Err("Duration too large".to_string())
        );
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "newsdesk",
            "--storage",
            "memory",
            "scrape",
            "bbc",
            "--interval",
            "1h30m",
        ])
        .unwrap();
        assert_eq!(cli.storage.as_deref(), Some("memory"));
        match cli.command {
            Commands::Scrape { source, interval } => {
                assert_eq!(source.as_deref(), Some("bbc"));
                assert_eq!(interval, Some(HumanDuration(Duration::from_secs(5400))));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::try_parse_from(["newsdesk", "serve", "--port", "8080", "--no-scrape"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Serve {
                port: Some(8080),
                no_scrape: true,
                ..
            }
        ));

        assert!(Cli::try_parse_from(["newsdesk", "scrape", "--interval", "soon"]).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::try_parse_from(["newsdesk", "--database", "/tmp/other.db", "status"]).unwrap();
        let mut config = Config::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.database_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.storage, "sqlite");
    }
}
