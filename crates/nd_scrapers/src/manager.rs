use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use nd_core::{
    Article, ArticleStatus, ArticleStorage, Error, Result, RunStatus, ScrapeConfig, ScrapeRun,
    Scraper, SourceMetadata,
};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::dedup::Deduplicator;
use crate::fetch::Fetcher;
use crate::scrapers::default_scrapers;

/// Result of one full scraping cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub runs: Vec<ScrapeRun>,
    pub articles_found: u32,
    pub articles_scraped: u32,
    pub new: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub failed: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl CycleReport {
    pub fn stored(&self) -> u32 {
        self.new + self.updated
    }
}

/// What one source produced before deduplication.
struct Harvest {
    source: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    articles_found: u32,
    articles: Vec<Article>,
    status: RunStatus,
    error_message: Option<String>,
}

impl Harvest {
    fn failed(source: &str, started_at: DateTime<Utc>, status: RunStatus, message: String) -> Self {
        Self {
            source: source.to_string(),
            started_at,
            finished_at: Utc::now(),
            articles_found: 0,
            articles: Vec::new(),
            status,
            error_message: Some(message),
        }
    }
}

/// Runs link discovery and article scraping for one source. Individual
/// article failures are logged and skipped.
async fn harvest(scraper: Arc<dyn Scraper>) -> Harvest {
    let meta = scraper.source_metadata();
    let started_at = Utc::now();

    let urls = match scraper.get_article_urls().await {
        Ok(urls) => urls,
        Err(e) => {
            error!(source = meta.name, error = %e, "Link discovery failed");
            return Harvest::failed(meta.name, started_at, RunStatus::Failed, e.to_string());
        }
    };

    let mut articles = Vec::with_capacity(urls.len());
    for url in &urls {
        match scraper.scrape_article(url).await {
            Ok(article) => {
                debug!(source = meta.name, %url, title = %article.title, "Scraped article");
                articles.push(article);
            }
            Err(e) => warn!(source = meta.name, %url, error = %e, "Failed to scrape article"),
        }
    }

    info!(
        "{} {}: scraped {}/{} articles",
        meta.emoji,
        meta.name,
        articles.len(),
        urls.len()
    );

    Harvest {
        source: meta.name.to_string(),
        started_at,
        finished_at: Utc::now(),
        articles_found: urls.len() as u32,
        articles,
        status: RunStatus::Completed,
        error_message: None,
    }
}

pub struct ScraperManager {
    storage: Arc<dyn ArticleStorage>,
    scrapers: Vec<Arc<dyn Scraper>>,
    config: ScrapeConfig,
}

impl ScraperManager {
    pub fn new(
        storage: Arc<dyn ArticleStorage>,
        scrapers: Vec<Arc<dyn Scraper>>,
        config: ScrapeConfig,
    ) -> Self {
        Self {
            storage,
            scrapers,
            config,
        }
    }

    /// Manager with the BBC, CNN and Reuters scrapers sharing one HTTP client.
    pub fn with_default_scrapers(storage: Arc<dyn ArticleStorage>, config: ScrapeConfig) -> Result<Self> {
        let fetcher = Fetcher::new(&config)?;
        let scrapers = default_scrapers(&fetcher, &config);
        Ok(Self::new(storage, scrapers, config))
    }

    pub fn storage(&self) -> Arc<dyn ArticleStorage> {
        self.storage.clone()
    }

    pub fn list_scrapers(&self) -> Vec<SourceMetadata> {
        self.scrapers.iter().map(|s| s.source_metadata()).collect()
    }

    /// Scrapers whose cli name or display name matches, ignoring case.
    pub fn scrapers_for(&self, name: &str) -> Result<Vec<Arc<dyn Scraper>>> {
        let wanted = name.trim().to_lowercase();
        let found: Vec<_> = self
            .scrapers
            .iter()
            .filter(|s| {
                s.source_metadata().name.to_lowercase() == wanted
                    || s.cli_names().iter().any(|n| n.to_lowercase() == wanted)
            })
            .cloned()
            .collect();

        if found.is_empty() {
            return Err(Error::Scraping(format!("No scraper found for source: {}", name)));
        }
        Ok(found)
    }

    pub fn scraper_for_url(&self, url: &str) -> Result<Arc<dyn Scraper>> {
        self.scrapers
            .iter()
            .find(|s| s.can_handle(url))
            .cloned()
            .ok_or_else(|| Error::Scraping(format!("No scraper found for URL: {}", url)))
    }

    /// Scrapes a single url and stores it through the deduplicator.
    pub async fn scrape_url(&self, url: &str) -> Result<(Article, ArticleStatus)> {
        let scraper = self.scraper_for_url(url)?;
        let article = scraper.scrape_article(url).await?;
        Deduplicator::new(self.storage.clone()).store(article).await
    }

    /// Runs every selected scraper concurrently, then deduplicates and stores
    /// the combined batch and records one run per source.
    ///
    /// A source that fails or times out does not affect the others.
    pub async fn run_cycle(&self, source: Option<&str>) -> Result<CycleReport> {
        let selected = match source {
            Some(name) => self.scrapers_for(name)?,
            None => self.scrapers.clone(),
        };

        let started_at = Utc::now();
        let clock = Instant::now();
        info!("🚀 Starting scraping cycle with {} sources", selected.len());

        let semaphore = Arc::new(Semaphore::new(selected.len().max(1)));
        let timeout = self.config.source_timeout;
        let names: Vec<&'static str> = selected.iter().map(|s| s.source_metadata().name).collect();

        let handles: Vec<_> = selected
            .into_iter()
            .map(|scraper| {
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| Error::External(e.into()))?;
                    let name = scraper.source_metadata().name;
                    let task_started = Utc::now();
                    let harvest = match tokio::time::timeout(timeout, harvest(scraper)).await {
                        Ok(harvest) => harvest,
                        Err(_) => {
                            warn!(source = name, ?timeout, "Source timed out");
                            Harvest::failed(
                                name,
                                task_started,
                                RunStatus::TimedOut,
                                format!("Timed out after {}s", timeout.as_secs_f64()),
                            )
                        }
                    };
                    Ok::<Harvest, Error>(harvest)
                })
            })
            .collect();

        let mut harvests = Vec::with_capacity(names.len());
        for (name, joined) in names.into_iter().zip(join_all(handles).await) {
            let harvest = match joined {
                Ok(Ok(harvest)) => harvest,
                Ok(Err(e)) => Harvest::failed(name, started_at, RunStatus::Failed, e.to_string()),
                Err(e) => {
                    error!(source = name, error = %e, "Scraper task aborted");
                    Harvest::failed(name, started_at, RunStatus::Failed, e.to_string())
                }
            };
            harvests.push(harvest);
        }

        let scraped: Vec<u32> = harvests.iter().map(|h| h.articles.len() as u32).collect();
        let batch: Vec<Article> = harvests
            .iter_mut()
            .flat_map(|h| std::mem::take(&mut h.articles))
            .collect();

        let dedup = Deduplicator::new(self.storage.clone());
        let (stored, summary) = dedup.process(batch).await;

        let mut runs = Vec::with_capacity(harvests.len());
        for (harvest, articles_scraped) in harvests.into_iter().zip(scraped) {
            let count = |status: ArticleStatus| {
                stored
                    .iter()
                    .filter(|(a, s)| a.source == harvest.source && *s == status)
                    .count() as u32
            };
            let run = ScrapeRun {
                articles_found: harvest.articles_found,
                articles_scraped,
                articles_saved: count(ArticleStatus::New),
                articles_updated: count(ArticleStatus::Updated),
                source: harvest.source,
                started_at: harvest.started_at,
                finished_at: harvest.finished_at,
                status: harvest.status,
                error_message: harvest.error_message,
            };
            if let Err(e) = self.storage.record_scrape_run(&run).await {
                warn!(source = %run.source, error = %e, "Failed to record scrape run");
            }
            runs.push(run);
        }

        let report = CycleReport {
            articles_found: runs.iter().map(|r| r.articles_found).sum(),
            articles_scraped: runs.iter().map(|r| r.articles_scraped).sum(),
            new: summary.new,
            updated: summary.updated,
            unchanged: summary.unchanged,
            failed: summary.failed,
            runs,
            started_at,
            finished_at: Utc::now(),
            duration_secs: clock.elapsed().as_secs_f64(),
        };

        info!(
            "✅ Cycle finished in {:.1}s: {} found, {} scraped, {} new, {} updated, {} unchanged",
            report.duration_secs,
            report.articles_found,
            report.articles_scraped,
            report.new,
            report.updated,
            report.unchanged
        );
        Ok(report)
    }
}
