use async_trait::async_trait;

use crate::types::{Article, ArticleQuery, ScrapeRun, Statistics};
use crate::Result;

#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Insert the article, or overwrite the stored row with the same url.
    /// The stored `collected_at` survives an overwrite.
    async fn upsert_article(&self, article: &Article) -> Result<()>;

    /// Look up a single article by url
    async fn get_by_url(&self, url: &str) -> Result<Option<Article>>;

    /// Filtered listing, newest collection first
    async fn query_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>>;

    /// Get all articles from a specific source
    async fn get_by_source(&self, source: &str) -> Result<Vec<Article>>;

    async fn count(&self) -> Result<u64>;

    async fn statistics(&self) -> Result<Statistics>;

    async fn record_scrape_run(&self, run: &ScrapeRun) -> Result<()>;

    /// Most recent runs first
    async fn recent_scrape_runs(&self, limit: u32) -> Result<Vec<ScrapeRun>>;
}
