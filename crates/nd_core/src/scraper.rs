use async_trait::async_trait;
use serde::Serialize;

use crate::types::Article;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceMetadata {
    pub name: &'static str,
    pub emoji: &'static str,
    pub base_url: String,
}

#[async_trait]
pub trait Scraper: Send + Sync {
    /// Name and location of the news source
    fn source_metadata(&self) -> SourceMetadata;

    /// Returns true if this scraper can handle the given URL
    fn can_handle(&self, url: &str) -> bool;

    /// Returns a list of CLI shorthand names for this scraper
    fn cli_names(&self) -> Vec<&str> {
        vec![]
    }

    /// Returns a bounded list of article URLs from the front pages
    async fn get_article_urls(&self) -> Result<Vec<String>>;

    /// Fetches and extracts one article. Analysis fields are filled in.
    async fn scrape_article(&self, url: &str) -> Result<Article>;
}
