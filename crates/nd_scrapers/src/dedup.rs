use std::collections::HashSet;
use std::sync::Arc;

use nd_core::{Article, ArticleStatus, ArticleStorage, Result};
use serde::Serialize;
use tracing::{debug, warn};

/// Counts for one batch pushed through the [`Deduplicator`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DedupSummary {
    pub new: u32,
    pub updated: u32,
    pub unchanged: u32,
    /// Repeats of a url already seen earlier in the same batch.
    pub duplicates: u32,
    /// Candidates dropped because storage failed.
    pub failed: u32,
}

impl DedupSummary {
    fn record(&mut self, status: ArticleStatus) {
        match status {
            ArticleStatus::New => self.new += 1,
            ArticleStatus::Updated => self.updated += 1,
            ArticleStatus::Unchanged => self.unchanged += 1,
        }
    }

    pub fn stored(&self) -> u32 {
        self.new + self.updated
    }
}

/// Keeps storage at one record per url.
pub struct Deduplicator {
    storage: Arc<dyn ArticleStorage>,
}

impl Deduplicator {
    pub fn new(storage: Arc<dyn ArticleStorage>) -> Self {
        Self { storage }
    }

    /// Compares one candidate with what storage holds for its url and writes
    /// it when it is new or changed. An update keeps the original
    /// `collected_at`.
    pub async fn store(&self, mut article: Article) -> Result<(Article, ArticleStatus)> {
        match self.storage.get_by_url(&article.url).await? {
            None => {
                self.storage.upsert_article(&article).await?;
                Ok((article, ArticleStatus::New))
            }
            Some(existing) if existing.same_content(&article) => {
                Ok((existing, ArticleStatus::Unchanged))
            }
            Some(existing) => {
                article.collected_at = existing.collected_at;
                self.storage.upsert_article(&article).await?;
                Ok((article, ArticleStatus::Updated))
            }
        }
    }

    /// Deduplicates a batch serially. The first occurrence of a url wins;
    /// a storage failure on one candidate is logged and the rest continue.
    pub async fn process(&self, articles: Vec<Article>) -> (Vec<(Article, ArticleStatus)>, DedupSummary) {
        let mut summary = DedupSummary::default();
        let mut seen = HashSet::new();
        let mut stored = Vec::with_capacity(articles.len());

        for article in articles {
            if !seen.insert(article.url.clone()) {
                summary.duplicates += 1;
                debug!(url = %article.url, "Skipping repeated url in batch");
                continue;
            }

            let url = article.url.clone();
            match self.store(article).await {
                Ok((article, status)) => {
                    debug!(%url, ?status, "Deduplicated article");
                    summary.record(status);
                    stored.push((article, status));
                }
                Err(e) => {
                    warn!(%url, error = %e, "Failed to store article");
                    summary.failed += 1;
                }
            }
        }

        (stored, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use nd_core::{ArticleQuery, Error, ScrapeRun, Statistics};
    use nd_storage::MemoryStorage;

    fn article(url: &str, title: &str) -> Article {
        let now = Utc::now();
        Article {
            url: url.to_string(),
            source: "CNN".to_string(),
            title: title.to_string(),
            author: None,
            published_date: None,
            category: "World".to_string(),
            body_text: "Body text".to_string(),
            summary: None,
            image_url: None,
            word_count: 2,
            sentiment_score: 0.0,
            collected_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_new_updated_unchanged() {
        let storage = Arc::new(MemoryStorage::new());
        let dedup = Deduplicator::new(storage.clone());

        let mut first = article("https://cnn.com/a", "Title");
        first.collected_at = Utc::now() - Duration::hours(3);
        let original_collected_at = first.collected_at;

        let (_, status) = dedup.store(first.clone()).await.unwrap();
        assert_eq!(status, ArticleStatus::New);

        let (_, status) = dedup.store(article("https://cnn.com/a", "Title")).await.unwrap();
        assert_eq!(status, ArticleStatus::Unchanged);

        let (updated, status) = dedup
            .store(article("https://cnn.com/a", "Title, revised"))
            .await
            .unwrap();
        assert_eq!(status, ArticleStatus::Updated);
        assert_eq!(updated.collected_at, original_collected_at);

        let saved = storage.get_by_url("https://cnn.com/a").await.unwrap().unwrap();
        assert_eq!(saved.title, "Title, revised");
        assert_eq!(saved.collected_at, original_collected_at);
        assert_eq!(storage.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_first_occurrence_wins() {
        let storage = Arc::new(MemoryStorage::new());
        let dedup = Deduplicator::new(storage.clone());

        let batch = vec![
            article("https://cnn.com/a", "First"),
            article("https://cnn.com/b", "Other"),
            article("https://cnn.com/a", "Second"),
        ];
        let (stored, summary) = dedup.process(batch).await;

        assert_eq!(stored.len(), 2);
        assert_eq!(summary.new, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.stored(), 2);
        let saved = storage.get_by_url("https://cnn.com/a").await.unwrap().unwrap();
        assert_eq!(saved.title, "First");
    }

    struct FlakyStorage {
        inner: MemoryStorage,
    }

    #[async_trait]
    impl ArticleStorage for FlakyStorage {
        async fn upsert_article(&self, article: &Article) -> nd_core::Result<()> {
            if article.url.ends_with("/broken") {
                return Err(Error::Storage("disk full".to_string()));
            }
            self.inner.upsert_article(article).await
        }

        async fn get_by_url(&self, url: &str) -> nd_core::Result<Option<Article>> {
            self.inner.get_by_url(url).await
        }

        async fn query_articles(&self, query: &ArticleQuery) -> nd_core::Result<Vec<Article>> {
            self.inner.query_articles(query).await
        }

        async fn get_by_source(&self, source: &str) -> nd_core::Result<Vec<Article>> {
            self.inner.get_by_source(source).await
        }

        async fn count(&self) -> nd_core::Result<u64> {
            self.inner.count().await
        }

        async fn statistics(&self) -> nd_core::Result<Statistics> {
            self.inner.statistics().await
        }

        async fn record_scrape_run(&self, run: &ScrapeRun) -> nd_core::Result<()> {
            self.inner.record_scrape_run(run).await
        }

        async fn recent_scrape_runs(&self, limit: u32) -> nd_core::Result<Vec<ScrapeRun>> {
            self.inner.recent_scrape_runs(limit).await
        }
    }

    #[tokio::test]
    async fn test_storage_failure_skips_candidate() {
        let storage = Arc::new(FlakyStorage {
            inner: MemoryStorage::new(),
        });
        let dedup = Deduplicator::new(storage.clone());

        let (stored, summary) = dedup
            .process(vec![
                article("https://cnn.com/broken", "Broken"),
                article("https://cnn.com/ok", "Fine"),
            ])
            .await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.new, 1);
        assert_eq!(stored[0].0.url, "https://cnn.com/ok");
        assert_eq!(storage.count().await.unwrap(), 1);
    }
}
