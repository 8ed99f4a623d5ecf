use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use nd_core::{Article, ArticleQuery, ArticleStorage, Result, ScrapeRun, Statistics};
use tokio::sync::RwLock;

/// Articles keyed by url, kept in process memory.
#[derive(Default)]
struct MemoryStore {
    articles: HashMap<String, Article>,
    runs: Vec<ScrapeRun>,
}

impl MemoryStore {
    fn sorted(&self, filter: impl Fn(&Article) -> bool) -> Vec<Article> {
        let mut articles: Vec<Article> = self.articles.values().filter(|a| filter(a)).cloned().collect();
        articles.sort_by(|a, b| {
            b.collected_at
                .cmp(&a.collected_at)
                .then_with(|| a.url.cmp(&b.url))
        });
        articles
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    store: RwLock<MemoryStore>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStorage for MemoryStorage {
    async fn upsert_article(&self, article: &Article) -> Result<()> {
        let mut store = self.store.write().await;
        let mut article = article.clone();
        if let Some(existing) = store.articles.get(&article.url) {
            article.collected_at = existing.collected_at;
        }
        store.articles.insert(article.url.clone(), article);
        Ok(())
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<Article>> {
        Ok(self.store.read().await.articles.get(url).cloned())
    }

    async fn query_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        Ok(store
            .sorted(|a| query.matches(a))
            .into_iter()
            .skip(query.effective_offset() as usize)
            .take(query.effective_limit() as usize)
            .collect())
    }

    async fn get_by_source(&self, source: &str) -> Result<Vec<Article>> {
        Ok(self.store.read().await.sorted(|a| a.source == source))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.store.read().await.articles.len() as u64)
    }

    async fn statistics(&self) -> Result<Statistics> {
        let store = self.store.read().await;
        let cutoff = Utc::now() - Duration::hours(24);

        let mut stats = Statistics {
            total_articles: store.articles.len() as u64,
            last_updated: store.articles.values().map(|a| a.updated_at).max(),
            ..Statistics::default()
        };

        let bump = |map: &mut BTreeMap<String, u64>, key: &str| {
            *map.entry(key.to_string()).or_insert(0) += 1;
        };
        for article in store.articles.values() {
            bump(&mut stats.all_articles_by_source, &article.source);
            if article.collected_at >= cutoff {
                stats.recent_articles += 1;
                bump(&mut stats.articles_by_source, &article.source);
                bump(&mut stats.articles_by_category, &article.category);
            }
        }

        Ok(stats)
    }

    async fn record_scrape_run(&self, run: &ScrapeRun) -> Result<()> {
        self.store.write().await.runs.push(run.clone());
        Ok(())
    }

    async fn recent_scrape_runs(&self, limit: u32) -> Result<Vec<ScrapeRun>> {
        let store = self.store.read().await;
        Ok(store.runs.iter().rev().take(limit as usize).cloned().collect())
    }
}
