use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Error;

/// A collected news article. `url` is the identity of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub source: String,
    pub title: String,
    pub author: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub category: String,
    pub body_text: String,
    pub summary: Option<String>,
    pub image_url: Option<String>,
    pub word_count: u32,
    pub sentiment_score: f64,
    /// First time the url was collected. Never moved by later updates.
    pub collected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Short stable identifier derived from the url, used in web routes.
    pub fn id(&self) -> String {
        article_id(&self.url)
    }

    /// True when the scraped fields match. Collection timestamps and the
    /// derived analysis fields are ignored.
    pub fn same_content(&self, other: &Article) -> bool {
        self.title == other.title
            && self.body_text == other.body_text
            && self.author == other.author
            && self.published_date == other.published_date
            && self.category == other.category
            && self.summary == other.summary
            && self.image_url == other.image_url
    }
}

pub fn article_id(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Outcome of deduplicating one scraped candidate against storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    New,
    Updated,
    Unchanged,
}

impl ArticleStatus {
    pub fn emoji(&self) -> &'static str {
        match self {
            ArticleStatus::New => "🆕",
            ArticleStatus::Updated => "📝",
            ArticleStatus::Unchanged => "⏭️",
        }
    }
}

pub const DEFAULT_QUERY_LIMIT: u32 = 50;
pub const MAX_QUERY_LIMIT: u32 = 500;

/// Filter for listing stored articles. Empty vectors mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleQuery {
    pub sources: Vec<String>,
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ArticleQuery {
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .clamp(1, MAX_QUERY_LIMIT)
    }

    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// Keywords trimmed, lowercased, blanks dropped.
    pub fn normalized_keywords(&self) -> Vec<String> {
        self.keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect()
    }

    pub fn normalized_categories(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// In-memory evaluation of the filter, matching the SQL backend.
    pub fn matches(&self, article: &Article) -> bool {
        if !self.sources.is_empty() && !self.sources.iter().any(|s| s == &article.source) {
            return false;
        }

        let categories = self.normalized_categories();
        if !categories.is_empty() && !categories.contains(&article.category.to_lowercase()) {
            return false;
        }

        let keywords = self.normalized_keywords();
        if !keywords.is_empty() {
            let title = article.title.to_lowercase();
            let body = article.body_text.to_lowercase();
            if !keywords
                .iter()
                .any(|k| title.contains(k.as_str()) || body.contains(k.as_str()))
            {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_articles: u64,
    pub recent_articles: u64,
    pub all_articles_by_source: BTreeMap<String, u64>,
    pub articles_by_source: BTreeMap<String, u64>,
    pub articles_by_category: BTreeMap<String, u64>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    TimedOut,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "timed_out" => Ok(RunStatus::TimedOut),
            other => Err(Error::Database(format!("Unknown run status: {}", other))),
        }
    }
}

/// Bookkeeping for one source within one scraping cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeRun {
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub articles_found: u32,
    pub articles_scraped: u32,
    pub articles_saved: u32,
    pub articles_updated: u32,
    pub status: RunStatus,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str, source: &str, category: &str, title: &str, body: &str) -> Article {
        let now = Utc::now();
        Article {
            url: url.to_string(),
            source: source.to_string(),
            title: title.to_string(),
            author: None,
            published_date: None,
            category: category.to_string(),
            body_text: body.to_string(),
            summary: None,
            image_url: None,
            word_count: 0,
            sentiment_score: 0.0,
            collected_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_article_id_is_stable() {
        let a = article("https://example.com/a", "CNN", "World", "t", "b");
        assert_eq!(a.id(), article_id("https://example.com/a"));
        assert_eq!(a.id().len(), 16);
        assert_ne!(a.id(), article_id("https://example.com/b"));
    }

    #[test]
    fn test_same_content_ignores_timestamps() {
        let a = article("https://example.com/a", "CNN", "World", "t", "b");
        let mut b = a.clone();
        b.collected_at = a.collected_at - chrono::Duration::days(1);
        b.sentiment_score = 0.5;
        assert!(a.same_content(&b));

        b.body_text = "changed".to_string();
        assert!(!a.same_content(&b));
    }

    #[test]
    fn test_query_matches() {
        let a = article(
            "https://example.com/a",
            "CNN",
            "Politics",
            "Election results",
            "Votes were counted",
        );

        assert!(ArticleQuery::default().matches(&a));

        let by_source = ArticleQuery {
            sources: vec!["Reuters".to_string()],
            ..Default::default()
        };
        assert!(!by_source.matches(&a));

        let by_category = ArticleQuery {
            categories: vec!["politics".to_string()],
            ..Default::default()
        };
        assert!(by_category.matches(&a));

        let by_keyword = ArticleQuery {
            keywords: vec!["  ".to_string(), "VOTES".to_string()],
            ..Default::default()
        };
        assert!(by_keyword.matches(&a));

        let miss = ArticleQuery {
            keywords: vec!["weather".to_string()],
            ..Default::default()
        };
        assert!(!miss.matches(&a));
    }

    #[test]
    fn test_query_limit_clamped() {
        assert_eq!(ArticleQuery::default().effective_limit(), DEFAULT_QUERY_LIMIT);
        let q = ArticleQuery {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(q.effective_limit(), MAX_QUERY_LIMIT);
        let q = ArticleQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(q.effective_limit(), 1);
    }

    #[test]
    fn test_run_status_round_trip() {
        for status in [RunStatus::Completed, RunStatus::Failed, RunStatus::TimedOut] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
        assert!("running".parse::<RunStatus>().is_err());
    }
}
