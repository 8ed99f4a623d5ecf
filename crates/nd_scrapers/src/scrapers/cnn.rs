use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::Html;
use tracing::{debug, info, instrument};

use nd_core::analysis;
use nd_core::{Article, Result, Scraper, SourceMetadata};

use crate::fetch::Fetcher;
use crate::scrapers::{jsonld, utils, ExtractedArticle, DEFAULT_CATEGORY};

lazy_static! {
    static ref DATED_PATH: Regex = Regex::new(r"/20\d{2}/").unwrap();
}

const SKIPPED_PATHS: &[&str] = &["live-updates", "/videos/", "/video/", "gallery"];

const CATEGORY_RULES: &[(&str, &str)] = &[
    ("/politics/", "Politics"),
    ("/business/", "Business"),
    ("/tech/", "Technology"),
    ("/health/", "Health"),
    ("/entertainment/", "Entertainment"),
    ("/sport/", "Sports"),
    ("/world/", "World"),
    ("/us/", "US"),
];

const TITLE_SELECTORS: &[&str] = &["h1.headline__text", "h1[data-editable='headlineText']", "h1"];
const BODY_SELECTORS: &[&str] = &[
    ".article__content p",
    ".zn-body__paragraph",
    "[data-component-name='paragraph']",
    "article p",
];
const AUTHOR_SELECTORS: &[&str] = &[".byline__name", ".metadata__byline__author", "[rel='author']"];
const DATE_SELECTORS: &[&str] = &[".timestamp", ".update-time", ".metadata__date"];

#[derive(Debug, Clone)]
pub struct CnnScraper {
    fetcher: Fetcher,
    base_url: String,
    max_articles: usize,
}

impl CnnScraper {
    pub const BASE_URL: &'static str = "https://www.cnn.com";
    pub const NAME: &'static str = "CNN";

    pub fn new(fetcher: Fetcher, max_articles: usize) -> Self {
        Self {
            fetcher,
            base_url: Self::BASE_URL.to_string(),
            max_articles,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Dated story links from the homepage.
    pub fn parse_links(&self, html: &str) -> Result<Vec<String>> {
        let base = utils::parse_url(&self.base_url)?;
        let document = Html::parse_document(html);

        let urls = utils::hrefs(&document)?
            .into_iter()
            .filter(|href| DATED_PATH.is_match(href))
            .filter(|href| {
                let lower = href.to_lowercase();
                !SKIPPED_PATHS.iter().any(|skip| lower.contains(skip))
            })
            .filter_map(|href| utils::resolve(&base, &href))
            .filter(|url| self.can_handle(url))
            .collect();

        let mut urls = utils::dedup_preserving_order(urls);
        urls.truncate(self.max_articles);
        Ok(urls)
    }

    pub fn parse_article(&self, url: &str, html: &str) -> Result<Article> {
        let base = utils::parse_url(url)?;
        let document = Html::parse_document(html);

        let title = utils::first_text(&document, TITLE_SELECTORS, 0)?.unwrap_or_default();
        let category = match analysis::categorize_url(url, CATEGORY_RULES, "") {
            c if c.is_empty() => utils::breadcrumb_category(&document, &[".breadcrumb a"], &["home", "cnn"])?
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            c => c,
        };

        let published_raw = utils::pick_date([
            utils::first_attr(&document, &["time[datetime]"], &["datetime"])?,
            utils::meta_content(&document, "article:published_time")?,
            jsonld::extract_date_published(&document),
            utils::first_text(&document, DATE_SELECTORS, 0)?,
        ]);

        let image_url = utils::meta_content(&document, "og:image")?
            .or(utils::first_attr(&document, &[".image__picture img", "article img"], &["src"])?)
            .and_then(|src| utils::absolute_image(&base, &src));

        let extracted = ExtractedArticle {
            title,
            author: utils::authors(&document, AUTHOR_SELECTORS, None)?,
            published_raw,
            category,
            paragraphs: utils::texts(&document, BODY_SELECTORS, 20)?,
            meta_description: utils::meta_content(&document, "description")?,
            image_url,
        };
        debug!(%url, paragraphs = extracted.paragraphs.len(), "Parsed CNN article");

        extracted.into_article(Self::NAME, url)
    }
}

#[async_trait]
impl Scraper for CnnScraper {
    fn source_metadata(&self) -> SourceMetadata {
        SourceMetadata {
            name: Self::NAME,
            emoji: "📺",
            base_url: self.base_url.clone(),
        }
    }

    fn can_handle(&self, url: &str) -> bool {
        utils::is_site_url(url, &self.base_url, &["cnn.com"])
    }

    fn cli_names(&self) -> Vec<&str> {
        vec!["cnn"]
    }

    #[instrument(level = "info", skip(self), fields(source = "CNN"))]
    async fn get_article_urls(&self) -> Result<Vec<String>> {
        let html = self.fetcher.get_html(&self.base_url).await?;
        let urls = self.parse_links(&html)?;
        info!(count = urls.len(), "Found article URLs");
        Ok(urls)
    }

    async fn scrape_article(&self, url: &str) -> Result<Article> {
        let html = self.fetcher.get_html(url).await?;
        self.parse_article(url, &html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use nd_core::ScrapeConfig;
    use std::time::Duration;

    const HOMEPAGE: &str = r#"
        <html><body>
          <a href="/2025/03/14/politics/budget-vote/index.html">Budget</a>
          <a href="/2025/03/14/politics/budget-vote/index.html#comments">Budget again</a>
          <a href="https://edition.cnn.com/2024/11/02/tech/chip-race/index.html">Chips</a>
          <a href="/2025/03/14/world/live-updates/ukraine">Live</a>
          <a href="/videos/2025/03/14/clip">Video</a>
          <a href="/2025/03/13/world/gallery/photos">Gallery</a>
          <a href="/2025/03/13/weather/storm-photo-gallery/index.html">Storm photos</a>
          <a href="/politics">Section</a>
          <a href="https://example.org/2025/03/14/other">Elsewhere</a>
        </body></html>
    "#;

    const ARTICLE: &str = r#"
        <html><head>
          <meta name="description" content="Lawmakers pass the budget.">
          <meta property="og:image" content="//media.cnn.com/budget.jpg">
        </head><body>
          <h1 class="headline__text">  Budget   passes </h1>
          <span class="byline__name">By Ana Ruiz</span>
          <div class="timestamp">Updated 10:00 AM EDT</div>
          <time datetime="2025-03-14T14:00:00Z"></time>
          <div class="article__content">
            <p>Lawmakers approved the budget after a strong push for growth.</p>
            <p>Short one.</p>
            <p>Critics warned the plan carries a real risk for the deficit.</p>
          </div>
        </body></html>
    "#;

    fn scraper(base_url: &str, max_articles: usize) -> CnnScraper {
        let config = ScrapeConfig {
            request_delay: Duration::ZERO,
            ..ScrapeConfig::default()
        };
        CnnScraper::new(Fetcher::new(&config).unwrap(), max_articles).with_base_url(base_url)
    }

    #[test]
    fn test_can_handle() {
        let scraper = scraper(CnnScraper::BASE_URL, 25);
        assert!(scraper.can_handle("https://www.cnn.com/2025/01/01/us/story/index.html"));
        assert!(scraper.can_handle("https://edition.cnn.com/2025/01/01/us/story"));
        assert!(!scraper.can_handle("https://www.bbc.com/news/world-12345678"));
        assert!(!scraper.can_handle("https://evil.example/?cnn.com"));
        assert!(!scraper.can_handle("https://www.cnn.com.evil.example/2025/01/01/us/story"));
    }

    #[test]
    fn test_parse_links_filters_and_dedups() {
        let links = scraper(CnnScraper::BASE_URL, 25).parse_links(HOMEPAGE).unwrap();
        assert_eq!(
            links,
            vec![
                "https://www.cnn.com/2025/03/14/politics/budget-vote/index.html".to_string(),
                "https://edition.cnn.com/2024/11/02/tech/chip-race/index.html".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_links_respects_limit() {
        let links = scraper(CnnScraper::BASE_URL, 1).parse_links(HOMEPAGE).unwrap();
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_parse_article() {
        let url = "https://www.cnn.com/2025/03/14/politics/budget-vote/index.html";
        let article = scraper(CnnScraper::BASE_URL, 25).parse_article(url, ARTICLE).unwrap();

        assert_eq!(article.title, "Budget passes");
        assert_eq!(article.source, "CNN");
        assert_eq!(article.category, "Politics");
        assert_eq!(article.author.as_deref(), Some("Ana Ruiz"));
        assert_eq!(article.image_url.as_deref(), Some("https://media.cnn.com/budget.jpg"));

        let published = article.published_date.unwrap();
        assert_eq!(
            (published.year(), published.month(), published.day(), published.hour()),
            (2025, 3, 14, 14)
        );

        assert_eq!(
            article.body_text,
            "Lawmakers approved the budget after a strong push for growth.\n\n\
             Critics warned the plan carries a real risk for the deficit."
        );
        assert_eq!(
            article.summary.as_deref(),
            Some("Lawmakers approved the budget after a strong push for growth.")
        );
        assert_eq!(article.word_count, 21);
        // strong, growth vs risk
        assert!((article.sentiment_score - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_article_without_title_fails() {
        let result = scraper(CnnScraper::BASE_URL, 25)
            .parse_article("https://www.cnn.com/2025/01/01/us/x", "<p>No headline here at all.</p>");
        assert!(matches!(result, Err(nd_core::Error::Scraping(_))));
    }

    #[test]
    fn test_category_falls_back_to_breadcrumb() {
        let html = r#"<h1>Storm</h1><nav class="breadcrumb"><a>Home</a><a>Weather</a></nav>"#;
        let article = scraper(CnnScraper::BASE_URL, 25)
            .parse_article("https://www.cnn.com/2025/01/01/weather/storm", html)
            .unwrap();
        assert_eq!(article.category, "Weather");
        assert!(article.published_date.is_none());
        assert!(article.summary.is_none());
    }
}
