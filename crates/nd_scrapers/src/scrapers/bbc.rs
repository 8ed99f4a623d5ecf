use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::Html;
use tracing::{debug, info, instrument};
use url::Url;

use nd_core::analysis;
use nd_core::{Article, Result, Scraper, SourceMetadata};

use crate::fetch::Fetcher;
use crate::scrapers::{discover_links, jsonld, utils, ExtractedArticle, DEFAULT_CATEGORY};

lazy_static! {
    // /news/world-12345678 or /news/articles/c0abc123
    static ref ARTICLE_PATH: Regex =
        Regex::new(r"^/news/(?:[a-zA-Z-]+-\d{8}|articles/[a-zA-Z0-9-]+)$").unwrap();
}

const LINK_PAGES: &[&str] = &[
    "/news",
    "/news/world",
    "/news/uk",
    "/news/technology",
    "/news/business",
];

const SKIPPED_PATHS: &[&str] = &[
    "live",
    "topics",
    "av/",
    "video",
    "pictures",
    "entertainment",
    "newsbeat",
    "reality_check",
];

const CATEGORY_RULES: &[(&str, &str)] = &[
    ("/news/world", "World"),
    ("/news/uk", "UK"),
    ("england", "UK"),
    ("scotland", "UK"),
    ("wales", "UK"),
    ("business", "Business"),
    ("technology", "Technology"),
    ("science", "Science"),
    ("health", "Health"),
    ("politics", "Politics"),
    ("entertainment", "Entertainment"),
    ("sport", "Sports"),
];

const TITLE_SELECTORS: &[&str] = &[
    "h1[data-testid='headline']",
    "header h1",
    "[data-testid='headline']",
    "h1.story-body__h1",
    "h1#main-heading",
    "h1",
];
const BODY_SELECTORS: &[&str] = &[
    "[data-component='text-block'] p",
    "[data-testid='text-block'] p",
    ".story-body__inner p",
    "article p",
    "main p",
];
const AUTHOR_SELECTORS: &[&str] = &[
    "[data-testid='byline-name']",
    "[data-testid='byline']",
    ".author-name",
    ".byline__name",
];
const IMAGE_SELECTORS: &[&str] = &[
    "[data-testid='hero-image'] img",
    "[data-testid='image-block'] img",
    "figure img",
    "article img",
];
const BREADCRUMB_SELECTORS: &[&str] = &["[data-testid='breadcrumb'] a", ".breadcrumb a", "nav a"];

#[derive(Debug, Clone)]
pub struct BbcScraper {
    fetcher: Fetcher,
    base_url: String,
    max_articles: usize,
}

impl BbcScraper {
    pub const BASE_URL: &'static str = "https://www.bbc.com";
    pub const NAME: &'static str = "BBC News";

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

    fn link_pages(&self) -> Vec<String> {
        LINK_PAGES
            .iter()
            .map(|path| format!("{}{}", self.base_url, path))
            .collect()
    }

    /// Article links on one section page. Not truncated; the caller merges
    /// pages before applying the limit.
    pub fn parse_links(&self, html: &str) -> Result<Vec<String>> {
        let base = utils::parse_url(&self.base_url)?;
        let document = Html::parse_document(html);

        let urls = utils::hrefs(&document)?
            .into_iter()
            .filter(|href| href.contains("/news/"))
            .filter(|href| {
                let lower = href.to_lowercase();
                !SKIPPED_PATHS.iter().any(|skip| lower.contains(skip))
            })
            .filter_map(|href| utils::resolve(&base, &href))
            .filter(|url| self.can_handle(url) && is_article_url(url))
            .collect();

        Ok(utils::dedup_preserving_order(urls))
    }

    pub fn parse_article(&self, url: &str, html: &str) -> Result<Article> {
        let base = utils::parse_url(url)?;
        let document = Html::parse_document(html);

        let title = utils::first_text(&document, TITLE_SELECTORS, 0)?.unwrap_or_default();
        let category = match analysis::categorize_url(url, CATEGORY_RULES, "") {
            c if c.is_empty() => {
                utils::breadcrumb_category(&document, BREADCRUMB_SELECTORS, &["home", "news", "bbc"])?
                    .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
            }
            c => c,
        };

        let published_raw = utils::pick_date([
            utils::first_attr(&document, &["time[datetime]"], &["datetime"])?,
            utils::meta_content(&document, "article:published_time")?,
            jsonld::extract_date_published(&document),
            utils::first_text(&document, &["[data-testid='timestamp']", ".date-stamp", "time"], 0)?,
        ]);

        let image_url = utils::first_attr(&document, IMAGE_SELECTORS, &["src", "data-src"])?
            .or(utils::meta_content(&document, "og:image")?)
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
        debug!(%url, paragraphs = extracted.paragraphs.len(), "Parsed BBC article");

        extracted.into_article(Self::NAME, url)
    }
}

fn is_article_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| ARTICLE_PATH.is_match(u.path()))
        .unwrap_or(false)
}

#[async_trait]
impl Scraper for BbcScraper {
    fn source_metadata(&self) -> SourceMetadata {
        SourceMetadata {
            name: Self::NAME,
            emoji: "🇬🇧",
            base_url: self.base_url.clone(),
        }
    }

    fn can_handle(&self, url: &str) -> bool {
        utils::is_site_url(url, &self.base_url, &["bbc.com", "bbc.co.uk"])
    }

    fn cli_names(&self) -> Vec<&str> {
        vec!["bbc"]
    }

    #[instrument(level = "info", skip(self), fields(source = "BBC News"))]
    async fn get_article_urls(&self) -> Result<Vec<String>> {
        let pages = self.link_pages();
        let urls = discover_links(&self.fetcher, &pages, self.max_articles, |html| {
            self.parse_links(html)
        })
        .await?;
        info!(count = urls.len(), "Found article URLs");
        Ok(urls)
    }

    async fn scrape_article(&self, url: &str) -> Result<Article> {
        let html = self.fetcher.get_html(url).await?;
        self.parse_article(url, &html)
    }
}
