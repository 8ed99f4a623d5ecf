use async_trait::async_trait;
use scraper::Html;
use tracing::{debug, info, instrument};
use url::Url;

use nd_core::analysis;
use nd_core::{Article, Result, Scraper, SourceMetadata};

use crate::fetch::Fetcher;
use crate::scrapers::{discover_links, jsonld, utils, ExtractedArticle, DEFAULT_CATEGORY};

const LINK_PAGES: &[&str] = &["/", "/world/", "/business/", "/technology/"];

const SECTIONS: &[&str] = &[
    "/world/",
    "/business/",
    "/technology/",
    "/markets/",
    "/legal/",
    "/breakingviews/",
];

const SKIPPED_PATHS: &[&str] = &["/live/", "/tv/", "/video/", "/graphics/", "/picture/", "/audio/"];

const CATEGORY_RULES: &[(&str, &str)] = &[
    ("/world/", "World"),
    ("/business/", "Business"),
    ("/technology/", "Technology"),
    ("/markets/", "Markets"),
    ("/breakingviews/", "Opinion"),
    ("/sports/", "Sports"),
    ("/lifestyle/", "Lifestyle"),
    ("/legal/", "Legal"),
];

const TITLE_SELECTORS: &[&str] = &[
    "[data-testid='ArticleHeader-headline']",
    "h1[data-testid='Heading']",
    "[data-testid='Heading']",
    "h1",
];
const BODY_SELECTORS: &[&str] = &[
    "div[data-module='ArticleBody'] p",
    ".ArticleBodyWrapper p",
    "article p",
];
const AUTHOR_SELECTORS: &[&str] = &[
    "[data-testid='AuthorBylineCard']",
    "[data-testid='AuthorNameLink']",
    ".author-name",
    "[data-module='BylineCard'] span",
];
const DATE_SELECTORS: &[&str] = &["[data-testid='ArticleHeader-date']", ".timestamp", "time"];
const IMAGE_SELECTORS: &[&str] = &["[data-testid='Image'] img", "figure img"];

/// Numbered paragraph blocks are read until the first gap.
const MAX_NUMBERED_PARAGRAPHS: usize = 60;

#[derive(Debug, Clone)]
pub struct ReutersScraper {
    fetcher: Fetcher,
    base_url: String,
    max_articles: usize,
}

impl ReutersScraper {
    pub const BASE_URL: &'static str = "https://www.reuters.com";
    pub const NAME: &'static str = "Reuters";

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

    /// Story links on one page, in document order.
    pub fn parse_links(&self, html: &str) -> Result<Vec<String>> {
        let base = utils::parse_url(&self.base_url)?;
        let document = Html::parse_document(html);

        let urls = utils::hrefs(&document)?
            .into_iter()
            .filter(|href| {
                let lower = href.to_lowercase();
                SECTIONS.iter().any(|s| lower.contains(s))
                    && !SKIPPED_PATHS.iter().any(|s| lower.contains(s))
            })
            .filter_map(|href| utils::resolve(&base, &href))
            .filter(|url| self.can_handle(url) && is_story_url(url))
            .collect();

        Ok(utils::dedup_preserving_order(urls))
    }

    pub fn parse_article(&self, url: &str, html: &str) -> Result<Article> {
        let base = utils::parse_url(url)?;
        let document = Html::parse_document(html);

        let title = match utils::first_text(&document, TITLE_SELECTORS, 10)? {
            Some(title) => title,
            None => utils::first_text(&document, TITLE_SELECTORS, 0)?.unwrap_or_default(),
        };

        let mut paragraphs = numbered_paragraphs(&document)?;
        if paragraphs.is_empty() {
            paragraphs = utils::texts(&document, BODY_SELECTORS, 20)?;
        }

        let published_raw = utils::pick_date([
            utils::first_attr(&document, &["time[datetime]"], &["datetime"])?,
            utils::meta_content(&document, "article:published_time")?,
            jsonld::extract_date_published(&document),
            utils::first_text(&document, DATE_SELECTORS, 0)?,
        ]);

        let image_url = utils::first_attr(&document, IMAGE_SELECTORS, &["src", "data-src"])?
            .or(utils::meta_content(&document, "og:image")?)
            .and_then(|src| utils::absolute_image(&base, &src));

        let extracted = ExtractedArticle {
            title,
            author: utils::authors(&document, AUTHOR_SELECTORS, Some("reuters"))?,
            published_raw,
            category: analysis::categorize_url(url, CATEGORY_RULES, DEFAULT_CATEGORY),
            paragraphs,
            meta_description: utils::meta_content(&document, "description")?,
            image_url,
        };
        debug!(%url, paragraphs = extracted.paragraphs.len(), "Parsed Reuters article");

        extracted.into_article(Self::NAME, url)
    }
}

/// `[data-testid="paragraph-N"]` blocks in order, skipping very short ones.
fn numbered_paragraphs(document: &Html) -> Result<Vec<String>> {
    let mut paragraphs = Vec::new();
    for i in 0..MAX_NUMBERED_PARAGRAPHS {
        let sel = utils::selector(&format!("[data-testid='paragraph-{}']", i))?;
        let Some(el) = document.select(&sel).next() else {
            break;
        };
        let text = utils::element_text(&el);
        if text.chars().count() > 15 {
            paragraphs.push(text);
        }
    }
    Ok(paragraphs)
}

/// A section plus at least one more path segment, e.g. `/world/europe/story-id/`.
fn is_story_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.path_segments().map(|s| s.filter(|p| !p.is_empty()).count()))
        .map_or(false, |segments| segments >= 2)
}

#[async_trait]
impl Scraper for ReutersScraper {
    fn source_metadata(&self) -> SourceMetadata {
        SourceMetadata {
            name: Self::NAME,
            emoji: "📰",
            base_url: self.base_url.clone(),
        }
    }

    fn can_handle(&self, url: &str) -> bool {
        utils::is_site_url(url, &self.base_url, &["reuters.com"])
    }

    fn cli_names(&self) -> Vec<&str> {
        vec!["reuters"]
    }

    #[instrument(level = "info", skip(self), fields(source = "Reuters"))]
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
