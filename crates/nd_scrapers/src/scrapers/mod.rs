use std::sync::Arc;

use chrono::Utc;
use nd_core::analysis;
use nd_core::{Article, Error, Result, ScrapeConfig, Scraper};
use scraper::Html;
use tracing::{debug, warn};

use crate::fetch::Fetcher;

pub mod bbc;
pub mod cnn;
pub mod jsonld;
pub mod reuters;

pub use bbc::BbcScraper;
pub use cnn::CnnScraper;
pub use reuters::ReutersScraper;

pub const DEFAULT_CATEGORY: &str = "General";

/// Returns the three built-in scrapers sharing one fetcher.
pub fn default_scrapers(fetcher: &Fetcher, config: &ScrapeConfig) -> Vec<Arc<dyn Scraper>> {
    vec![
        Arc::new(BbcScraper::new(fetcher.clone(), config.max_articles_per_source)),
        Arc::new(CnnScraper::new(fetcher.clone(), config.max_articles_per_source)),
        Arc::new(ReutersScraper::new(fetcher.clone(), config.max_articles_per_source)),
    ]
}

/// Fetches each link page in order and collects the links `parse` finds.
///
/// A page that fails to load is logged and skipped; the error is returned only
/// when no page could be fetched at all.
pub(crate) async fn discover_links<F>(
    fetcher: &Fetcher,
    pages: &[String],
    max_articles: usize,
    parse: F,
) -> Result<Vec<String>>
where
    F: Fn(&str) -> Result<Vec<String>> + Send,
{
    let mut links = Vec::new();
    let mut fetched = 0usize;
    let mut last_error = None;

    for page in pages {
        match fetcher.get_html(page).await {
            Ok(html) => {
                let found = parse(html.as_str())?;
                debug!(%page, count = found.len(), "Collected links");
                links.extend(found);
                fetched += 1;
            }
            Err(e) => {
                warn!(%page, error = %e, "Failed to fetch link page");
                last_error = Some(e);
            }
        }
    }

    if fetched == 0 {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    let mut links = utils::dedup_preserving_order(links);
    links.truncate(max_articles);
    Ok(links)
}

/// Raw fields pulled out of an article page, before analysis.
#[derive(Debug, Default, Clone)]
pub struct ExtractedArticle {
    pub title: String,
    pub author: Option<String>,
    pub published_raw: Option<String>,
    pub category: String,
    pub paragraphs: Vec<String>,
    pub meta_description: Option<String>,
    pub image_url: Option<String>,
}

impl ExtractedArticle {
    /// Builds the final record, computing word count, sentiment and summary.
    pub fn into_article(self, source: &str, url: &str) -> Result<Article> {
        if self.title.is_empty() {
            return Err(Error::Scraping(format!("No title found for {}", url)));
        }

        let body_text = self.paragraphs.join("\n\n");
        let summary = analysis::summarize(&self.paragraphs).or_else(|| {
            self.meta_description
                .as_deref()
                .map(analysis::clean_text)
                .filter(|d| !d.is_empty())
                .map(|d| analysis::truncate_chars(&d, analysis::SUMMARY_MAX_CHARS))
        });
        let now = Utc::now();

        Ok(Article {
            url: url.to_string(),
            source: source.to_string(),
            word_count: analysis::word_count(&body_text),
            sentiment_score: analysis::sentiment_score(&body_text),
            title: self.title,
            author: self.author,
            published_date: self
                .published_raw
                .as_deref()
                .and_then(analysis::parse_published_date),
            category: self.category,
            body_text,
            summary,
            image_url: self.image_url,
            collected_at: now,
            updated_at: now,
        })
    }
}

/// Common utilities for scrapers
pub(crate) mod utils {
    use super::*;
    use scraper::{ElementRef, Selector};
    use std::collections::HashSet;
    use url::Url;

    pub fn parse_url(url: &str) -> Result<Url> {
        Url::parse(url).map_err(|e| Error::Scraping(format!("Failed to parse URL {}: {}", url, e)))
    }

    pub fn selector(css: &str) -> Result<Selector> {
        Selector::parse(css)
            .map_err(|e| Error::Scraping(format!("Invalid selector {}: {:?}", css, e)))
    }

    pub fn element_text(el: &ElementRef) -> String {
        analysis::clean_text(&el.text().collect::<Vec<_>>().join(" "))
    }

    /// Text of the first element matching any selector, in selector order,
    /// that is longer than `min_len` characters.
    pub fn first_text(document: &Html, selectors: &[&str], min_len: usize) -> Result<Option<String>> {
        for css in selectors {
            let sel = selector(css)?;
            if let Some(text) = document
                .select(&sel)
                .map(|el| element_text(&el))
                .find(|t| t.chars().count() > min_len)
            {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }

    pub fn first_attr(document: &Html, selectors: &[&str], attrs: &[&str]) -> Result<Option<String>> {
        for css in selectors {
            let sel = selector(css)?;
            for el in document.select(&sel) {
                for attr in attrs {
                    if let Some(value) = el.value().attr(attr) {
                        let value = value.trim();
                        if !value.is_empty() {
                            return Ok(Some(value.to_string()));
                        }
                    }
                }
            }
        }
        Ok(None)
    }

    /// Texts from the first selector that yields any text longer than
    /// `min_len`.
    pub fn texts(document: &Html, selectors: &[&str], min_len: usize) -> Result<Vec<String>> {
        for css in selectors {
            let sel = selector(css)?;
            let found: Vec<String> = document
                .select(&sel)
                .map(|el| element_text(&el))
                .filter(|t| t.chars().count() > min_len)
                .collect();
            if !found.is_empty() {
                return Ok(found);
            }
        }
        Ok(Vec::new())
    }

    pub fn meta_content(document: &Html, key: &str) -> Result<Option<String>> {
        let by_name = format!("meta[name='{}']", key);
        let by_property = format!("meta[property='{}']", key);
        first_attr(document, &[by_name.as_str(), by_property.as_str()], &["content"])
    }

    /// All `href`s in the document, in document order.
    pub fn hrefs(document: &Html) -> Result<Vec<String>> {
        let sel = selector("a[href]")?;
        Ok(document
            .select(&sel)
            .filter_map(|el| el.value().attr("href"))
            .map(|href| href.trim().to_string())
            .collect())
    }

    /// Absolute url without the fragment, or `None` for unusable hrefs.
    pub fn resolve(base: &Url, href: &str) -> Option<String> {
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }
        let mut url = base.join(href).ok()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return None;
        }
        url.set_fragment(None);
        Some(url.to_string())
    }

    pub fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
    }

    /// Image src, upgrading protocol-relative urls and resolving relative ones.
    pub fn absolute_image(base: &Url, src: &str) -> Option<String> {
        if let Some(rest) = src.strip_prefix("//") {
            return Some(format!("https://{}", rest));
        }
        resolve(base, src)
    }

    /// First candidate that parses as a date; falls back to the first
    /// non-empty one so the raw value is still visible in logs.
    pub fn pick_date<I>(candidates: I) -> Option<String>
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let candidates: Vec<String> = candidates.into_iter().flatten().collect();
        candidates
            .iter()
            .find(|c| analysis::parse_published_date(c).is_some())
            .or_else(|| candidates.first())
            .cloned()
    }

    /// First breadcrumb link text that is not a generic section name.
    pub fn breadcrumb_category(
        document: &Html,
        selectors: &[&str],
        ignore: &[&str],
    ) -> Result<Option<String>> {
        for css in selectors {
            let sel = selector(css)?;
            if let Some(text) = document
                .select(&sel)
                .map(|el| element_text(&el))
                .find(|t| !t.is_empty() && !ignore.contains(&t.to_lowercase().as_str()))
            {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }

    /// Bylines from the first matching selector, or JSON-LD authors, joined
    /// with ", ".
    pub fn authors(document: &Html, selectors: &[&str], reject_prefix: Option<&str>) -> Result<Option<String>> {
        let mut names: Vec<String> = texts(document, selectors, 0)?
            .iter()
            .filter_map(|t| analysis::clean_byline(t))
            .filter(|n| {
                reject_prefix.map_or(true, |p| !n.to_lowercase().starts_with(p))
            })
            .collect();
        if names.is_empty() {
            names = super::jsonld::extract_authors(document);
        }
        names.dedup();
        Ok((!names.is_empty()).then(|| names.join(", ")))
    }

    pub fn same_host(base: &Url, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .map_or(false, |u| u.host_str() == base.host_str() && u.port() == base.port())
    }

    /// True for http(s) urls whose host is one of `domains` or a subdomain of
    /// one, or which share the scraper's configured base host.
    pub fn is_site_url(url: &str, base_url: &str, domains: &[&str]) -> bool {
        let parsed = match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
            _ => return false,
        };
        let host = match parsed.host_str() {
            Some(host) => host.to_lowercase(),
            None => return false,
        };
        if domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
        {
            return true;
        }
        Url::parse(base_url).map_or(false, |base| same_host(&base, url))
    }
}
