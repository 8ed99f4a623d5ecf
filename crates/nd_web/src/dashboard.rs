//! Server-rendered HTML dashboard.

use std::collections::{BTreeMap, BTreeSet};

use nd_core::{Article, ArticleQuery, SourceMetadata, Statistics};

pub struct DashboardView<'a> {
    pub articles: &'a [Article],
    pub stats: &'a Statistics,
    pub sources: &'a [SourceMetadata],
    pub query: &'a ArticleQuery,
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn sentiment_label(score: f64) -> (&'static str, &'static str) {
    if score > 0.1 {
        ("positive", "Positive")
    } else if score < -0.1 {
        ("negative", "Negative")
    } else {
        ("neutral", "Neutral")
    }
}

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #f4f5f7; color: #222; }
header { background: #1d3557; color: #fff; padding: 1rem 2rem; }
header .stats span { margin-right: 1.5rem; }
main { padding: 1rem 2rem; }
form { background: #fff; padding: 1rem; border-radius: 6px; margin-bottom: 1rem; }
form fieldset { border: none; display: inline-block; margin-right: 1rem; }
.category h2 { border-bottom: 2px solid #1d3557; }
.article { background: #fff; padding: 0.8rem 1rem; margin-bottom: 0.6rem; border-radius: 6px; }
.article .meta { font-size: 0.85rem; color: #666; }
.positive { color: #2a9d8f; } .negative { color: #e63946; } .neutral { color: #888; }
"#;

fn render_header(stats: &Statistics) -> String {
    let last_updated = stats
        .last_updated
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    let per_source: Vec<String> = stats
        .all_articles_by_source
        .iter()
        .map(|(source, n)| format!("{}: {}", escape_html(source), n))
        .collect();

    format!(
        r#"<header><h1>News Desk</h1><div class="stats"><span>Total: {}</span><span>Last 24h: {}</span><span>Updated: {}</span><span>{}</span></div></header>"#,
        stats.total_articles,
        stats.recent_articles,
        escape_html(&last_updated),
        per_source.join(" · ")
    )
}

fn render_filters(view: &DashboardView) -> String {
    let mut html = String::from(r#"<form method="get" action="/">"#);

    html.push_str(r#"<fieldset><legend>Source</legend><select name="sources"><option value="">All</option>"#);
    for source in view.sources {
        let is_selected = if view.query.sources.iter().any(|s| s == source.name) {
            " selected"
        } else {
            ""
        };
        html.push_str(&format!(
            r#"<option value="{name}"{s}>{emoji} {name}</option>"#,
            name = escape_html(source.name),
            emoji = source.emoji,
            s = is_selected
        ));
    }
    html.push_str("</select></fieldset>");

    let categories: BTreeSet<&str> = view
        .stats
        .articles_by_category
        .keys()
        .map(String::as_str)
        .chain(view.articles.iter().map(|a| a.category.as_str()))
        .collect();
    let selected = view.query.normalized_categories();
    html.push_str(r#"<fieldset><legend>Category</legend><select name="categories"><option value="">All</option>"#);
    for category in categories {
        let is_selected = if selected.contains(&category.to_lowercase()) {
            " selected"
        } else {
            ""
        };
        html.push_str(&format!(
            r#"<option value="{c}"{s}>{c}</option>"#,
            c = escape_html(category),
            s = is_selected
        ));
    }
    html.push_str("</select></fieldset>");

    html.push_str(&format!(
        r#"<fieldset><legend>Keywords</legend><input type="text" name="keywords" value="{}" placeholder="comma,separated"></fieldset>"#,
        escape_html(&view.query.keywords.join(","))
    ));
    html.push_str(r#"<button type="submit">Filter</button></form>"#);
    html
}

fn render_article(article: &Article) -> String {
    let (class, label) = sentiment_label(article.sentiment_score);
    let published = article
        .published_date
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown date".to_string());
    let author = article
        .author
        .as_deref()
        .map(|a| format!(" · {}", escape_html(a)))
        .unwrap_or_default();
    let summary = article
        .summary
        .as_deref()
        .map(|s| format!("<p>{}</p>", escape_html(s)))
        .unwrap_or_default();

    format!(
        r#"<div class="article" id="a-{id}"><h3><a href="{url}" target="_blank" rel="noopener">{title}</a></h3><div class="meta">{source}{author} · {published} · {words} words · <span class="{class}">{label} ({score:.2})</span></div>{summary}</div>"#,
        id = article.id(),
        url = escape_html(&article.url),
        title = escape_html(&article.title),
        source = escape_html(&article.source),
        author = author,
        published = escape_html(&published),
        words = article.word_count,
        class = class,
        label = label,
        score = article.sentiment_score,
        summary = summary
    )
}

/// Full page: statistics header, filter form, and articles grouped by category.
pub fn render(view: &DashboardView) -> String {
    let mut by_category: BTreeMap<&str, Vec<&Article>> = BTreeMap::new();
    for article in view.articles {
        by_category.entry(article.category.as_str()).or_default().push(article);
    }

    let mut body = String::new();
    if by_category.is_empty() {
        body.push_str("<p>No articles match these filters.</p>");
    }
    for (category, articles) in by_category {
        body.push_str(&format!(
            r#"<section class="category"><h2>{} ({})</h2>"#,
            escape_html(category),
            articles.len()
        ));
        for article in articles {
            body.push_str(&render_article(article));
        }
        body.push_str("</section>");
    }

    format!(
        r#"<!DOCTYPE html><html lang="en"><head><meta charset="utf-8"><title>News Desk</title><style>{style}</style></head><body>{header}<main>{filters}{body}</main></body></html>"#,
        style = STYLE,
        header = render_header(view.stats),
        filters = render_filters(view),
        body = body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(category: &str, title: &str, score: f64) -> Article {
        let now = Utc::now();
        Article {
            url: format!("https://example.com/{}", title.len()),
            source: "Reuters".to_string(),
            title: title.to_string(),
            author: None,
            published_date: None,
            category: category.to_string(),
            body_text: String::new(),
            summary: None,
            image_url: None,
            word_count: 0,
            sentiment_score: score,
            collected_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_render_groups_by_category() {
        let articles = vec![
            article("World", "Quake", -0.5),
            article("Business", "Rates", 0.5),
            article("World", "Summit talks", 0.0),
        ];
        let stats = Statistics::default();
        let query = ArticleQuery::default();
        let view = DashboardView {
            articles: &articles,
            stats: &stats,
            sources: &[],
            query: &query,
        };

        let html = render(&view);
        assert!(html.contains("World (2)"));
        assert!(html.contains("Business (1)"));
        assert!(html.find("Business (1)") < html.find("World (2)"));
        assert!(html.contains(r#"<span class="negative">Negative (-0.50)</span>"#));
        assert!(html.contains("Updated: never"));
    }

    #[test]
    fn test_render_empty() {
        let stats = Statistics::default();
        let query = ArticleQuery::default();
        let view = DashboardView {
            articles: &[],
            stats: &stats,
            sources: &[],
            query: &query,
        };
        assert!(render(&view).contains("No articles match these filters."));
    }
}
