//! Light text analysis applied to every scraped article.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

pub const SUMMARY_MAX_CHARS: usize = 500;

pub const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "amazing", "wonderful", "fantastic",
    "positive", "success", "win", "achieve", "breakthrough", "progress",
    "growth", "improve", "benefit", "gain", "rise", "boost", "strong",
    "effective", "efficient", "innovative", "outstanding", "remarkable",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "horrible", "negative", "fail", "failure",
    "crisis", "problem", "issue", "concern", "worry", "decline", "fall",
    "drop", "loss", "damage", "threat", "risk", "danger", "weak",
    "poor", "disappointing", "concerning", "alarming", "devastating",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%SZ"];
const DATE_FORMATS: &[&str] = &["%d %b %Y", "%B %d, %Y", "%d/%m/%Y", "%m/%d/%Y"];

/// Collapses whitespace runs into single spaces and trims the ends.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Keyword-count sentiment in `[-1.0, 1.0]`.
///
/// Tokens are whitespace-separated, lowercased, and stripped of surrounding
/// punctuation before the lexicon lookup. Text without lexicon hits scores 0.
pub fn sentiment_score(text: &str) -> f64 {
    let mut positive = 0u32;
    let mut negative = 0u32;

    for token in text.split_whitespace() {
        let word = token
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if POSITIVE_WORDS.contains(&word.as_str()) {
            positive += 1;
        } else if NEGATIVE_WORDS.contains(&word.as_str()) {
            negative += 1;
        }
    }

    let total = positive + negative;
    if total == 0 {
        return 0.0;
    }
    (positive as f64 - negative as f64) / total as f64
}

/// First paragraph, capped at [`SUMMARY_MAX_CHARS`] characters.
pub fn summarize(paragraphs: &[String]) -> Option<String> {
    let first = paragraphs.iter().find(|p| !p.trim().is_empty())?;
    Some(truncate_chars(first.trim(), SUMMARY_MAX_CHARS))
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Maps a url to a category using ordered `(needle, category)` rules.
/// The first needle found in the lowercased url wins.
pub fn categorize_url(url: &str, rules: &[(&str, &str)], default: &str) -> String {
    let url = url.to_lowercase();
    rules
        .iter()
        .find(|(needle, _)| url.contains(needle))
        .map(|(_, category)| category.to_string())
        .unwrap_or_else(|| default.to_string())
}

/// Parses the date formats seen on the supported sites. Returns `None` for
/// anything unrecognised rather than guessing.
pub fn parse_published_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
        }
    }

    None
}

/// Strips a leading "By " from a byline.
pub fn clean_byline(raw: &str) -> Option<String> {
    let text = clean_text(raw);
    let text = match text.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("by ") => text[3..].trim().to_string(),
        _ => text,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  This   is \n\t messy   text  "), "This is messy text");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("one two  three\nfour"), 4);
        assert_eq!(word_count("   "), 0);
    }

    #[test]
    fn test_sentiment_is_deterministic() {
        let text = "Great progress, but a serious risk of decline. Growth remains strong!";
        let first = sentiment_score(text);
        // positive: great, progress, growth, strong; negative: risk, decline
        assert!((first - (4.0 - 2.0) / 6.0).abs() < f64::EPSILON);
        assert_eq!(first, sentiment_score(text));
    }

    #[test]
    fn test_sentiment_bounds() {
        assert_eq!(sentiment_score(""), 0.0);
        assert_eq!(sentiment_score("The weather is mild today."), 0.0);
        assert_eq!(sentiment_score("Success! A win."), 1.0);
        assert_eq!(sentiment_score("Crisis, failure and loss"), -1.0);
    }

    #[test]
    fn test_summarize_truncates_on_char_boundary() {
        let long = "é".repeat(600);
        let summary = summarize(&["".to_string(), long]).unwrap();
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS);
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_categorize_url() {
        let rules = [("/politics/", "Politics"), ("/world/", "World")];
        assert_eq!(
            categorize_url("https://x.com/2025/01/01/POLITICS/story", &rules, "General"),
            "Politics"
        );
        assert_eq!(categorize_url("https://x.com/sport/a", &rules, "General"), "General");
    }

    #[test]
    fn test_parse_published_date() {
        let dt = parse_published_date("2025-03-14T09:26:53.000Z").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2025, 3, 14, 9));

        let dt = parse_published_date("2025-03-14T11:26:53+02:00").unwrap();
        assert_eq!(dt.hour(), 9);

        let dt = parse_published_date("2025-03-14 09:26:53").unwrap();
        assert_eq!(dt.minute(), 26);

        let dt = parse_published_date("14 Mar 2025").unwrap();
        assert_eq!((dt.month(), dt.day()), (3, 14));

        let dt = parse_published_date("March 14, 2025").unwrap();
        assert_eq!(dt.day(), 14);

        assert!(parse_published_date("2 hours ago").is_none());
        assert!(parse_published_date("").is_none());
    }

    #[test]
    fn test_clean_byline() {
        assert_eq!(clean_byline("By  Jane Doe ").as_deref(), Some("Jane Doe"));
        assert_eq!(clean_byline("John Smith").as_deref(), Some("John Smith"));
        assert!(clean_byline("  ").is_none());
    }
}
