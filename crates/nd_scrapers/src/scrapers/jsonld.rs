use scraper::{Html, Selector};
use serde_json::Value;

/// Parsed JSON-LD blocks, flattened: top-level arrays and `@graph` members
/// become individual nodes.
fn nodes(document: &Html) -> Vec<Value> {
    let mut nodes = Vec::new();

    let Ok(script_selector) = Selector::parse("script[type='application/ld+json']") else {
        return nodes;
    };

    for script in document.select(&script_selector) {
        let Ok(json) = serde_json::from_str::<Value>(script.text().collect::<String>().trim()) else {
            continue;
        };
        let top = match json {
            Value::Array(items) => items,
            other => vec![other],
        };
        for node in top {
            if let Some(Value::Array(graph)) = node.get("@graph") {
                nodes.extend(graph.iter().cloned());
            }
            nodes.push(node);
        }
    }

    nodes
}

fn name_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Object(obj) => obj
            .get("name")
            .and_then(|n| n.as_str())
            .map(|n| n.trim().to_string()),
        _ => None,
    }
    .filter(|n| !n.is_empty())
}

/// Extracts authors from JSON-LD metadata in the HTML document.
/// Returns a vector of author names.
pub fn extract_authors(document: &Html) -> Vec<String> {
    let mut authors = Vec::new();

    for node in nodes(document) {
        match node.get("author") {
            Some(Value::Array(arr)) => authors.extend(arr.iter().filter_map(name_of)),
            Some(author) => authors.extend(name_of(author)),
            None => {}
        }
    }

    authors.dedup();
    authors
}

/// First `datePublished` found in JSON-LD metadata.
pub fn extract_date_published(document: &Html) -> Option<String> {
    nodes(document).iter().find_map(|node| {
        node.get("datePublished")
            .and_then(|d| d.as_str())
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_authors_variants() {
        let html = r#"
            <script type="application/ld+json">
              {"@type": "NewsArticle", "author": [{"name": " Ana Ruiz "}, {"name": "Tom Lee"}]}
            </script>
            <script type="application/ld+json">
              {"@graph": [{"@type": "NewsArticle", "author": "Desk Editor", "datePublished": "2025-02-01T08:00:00Z"}]}
            </script>
            <script type="application/ld+json">not json</script>
        "#;
        let document = Html::parse_document(html);

        assert_eq!(
            extract_authors(&document),
            vec!["Ana Ruiz".to_string(), "Tom Lee".to_string(), "Desk Editor".to_string()]
        );
        assert_eq!(
            extract_date_published(&document).as_deref(),
            Some("2025-02-01T08:00:00Z")
        );
    }

    #[test]
    fn test_no_jsonld() {
        let document = Html::parse_document("<p>plain</p>");
        assert!(extract_authors(&document).is_empty());
        assert!(extract_date_published(&document).is_none());
    }
}
