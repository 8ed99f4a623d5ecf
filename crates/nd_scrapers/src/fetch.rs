use std::time::Duration;

use nd_core::{Result, ScrapeConfig};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use tracing::debug;

/// Shared HTTP client for all scrapers.
///
/// One attempt per page: a non-2xx status or transport error is returned to
/// the caller, which decides whether to skip the page.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    delay: Duration,
}

impl Fetcher {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            delay: config.request_delay,
        })
    }

    /// GETs a page and returns its body, then waits out the politeness delay.
    pub async fn get_html(&self, url: &str) -> Result<String> {
        debug!(%url, "Fetching page");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        debug!(%url, bytes = body.len(), "Fetched page");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        let config = ScrapeConfig {
            request_delay: Duration::ZERO,
            ..ScrapeConfig::default()
        };
        Fetcher::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_get_html_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let body = fetcher()
            .get_html(&format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_get_html_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let result = fetcher().get_html(&format!("{}/page", server.uri())).await;
        assert!(matches!(result, Err(nd_core::Error::Http(_))));
    }
}
