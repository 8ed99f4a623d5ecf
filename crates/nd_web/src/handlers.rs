use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::Utc;
use nd_core::{Article, ArticleQuery, Error, ScrapeRun, SourceMetadata, Statistics};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::dashboard::{self, DashboardView};
use crate::AppState;

const DEFAULT_RUNS_LIMIT: u32 = 20;
const MAX_RUNS_LIMIT: u32 = 200;

pub enum ApiError {
    NotFound(String),
    Internal(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(e) => {
                error!(error = %e, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Comma-separated filter parameters shared by the dashboard and the API.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ArticleParams {
    pub sources: Option<String>,
    pub categories: Option<String>,
    pub keywords: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ArticleParams {
    pub fn to_query(&self) -> ArticleQuery {
        ArticleQuery {
            sources: split_list(self.sources.as_deref()),
            categories: split_list(self.categories.as_deref()),
            keywords: split_list(self.keywords.as_deref()),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
pub struct ArticleParam {
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunsParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScrapeParams {
    pub source: Option<String>,
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ArticleParams>,
) -> ApiResult<Html<String>> {
    let query = params.to_query();
    let articles = state.storage.query_articles(&query).await?;
    let stats = state.storage.statistics().await?;
    let sources = state.manager.list_scrapers();

    let view = DashboardView {
        articles: &articles,
        stats: &stats,
        sources: &sources,
        query: &query,
    };
    Ok(Html(dashboard::render(&view)))
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ArticleParams>,
) -> ApiResult<Json<Vec<Article>>> {
    let articles = state.storage.query_articles(&params.to_query()).await?;
    Ok(Json(articles))
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Query(param): Query<ArticleParam>,
) -> ApiResult<Json<Article>> {
    state
        .storage
        .get_by_url(&param.url)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Article not found: {}", param.url)))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<Statistics>> {
    Ok(Json(state.storage.statistics().await?))
}

pub async fn sources(State(state): State<Arc<AppState>>) -> Json<Vec<SourceMetadata>> {
    Json(state.manager.list_scrapers())
}

pub async fn runs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RunsParams>,
) -> ApiResult<Json<Vec<ScrapeRun>>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RUNS_LIMIT)
        .clamp(1, MAX_RUNS_LIMIT);
    Ok(Json(state.storage.recent_scrape_runs(limit).await?))
}

/// Runs one scraping cycle and reports its totals.
pub async fn scrape(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScrapeParams>,
) -> ApiResult<Json<Value>> {
    info!(source = ?params.source, "🦗 Manual scrape requested");
    let report = state.manager.run_cycle(params.source.as_deref()).await?;
    let total_articles = state.storage.count().await?;

    Ok(Json(json!({
        "success": true,
        "articles_found": report.articles_found,
        "articles_scraped": report.articles_scraped,
        "new_articles": report.new,
        "updated_articles": report.updated,
        "unchanged_articles": report.unchanged,
        "total_articles": total_articles,
        "duration_secs": report.duration_secs,
        "runs": report.runs,
        "timestamp": Utc::now(),
    })))
}
