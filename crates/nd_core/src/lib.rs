pub mod analysis;
pub mod config;
pub mod error;
pub mod scraper;
pub mod storage;
pub mod types;

pub use config::{Config, ScrapeConfig};
pub use error::{Error, Result};
pub use scraper::{Scraper, SourceMetadata};
pub use storage::ArticleStorage;
pub use types::{
    Article, ArticleQuery, ArticleStatus, RunStatus, ScrapeRun, Statistics,
};
