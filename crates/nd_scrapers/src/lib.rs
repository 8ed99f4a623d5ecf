pub mod cli;
pub mod dedup;
pub mod fetch;
pub mod manager;
pub mod scrapers;

pub use dedup::{Deduplicator, DedupSummary};
pub use fetch::Fetcher;
pub use manager::{CycleReport, ScraperManager};

pub use cli::{handle_command, ScraperArgs, ScraperCommands};

pub mod prelude {
    pub use nd_core::{Article, Error, Result, Scraper};
}
