use std::sync::Arc;

use nd_core::ArticleStorage;
use nd_scrapers::ScraperManager;

pub struct AppState {
    pub storage: Arc<dyn ArticleStorage>,
    pub manager: Arc<ScraperManager>,
}

impl AppState {
    /// State sharing the manager's storage.
    pub fn new(manager: Arc<ScraperManager>) -> Self {
        Self {
            storage: manager.storage(),
            manager,
        }
    }
}
