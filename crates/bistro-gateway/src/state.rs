use std::sync::Arc;

use bistro_config::AppConfig;
use bistro_db::RecordStore;
use bistro_shop::Shop;

/// Shared application state accessible from all request handlers.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn RecordStore>,
    pub shop: Shop,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn RecordStore>) -> Self {
        let shop = Shop::new(Arc::clone(&store));
        Self {
            config,
            store,
            shop,
        }
    }
}

pub type SharedState = Arc<AppState>;
