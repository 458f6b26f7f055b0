use std::sync::Arc;

use bistro_common::{Error, Result};
use bistro_config::{AppConfig, mask_url};
use bistro_db::{MigrationRunner, RecordStore, Registry, connect};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::router::build_router;
use crate::shutdown;
use crate::state::AppState;

/// The HTTP server: connects the record store, optionally migrates it, and
/// serves the API until a shutdown signal arrives.
pub struct GatewayServer {
    config: AppConfig,
}

impl GatewayServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);

        let store = connect(&self.config.database.url).await?;
        info!(
            "record store connected: {}",
            mask_url(&self.config.database.url)
        );

        if self.config.server.migrate_on_start {
            migrate(&store).await?;
        }

        let state = Arc::new(AppState::new(self.config, Arc::clone(&store)));
        let app = build_router(state);

        let listener = TcpListener::bind(&addr).await?;
        info!("Bistro gateway listening on {}", addr);

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::signal())
            .await
            .map_err(|e| Error::Gateway(format!("server error: {e}")));

        if let Err(e) = store.close().await {
            warn!("failed to close record store: {e}");
        }
        info!("gateway stopped");
        served
    }
}

async fn migrate(store: &Arc<dyn RecordStore>) -> Result<()> {
    let registry = Registry::builtin()?;
    let report = MigrationRunner::new(Arc::clone(store))
        .run_all(registry.units())
        .await?;
    if !report.applied.is_empty() {
        info!("applied migrations on start: {}", report.applied.join(", "));
    }
    Ok(())
}
