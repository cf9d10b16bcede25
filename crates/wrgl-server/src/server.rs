use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use wrgl_objects::ObjectStore;
use wrgl_refs::RefStore;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

const SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// wrgl sync server over one repository.
pub struct WrglServer {
    config: ServerConfig,
    state: AppState,
}

impl WrglServer {
    pub fn new(config: ServerConfig, db: Arc<dyn ObjectStore>, refs: Arc<dyn RefStore>) -> Self {
        let state = AppState::new(db, refs, &config);
        Self { config, state }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let upload_sweeper = self.state.upload_sessions.spawn_sweeper(SWEEP_PERIOD);
        let receive_sweeper = self.state.receive_sessions.spawn_sweeper(SWEEP_PERIOD);
        let app = build_router(self.state);
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            session_ttl_secs = self.config.session_ttl_secs,
            "wrgl server listening"
        );
        let result = axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));
        upload_sweeper.abort();
        receive_sweeper.abort();
        result
    }
}
