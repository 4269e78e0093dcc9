//! Startup wiring: connect to the backend, then build the HTTP router.

use crate::adapters::http::{create_router, AppState};
use crate::config::RelayConfig;
use crate::core::gateway::{GatewayOptions, TryOnGateway};
use crate::core::handle::BackendHandleManager;
use crate::domain::ports::BackendConnector;
use crate::utils::error::Result;
use axum::Router;
use std::sync::Arc;

/// Connects eagerly and returns the router ready to serve.
///
/// A failed connection is returned before any router exists, so nothing binds.
pub async fn prepare(config: &RelayConfig, connector: Arc<dyn BackendConnector>) -> Result<Router> {
    let handles = Arc::new(
        BackendHandleManager::new(connector).with_connect_timeout(config.timeout()),
    );

    // 啟動前先連線一次
    handles.ensure_connected().await?;
    tracing::info!("✅ Backend ready, building routes");

    let gateway = TryOnGateway::new(
        handles,
        GatewayOptions {
            api_name: config.api_name.clone(),
            timeout: config.timeout(),
        },
    );
    let state = Arc::new(AppState {
        gateway,
        environment: config.environment,
        max_upload_bytes: config.max_upload_bytes(),
    });

    create_router(state, &config.cors_origin)
}
