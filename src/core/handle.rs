use crate::domain::ports::{BackendConnector, BackendSession};
use crate::utils::error::{RelayError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Owns the single shared backend session and reconnects on demand.
pub struct BackendHandleManager {
    connector: Arc<dyn BackendConnector>,
    handle: RwLock<Option<Arc<dyn BackendSession>>>,
    // serializes connection attempts so concurrent first requests share one session
    connecting: Mutex<()>,
    connect_timeout: Duration,
}

impl BackendHandleManager {
    pub fn new(connector: Arc<dyn BackendConnector>) -> Self {
        Self {
            connector,
            handle: RwLock::new(None),
            connecting: Mutex::new(()),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Bounds each connection attempt; waiting requests queue behind it.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Returns the stored session, connecting first if there is none.
    pub async fn ensure_connected(&self) -> Result<Arc<dyn BackendSession>> {
        if let Some(session) = self.handle.read().await.as_ref() {
            return Ok(Arc::clone(session));
        }

        let _guard = self.connecting.lock().await;
        if let Some(session) = self.handle.read().await.as_ref() {
            return Ok(Arc::clone(session));
        }

        tracing::info!("🔌 Connecting to inference backend {}", self.connector.describe());
        let attempt = tokio::time::timeout(self.connect_timeout, self.connector.connect()).await;
        let session = match attempt {
            Ok(Ok(session)) => session,
            Err(_) => {
                tracing::error!(
                    "❌ Connecting to inference backend exceeded {:?}",
                    self.connect_timeout
                );
                return Err(RelayError::BackendUnavailable {
                    message: format!(
                        "connection attempt timed out after {:?}",
                        self.connect_timeout
                    ),
                    source: None,
                });
            }
            Ok(Err(e)) => {
                tracing::error!("❌ Failed to connect to inference backend: {}", e);
                return Err(match e {
                    unavailable @ RelayError::BackendUnavailable { .. } => unavailable,
                    other => RelayError::unavailable(other),
                });
            }
        };
        tracing::info!("✅ Inference backend connected");

        *self.handle.write().await = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Drops the stored session; the next `ensure_connected` reconnects.
    pub async fn invalidate(&self) {
        if self.handle.write().await.take().is_some() {
            tracing::warn!("Backend session invalidated, will reconnect on next request");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.handle.read().await.is_some()
    }
}
