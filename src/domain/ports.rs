use crate::domain::model::PredictInput;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A live session with the remote inference backend.
#[async_trait]
pub trait BackendSession: Send + Sync {
    /// Calls the named endpoint with positional inputs and returns the output sequence.
    async fn predict(&self, api_name: &str, inputs: Vec<PredictInput>)
        -> Result<Vec<serde_json::Value>>;
}

/// Establishes new backend sessions.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn BackendSession>>;

    /// Human readable name of the backend, used in logs.
    fn describe(&self) -> String;
}
