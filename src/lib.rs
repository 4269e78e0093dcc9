pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::gradio::GradioConnector;
pub use crate::adapters::http::{create_router, AppState};
pub use crate::app::prepare;
pub use crate::config::{CliConfig, RelayConfig};
pub use crate::core::{
    gateway::{GatewayOptions, TryOnGateway},
    handle::BackendHandleManager,
};
pub use crate::utils::error::{RelayError, Result};
