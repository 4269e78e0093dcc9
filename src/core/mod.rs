pub mod gateway;
pub mod handle;
pub mod params;

pub use crate::domain::model::{ImageBlob, TryOnParameters, TryOnRequest, TryOnResult};
pub use crate::domain::ports::{BackendConnector, BackendSession};
pub use crate::utils::error::Result;
