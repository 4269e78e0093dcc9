// Adapters layer: concrete implementations for external systems (inference backend, HTTP surface).

pub mod gradio;
pub mod http;
