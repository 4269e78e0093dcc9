// Domain layer: request/response models and the ports the gateway talks through.

pub mod model;
pub mod ports;
