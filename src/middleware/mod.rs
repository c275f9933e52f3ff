//! Tower middleware placing the request limiter in front of a service.

mod layer;
mod service;

pub use layer::RequestLimitLayer;
pub use service::{client_identity, RemoteAddr, RequestLimit};
