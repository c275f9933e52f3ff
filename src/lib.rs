//! Reqlimit - Per-client Request Admission Gate
//!
//! This crate limits how many requests each client may issue within a fixed
//! time window. Clients are identified by the host part of their origin
//! address, counted in an in-memory sharded store, and gated by a Tower
//! middleware that sits in front of any HTTP service.

pub mod config;
pub mod error;
pub mod middleware;
pub mod ratelimit;

pub use middleware::{RemoteAddr, RequestLimit, RequestLimitLayer};
pub use ratelimit::{ClientIdentity, Decision, LimitConfig, WindowCounterStore};
