//! Service layer around one pool and its rebasing wrapper.
//!
//! Owns the pool behind an async lock, stamps every call with the injected
//! clock, counts outcomes, and persists snapshots to a data directory.

pub mod config;
pub mod error;
pub mod service;

pub use config::PoolConfig;
pub use error::ServiceError;
pub use service::{PoolService, PoolSummary, SERVICE_COUNTERS};
