//! Fundamental types for the TIDE pool ledger.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! account identifiers, timestamps, roles, pool parameters, and the 256-bit
//! fixed-point helpers every amount computation goes through.

pub mod account;
pub mod error;
pub mod math;
pub mod params;
pub mod role;
pub mod time;

pub use account::AccountId;
pub use error::MathError;
pub use math::{mul_div, mul_mul_div, pow10};
pub use params::PoolParams;
pub use role::Role;
pub use time::Timestamp;
