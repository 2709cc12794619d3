//! Nullable infrastructure for deterministic testing.
//!
//! Every collaborator the pool talks to (clock, custody, price feed) is
//! abstracted behind a trait. This crate provides implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests and dry runs.

pub mod clock;
pub mod custody;
pub mod price_feed;

pub use clock::NullClock;
pub use custody::{NullCustody, TransferRecord};
pub use price_feed::NullPriceFeed;
