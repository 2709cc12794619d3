//! Rebasing wrapper over pool claim tokens.
//!
//! Holders deposit claim tokens and receive shares. A holder's displayed
//! balance is its share of everything the wrapper holds, valued at the
//! pool's current price, so balances grow as interest accrues while the
//! share count stays fixed.
//!
//! This crate handles:
//! - Share accounting and the share/amount conversions
//! - Wrap, unwrap, and minting straight into the wrapper
//! - Transfers and allowances on displayed amounts
//! - Wrapper snapshots

pub mod error;
pub mod snapshot;
pub mod source;
pub mod wrapper;

pub use error::RebaseError;
pub use snapshot::{WrapperSnapshot, CURRENT_WRAPPER_VERSION};
pub use source::ClaimPool;
pub use wrapper::RebasingWrapper;
