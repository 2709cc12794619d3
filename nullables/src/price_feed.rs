//! Nullable price feed: a settable peg price.

use std::sync::atomic::{AtomicU64, Ordering};

use tide_pool::{CustodyError, PriceFeed};
use tide_types::params::PEG_PRICE;

pub struct NullPriceFeed {
    price: AtomicU64,
}

impl NullPriceFeed {
    /// A feed reporting exactly the peg.
    pub fn on_peg() -> Self {
        Self::new(PEG_PRICE)
    }

    pub fn new(price: u64) -> Self {
        Self {
            price: AtomicU64::new(price),
        }
    }

    pub fn set(&self, price: u64) {
        self.price.store(price, Ordering::SeqCst);
    }
}

impl PriceFeed for NullPriceFeed {
    fn peg_price(&self) -> Result<u64, CustodyError> {
        Ok(self.price.load(Ordering::SeqCst))
    }
}
