//! Administrative roles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A role gating a class of administrative operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Collector identities, management fee, pause, role grants.
    Admin,
    /// Mint/redeem/protocol/interest-cost fee rates, capital floor, process period.
    PoolManager,
    /// Target APR.
    AprManager,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::PoolManager, Role::AprManager];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "ADMIN",
            Role::PoolManager => "POOL_MANAGER",
            Role::AprManager => "APR_MANAGER",
        };
        f.write_str(name)
    }
}
