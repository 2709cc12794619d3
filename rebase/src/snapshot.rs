//! Versioned serialization of the wrapper state.

use serde::{Deserialize, Serialize};

use crate::error::RebaseError;
use crate::wrapper::RebasingWrapper;

pub const CURRENT_WRAPPER_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WrapperSnapshot {
    /// Schema version; always the first field.
    pub version: u32,
    pub wrapper: RebasingWrapper,
}

impl WrapperSnapshot {
    pub fn capture(wrapper: &RebasingWrapper) -> Self {
        Self {
            version: CURRENT_WRAPPER_VERSION,
            wrapper: wrapper.clone(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, RebaseError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RebaseError> {
        let snapshot: WrapperSnapshot = bincode::deserialize(bytes)?;
        if snapshot.version != CURRENT_WRAPPER_VERSION {
            return Err(RebaseError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }

    pub fn into_wrapper(self) -> RebasingWrapper {
        self.wrapper
    }
}
