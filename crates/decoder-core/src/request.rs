//! Engine-to-host data request protocol.
//!
//! The engine never fetches anything itself. When it needs bytes that are
//! not in the snapshot, it suspends with a [`DecodeRequest`]; the host
//! answers with the matching [`RequestResponse`] and resumes. How the host
//! produces the bytes (cache, batch, network) is invisible here.

use alloy_primitives::{Address, Bytes, B256, U256};

/// A request for bytes the engine does not yet have.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DecodeRequest {
    /// One word of a contract's storage.
    StorageRead {
        /// Contract whose storage is read.
        address: Address,
        /// Resolved absolute word address.
        slot: U256,
    },
    /// A contract's runtime code.
    CodeRead {
        /// Account whose code is read.
        address: Address,
        /// Block height the code should be read at.
        block: u64,
    },
}

/// The host's answer to the pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RequestResponse {
    /// Answer to a [`DecodeRequest::StorageRead`].
    StorageWord(B256),
    /// Answer to a [`DecodeRequest::CodeRead`].
    Code(Bytes),
}

impl DecodeRequest {
    /// Whether `response` is the right kind of answer for this request.
    #[must_use]
    pub const fn accepts(&self, response: &RequestResponse) -> bool {
        matches!(
            (self, response),
            (Self::StorageRead { .. }, RequestResponse::StorageWord(_))
                | (Self::CodeRead { .. }, RequestResponse::Code(_))
        )
    }
}
