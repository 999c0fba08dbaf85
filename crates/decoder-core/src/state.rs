//! Execution-state snapshot a decode runs against.

use std::collections::BTreeMap;

use alloy_primitives::{Address, Bytes, B256, U256};

use crate::pointer::slot::Slot;
use crate::pointer::DataRegion;
use crate::value::ElementaryValue;

/// One observed mapping access: which mapping (structurally) was touched
/// and with what key.
///
/// Storage cannot enumerate its own keys, so the caller gathers these by
/// means outside this crate, e.g. scanning historical writes. Decoded
/// mapping contents are exactly as complete as this list.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct KeyObservation {
    /// Structural slot of the mapping that was accessed.
    pub path: Slot,
    /// Key the access used.
    pub key: ElementaryValue,
}

/// Snapshot of the execution state visible to one decode session.
///
/// The engine treats every field as read-only; bytes it cannot find here
/// are requested from the host instead. The storage map is sparse: an
/// absent word is unknown, not zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EvmState {
    /// Contract whose storage and code the decode concerns.
    pub address: Address,
    /// Block height the snapshot was taken at.
    pub block: u64,
    /// Input data of the call.
    pub calldata: Bytes,
    /// Payload of the event.
    pub event_data: Bytes,
    /// Known storage words keyed by resolved word address.
    pub storage: BTreeMap<U256, B256>,
}

impl EvmState {
    /// Bytes currently known for a flat region.
    #[must_use]
    pub fn region_bytes(&self, region: DataRegion) -> &[u8] {
        match region {
            DataRegion::Calldata => self.calldata.as_ref(),
            DataRegion::EventData => self.event_data.as_ref(),
        }
    }

    /// Known storage word at a resolved address, if the snapshot has it.
    #[must_use]
    pub fn storage_word(&self, address: U256) -> Option<B256> {
        self.storage.get(&address).copied()
    }
}
