//! The decode engine: region dispatch and the suspension channel.
//!
//! Decoding runs as ordinary depth-first recursion. Anything that stops
//! the whole run travels on the `Err` side of [`Step`]: a request for
//! bytes the engine does not have, or a strict-mode abort. Data failures
//! in the other modes become [`Decoded::Error`] nodes and stay on the
//! `Ok` side so sibling fields keep decoding.

/// Elementary word/byte interpretation.
pub(crate) mod elementary;
/// Flat-buffer strategy for calldata and event data.
pub(crate) mod flat;
/// Slot-addressed strategy for contract storage.
pub(crate) mod storage;

use std::collections::BTreeMap;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};

use crate::allocation::AllocationTables;
use crate::error::DecodeError;
use crate::pointer::slot::{Slot, SlotResolver};
use crate::pointer::Pointer;
use crate::request::DecodeRequest;
use crate::state::{EvmState, KeyObservation};
use crate::types::DataType;
use crate::value::{Decoded, TypedValue};

/// Failure policy applied uniformly across one decode tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DecodeMode {
    /// Embed failures as error nodes and keep decoding siblings.
    #[default]
    Normal,
    /// Abort the entire decode on the first failure, discarding partial
    /// results.
    Strict,
    /// Like normal, but suppress padding and domain checks wherever a
    /// masked best-effort value exists.
    Permissive,
}

impl DecodeMode {
    /// True for [`Self::Strict`].
    #[must_use]
    pub const fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }

    /// True for [`Self::Permissive`].
    #[must_use]
    pub const fn is_permissive(self) -> bool {
        matches!(self, Self::Permissive)
    }
}

/// Why a decode run stopped before producing its tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Interrupt {
    /// Bytes are needed that neither the snapshot nor the fetch caches
    /// hold. The run is abandoned and restarted once the host answers.
    Missing(DecodeRequest),
    /// Strict-mode stop signal, or a protocol failure fatal in any mode.
    Abort(DecodeError),
}

/// Outcome of one recursive decode step.
pub(crate) type Step<T> = Result<T, Interrupt>;

/// Borrowed inputs of one decode run.
///
/// Everything here is read-only except the resolver's memo table, which
/// only caches pure address computations; a run never mutates snapshot,
/// tables, or caches, so restarting after a resume replays identically up
/// to the old suspension point.
pub(crate) struct DecodeContext<'a> {
    /// Layout tables for user-defined types.
    pub tables: &'a AllocationTables,
    /// Execution-state snapshot.
    pub state: &'a EvmState,
    /// Mapping keys observed by the caller.
    pub observations: &'a [KeyObservation],
    /// Failure policy for this run.
    pub mode: DecodeMode,
    /// Memoized slot address resolution.
    pub resolver: &'a mut SlotResolver,
    /// Storage words fetched through the request protocol.
    pub fetched_words: &'a BTreeMap<U256, B256>,
    /// Contract code fetched through the request protocol.
    pub fetched_code: &'a BTreeMap<Address, Bytes>,
}

impl DecodeContext<'_> {
    /// Applies the failure policy to a data error: an embedded error node
    /// normally, an abort under strict mode. Protocol errors abort in
    /// every mode since they describe a broken exchange, not bad data.
    pub fn fail(&self, err: DecodeError) -> Step<Decoded> {
        if self.mode.is_strict() || err.is_protocol() {
            Err(Interrupt::Abort(err))
        } else {
            Ok(Decoded::Error(err))
        }
    }

    /// Reads one storage word, suspending when it is not yet known.
    pub fn storage_word(&mut self, slot: &Slot) -> Step<B256> {
        let word_address = self.resolver.resolve(slot);
        if let Some(word) = self.state.storage_word(word_address) {
            return Ok(word);
        }
        if let Some(word) = self.fetched_words.get(&word_address) {
            return Ok(*word);
        }
        Err(Interrupt::Missing(DecodeRequest::StorageRead {
            address: self.state.address,
            slot: word_address,
        }))
    }

    /// Returns a contract's runtime code, suspending until the host
    /// supplies it.
    pub fn contract_code(&mut self, account: Address) -> Step<Bytes> {
        if let Some(code) = self.fetched_code.get(&account) {
            return Ok(code.clone());
        }
        Err(Interrupt::Missing(DecodeRequest::CodeRead {
            address: account,
            block: self.state.block,
        }))
    }
}

/// Decodes one type at one pointer, dispatching to the region strategy.
pub(crate) fn decode(
    cx: &mut DecodeContext<'_>,
    ty: &DataType,
    pointer: &Pointer,
) -> Step<Decoded> {
    match pointer {
        // the root pointer's start doubles as the base offsets are
        // measured from, until a nesting level re-derives it
        Pointer::Flat(flat) => flat::decode_flat(cx, ty, flat, flat.start),
        Pointer::Storage(range) => storage::decode_storage(cx, ty, range),
    }
}

/// Decodes a contract reference: fetches the account's runtime code and
/// pairs the address with the code hash that identifies its class.
pub(crate) fn decode_contract(cx: &mut DecodeContext<'_>, account: Address) -> Step<Decoded> {
    let code = cx.contract_code(account)?;
    Ok(Decoded::Value(TypedValue::Contract {
        address: account,
        code_hash: keccak256(&code),
    }))
}
