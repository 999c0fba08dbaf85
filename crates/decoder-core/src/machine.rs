//! The resumable decode machine.
//!
//! A decode runs as a pure pass over the snapshot plus whatever the
//! machine has already fetched. When it needs a word the snapshot lacks,
//! it parks on a [`DecodeRequest`]; [`DecodeMachine::resume`] files the
//! host's answer and re-runs the pass. Re-running is cheap because every
//! previously fetched word is answered from the machine's own cache, so
//! each round trip makes strictly more progress.

use std::collections::BTreeMap;

use alloy_primitives::{Address, Bytes, B256, U256};
use thiserror::Error;

use crate::allocation::AllocationTables;
use crate::decode::{self, DecodeContext, DecodeMode, Interrupt};
use crate::error::DecodeError;
use crate::pointer::slot::SlotResolver;
use crate::pointer::Pointer;
use crate::request::{DecodeRequest, RequestResponse};
use crate::state::{EvmState, KeyObservation};
use crate::types::DataType;
use crate::value::Decoded;

/// Everything a decode reads but never writes.
///
/// Sessions are plain bundles of borrows, so any number of machines can
/// share one while decoding different values of the same transaction.
#[derive(Debug, Clone, Copy)]
pub struct DecodeSession<'a> {
    /// User-defined type definitions.
    pub tables: &'a AllocationTables,
    /// The snapshot decoding runs against.
    pub state: &'a EvmState,
    /// Mapping keys the caller saw being accessed.
    pub observations: &'a [KeyObservation],
}

/// Where a machine currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachinePhase {
    /// No outcome yet; [`DecodeMachine::advance`] will run the decode.
    Dispatching,
    /// Parked on a request until [`DecodeMachine::resume`] answers it.
    AwaitingData,
    /// Finished with a decoded tree.
    Finished,
    /// Stopped on an error that no response can repair.
    Aborted,
}

/// What a machine reports after each step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeProgress {
    /// The decode needs data only the host can supply.
    AwaitingData(DecodeRequest),
    /// The decode ran to the end.
    Finished(Decoded),
    /// The decode cannot continue.
    Aborted(DecodeError),
}

/// A resumable decode of one type at one pointer.
#[derive(Debug)]
pub struct DecodeMachine<'a> {
    session: DecodeSession<'a>,
    mode: DecodeMode,
    ty: DataType,
    pointer: Pointer,
    resolver: SlotResolver,
    fetched_words: BTreeMap<U256, B256>,
    fetched_code: BTreeMap<Address, Bytes>,
    pending: Option<DecodeRequest>,
    outcome: Option<Result<Decoded, DecodeError>>,
}

impl<'a> DecodeMachine<'a> {
    /// Creates a machine. Nothing runs until [`Self::advance`].
    #[must_use]
    pub fn new(
        session: DecodeSession<'a>,
        ty: DataType,
        pointer: Pointer,
        mode: DecodeMode,
    ) -> Self {
        Self {
            session,
            mode,
            ty,
            pointer,
            resolver: SlotResolver::new(),
            fetched_words: BTreeMap::new(),
            fetched_code: BTreeMap::new(),
            pending: None,
            outcome: None,
        }
    }

    /// The machine's current phase.
    #[must_use]
    pub const fn phase(&self) -> MachinePhase {
        match (&self.outcome, &self.pending) {
            (Some(Ok(_)), _) => MachinePhase::Finished,
            (Some(Err(_)), _) => MachinePhase::Aborted,
            (None, Some(_)) => MachinePhase::AwaitingData,
            (None, None) => MachinePhase::Dispatching,
        }
    }

    /// The request the machine is parked on, if any.
    #[must_use]
    pub const fn pending_request(&self) -> Option<&DecodeRequest> {
        self.pending.as_ref()
    }

    /// Runs the decode until it finishes, aborts, or parks on a request.
    ///
    /// Advancing a parked machine re-emits the same request without
    /// re-running anything; advancing a settled machine re-emits its
    /// outcome.
    pub fn advance(&mut self) -> DecodeProgress {
        if let Some(outcome) = &self.outcome {
            return match outcome {
                Ok(decoded) => DecodeProgress::Finished(decoded.clone()),
                Err(err) => DecodeProgress::Aborted(err.clone()),
            };
        }
        if let Some(request) = &self.pending {
            return DecodeProgress::AwaitingData(request.clone());
        }
        let mut cx = DecodeContext {
            tables: self.session.tables,
            state: self.session.state,
            observations: self.session.observations,
            mode: self.mode,
            resolver: &mut self.resolver,
            fetched_words: &self.fetched_words,
            fetched_code: &self.fetched_code,
        };
        match decode::decode(&mut cx, &self.ty, &self.pointer) {
            Ok(decoded) => {
                tracing::debug!("decode of {} finished", self.ty);
                self.outcome = Some(Ok(decoded.clone()));
                DecodeProgress::Finished(decoded)
            }
            Err(Interrupt::Missing(request)) => {
                tracing::trace!("decode of {} awaiting {:?}", self.ty, request);
                self.pending = Some(request.clone());
                DecodeProgress::AwaitingData(request)
            }
            Err(Interrupt::Abort(err)) => {
                tracing::debug!("decode of {} aborted: {err}", self.ty);
                self.outcome = Some(Err(err.clone()));
                DecodeProgress::Aborted(err)
            }
        }
    }

    /// Files the host's answer to the pending request and re-runs the
    /// decode.
    ///
    /// A response arriving with no pending request, or one whose shape
    /// does not answer it, aborts the machine with
    /// [`DecodeError::ResponseMismatch`]. A settled machine ignores the
    /// response and re-emits its outcome.
    pub fn resume(&mut self, response: RequestResponse) -> DecodeProgress {
        if self.outcome.is_some() {
            return self.advance();
        }
        let Some(request) = self.pending.take() else {
            tracing::warn!("response {:?} arrived with nothing pending", response);
            return self.abort(DecodeError::ResponseMismatch);
        };
        match (request, response) {
            (DecodeRequest::StorageRead { slot, .. }, RequestResponse::StorageWord(word)) => {
                self.fetched_words.insert(slot, word);
                self.advance()
            }
            (DecodeRequest::CodeRead { address, .. }, RequestResponse::Code(code)) => {
                self.fetched_code.insert(address, code);
                self.advance()
            }
            (request, response) => {
                tracing::warn!("response {:?} does not answer {:?}", response, request);
                self.abort(DecodeError::ResponseMismatch)
            }
        }
    }

    fn abort(&mut self, err: DecodeError) -> DecodeProgress {
        self.outcome = Some(Err(err.clone()));
        DecodeProgress::Aborted(err)
    }
}

/// Supplies data on demand when driving a machine to completion.
pub trait StateReader {
    /// Reads the storage word of `address` at the resolved `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError`] when the word cannot be produced.
    fn storage_word(&mut self, address: Address, slot: U256) -> Result<B256, ReadError>;

    /// Fetches the runtime code of `address` as of `block`.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError`] when the code cannot be produced.
    fn contract_code(&mut self, address: Address, block: u64) -> Result<Bytes, ReadError>;
}

/// A host-side read failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("state read failed: {reason}")]
pub struct ReadError {
    /// Host description of what went wrong.
    pub reason: String,
}

/// Drives `machine` until it settles, answering every request through
/// `reader`.
///
/// # Errors
///
/// Returns the machine's abort error, or [`DecodeError::ReadFailed`] when
/// `reader` cannot answer a request.
pub fn run_to_completion(
    mut machine: DecodeMachine<'_>,
    reader: &mut impl StateReader,
) -> Result<Decoded, DecodeError> {
    let mut progress = machine.advance();
    loop {
        match progress {
            DecodeProgress::Finished(decoded) => return Ok(decoded),
            DecodeProgress::Aborted(err) => return Err(err),
            DecodeProgress::AwaitingData(request) => {
                let response = match request {
                    DecodeRequest::StorageRead { address, slot } => reader
                        .storage_word(address, slot)
                        .map(RequestResponse::StorageWord),
                    DecodeRequest::CodeRead { address, block } => reader
                        .contract_code(address, block)
                        .map(RequestResponse::Code),
                };
                progress = match response {
                    Ok(response) => machine.resume(response),
                    Err(err) => return Err(DecodeError::ReadFailed { reason: err.reason }),
                };
            }
        }
    }
}
