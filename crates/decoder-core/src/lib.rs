//! Type-directed decoding of EVM calldata, event data, and contract storage.

/// Type identifiers and the data type grammar.
pub mod types;
pub use types::{DataType, ElementaryType, TypeId};

/// Decode error taxonomy with class and policy predicates.
pub mod error;
pub use error::{DecodeError, ErrorClass};

/// Decoded value trees and their rendering.
pub mod value;
pub use value::{Decoded, ElementaryValue, StringData, TypedValue};

/// Pointers into the three data regions, including structural slots.
pub mod pointer;
pub use pointer::{
    DataRegion, FlatPointer, Pointer, Slot, SlotPosition, SlotRange, SlotResolver, WORD_BYTES,
};

/// User-defined type layouts for calldata and storage.
pub mod allocation;
pub use allocation::{
    AllocationTables, CallLayout, CallMember, EnumDef, StorageLayout, StorageMember, StorageSize,
    StructDef,
};

/// The EVM snapshot decoding runs against.
pub mod state;
pub use state::{EvmState, KeyObservation};

/// Requests and responses of the suspension protocol.
pub mod request;
pub use request::{DecodeRequest, RequestResponse};

/// Decode strategies and the failure policy.
pub mod decode;
pub use decode::DecodeMode;

/// The resumable machine driving a decode through suspensions.
pub mod machine;
pub use machine::{
    run_to_completion, DecodeMachine, DecodeProgress, DecodeSession, MachinePhase, ReadError,
    StateReader,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
