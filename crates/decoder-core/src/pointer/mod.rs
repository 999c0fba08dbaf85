//! Pointer and region model: describes where a value's bytes live.

/// Structural slot keys, ranges, and the memoizing address resolver.
pub mod slot;

pub use slot::{Slot, SlotPosition, SlotRange, SlotResolver};

/// Size in bytes of one word, the natural alignment unit of this domain.
pub const WORD_BYTES: usize = 32;

/// Flat data regions addressed by plain byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DataRegion {
    /// Input data of the call being decoded.
    Calldata,
    /// Payload of the event being decoded.
    EventData,
}

/// A byte range inside one flat region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FlatPointer {
    /// Region the range indexes into.
    pub region: DataRegion,
    /// First byte of the range.
    pub start: usize,
    /// Number of bytes in the range.
    pub length: usize,
}

impl FlatPointer {
    /// Builds a pointer into `region` covering `[start, start + length)`.
    #[must_use]
    pub const fn new(region: DataRegion, start: usize, length: usize) -> Self {
        Self {
            region,
            start,
            length,
        }
    }
}

/// Where a value's bytes live: a flat byte range or a storage slot range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Pointer {
    /// Byte range in calldata or event data.
    Flat(FlatPointer),
    /// Slot-addressed range in contract storage.
    Storage(SlotRange),
}

impl Pointer {
    /// Pointer to `length` bytes of calldata starting at `start`.
    #[must_use]
    pub const fn calldata(start: usize, length: usize) -> Self {
        Self::Flat(FlatPointer::new(DataRegion::Calldata, start, length))
    }

    /// Pointer to `length` bytes of event data starting at `start`.
    #[must_use]
    pub const fn event_data(start: usize, length: usize) -> Self {
        Self::Flat(FlatPointer::new(DataRegion::EventData, start, length))
    }

    /// Pointer to a storage slot range.
    #[must_use]
    pub const fn storage(range: SlotRange) -> Self {
        Self::Storage(range)
    }
}
