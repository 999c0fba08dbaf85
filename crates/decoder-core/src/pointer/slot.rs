//! Structural storage addressing.
//!
//! A [`Slot`] names a storage word by how the layout reaches it (parent
//! slot, word offset, hashing indirection, mapping key) rather than by its
//! absolute address. Two slots denote the same word exactly when their
//! structural descriptions resolve to the same address; [`SlotResolver`]
//! performs that resolution, memoized so shared parents hash once.

use std::collections::HashMap;

use alloy_primitives::{keccak256, B256, U256};

use crate::value::ElementaryValue;

/// Identity of one storage word, described structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Slot {
    /// Structural parent, e.g. the array this element belongs to.
    pub path: Option<Box<Slot>>,
    /// Word offset from the parent's base, or the absolute word address
    /// when there is no parent.
    pub offset: U256,
    /// Derive the base by hashing the parent's address instead of using it
    /// directly. Required for dynamic array content and mapping entries.
    pub hash_path: bool,
    /// Mapping key salting the hash; meaningful only with `hash_path`.
    pub key: Option<ElementaryValue>,
}

impl Slot {
    /// Slot at an absolute word address.
    #[must_use]
    pub const fn root(offset: U256) -> Self {
        Self {
            path: None,
            offset,
            hash_path: false,
            key: None,
        }
    }

    /// The same structural base, `words` further along. Derives a fresh
    /// value instead of mutating, so sibling decodes can never alias.
    #[must_use]
    pub fn offset_by(&self, words: U256) -> Self {
        Self {
            path: self.path.clone(),
            offset: self.offset.wrapping_add(words),
            hash_path: self.hash_path,
            key: self.key.clone(),
        }
    }

    /// Child slot reached by hashing `parent`'s address, `words` past the
    /// hash. This is where dynamic array and long string content lives.
    #[must_use]
    pub fn hashed_child(parent: Self, words: U256) -> Self {
        Self {
            path: Some(Box::new(parent)),
            offset: words,
            hash_path: true,
            key: None,
        }
    }

    /// Entry slot of a mapping: the hash of `parent`'s address salted by
    /// `key`'s canonical encoding.
    #[must_use]
    pub fn mapping_entry(parent: Self, key: ElementaryValue) -> Self {
        Self {
            path: Some(Box::new(parent)),
            offset: U256::ZERO,
            hash_path: true,
            key: Some(key),
        }
    }
}

/// A byte position inside storage: a slot plus the big-endian byte index
/// where the value's content begins (0 is the most significant byte).
///
/// Packing fills words from the least significant end, so the first packed
/// value of size `n` starts at index `32 - n` and later ones move toward 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SlotPosition {
    /// Word the position indexes into.
    pub slot: Slot,
    /// Byte index of the first content byte, from the most significant end.
    pub index: u8,
}

impl SlotPosition {
    /// Position covering a whole word.
    #[must_use]
    pub const fn word_start(slot: Slot) -> Self {
        Self { slot, index: 0 }
    }

    /// Position of packed element `ordinal` in an array of `element_size`
    /// byte elements based at `base`. `element_size` must be 1..=32.
    ///
    /// `floor(32 / element_size)` elements share each word; within a word
    /// ordinals fill lanes from the least significant end upward.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // lane arithmetic is bounded by the word size
    pub fn packed_element(base: &Slot, element_size: u8, ordinal: u64) -> Self {
        let per_word = u64::from(32 / element_size);
        let word = ordinal / per_word;
        let lane = ordinal % per_word;
        let index = 32 - (lane as u8 + 1) * element_size;
        Self {
            slot: base.offset_by(U256::from(word)),
            index,
        }
    }
}

/// Span of storage bytes addressed structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SlotRange {
    /// Whole-word span; `to` is the position of the last byte, inclusive.
    Span {
        /// First byte of the span.
        from: SlotPosition,
        /// Last byte of the span.
        to: SlotPosition,
    },
    /// Sub-word span of `length` bytes starting at `from`.
    Packed {
        /// First byte of the span.
        from: SlotPosition,
        /// Number of content bytes.
        length: u8,
    },
}

impl SlotRange {
    /// Range covering exactly one whole word.
    #[must_use]
    pub fn word(slot: Slot) -> Self {
        Self::whole_words(slot, 1)
    }

    /// Range covering `words` whole words starting at `slot`.
    #[must_use]
    pub fn whole_words(slot: Slot, words: u64) -> Self {
        let last = slot.offset_by(U256::from(words.saturating_sub(1)));
        Self::Span {
            from: SlotPosition::word_start(slot),
            to: SlotPosition { slot: last, index: 31 },
        }
    }

    /// Sub-word range of `length` bytes ending at the least significant
    /// byte of `slot`, where a lone packed value is placed.
    #[must_use]
    pub const fn low_bytes(slot: Slot, length: u8) -> Self {
        Self::Packed {
            from: SlotPosition { slot, index: 32 - length },
            length,
        }
    }

    /// Slot the range starts in.
    #[must_use]
    pub const fn base_slot(&self) -> &Slot {
        match self {
            Self::Span { from, .. } | Self::Packed { from, .. } => &from.slot,
        }
    }

    /// Re-anchors a layout-relative range onto `base`.
    ///
    /// Relative ranges use rootless slots whose offsets count words from
    /// the owning value's first slot; the result keeps `base`'s structural
    /// path, so struct members never add a hashing indirection themselves.
    #[must_use]
    pub fn rebased_onto(&self, base: &Slot) -> Self {
        let rebase = |position: &SlotPosition| SlotPosition {
            slot: base.offset_by(position.slot.offset),
            index: position.index,
        };
        match self {
            Self::Span { from, to } => Self::Span {
                from: rebase(from),
                to: rebase(to),
            },
            Self::Packed { from, length } => Self::Packed {
                from: rebase(from),
                length: *length,
            },
        }
    }
}

/// Memoizing resolver from structural slots to absolute word addresses.
///
/// One resolver serves one decode run; the cache keeps shared parent paths
/// from being re-hashed. Addresses wrap modulo `2^256` like the underlying
/// address space.
#[derive(Debug, Default)]
pub struct SlotResolver {
    resolved: HashMap<Slot, U256>,
}

impl SlotResolver {
    /// Fresh resolver with an empty memo table.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new() -> Self {
        Self {
            resolved: HashMap::new(),
        }
    }

    /// Resolves a structural slot to its absolute word address.
    ///
    /// Resolution starts from the parent's address (0 without a parent),
    /// applies keccak-256 if `hash_path` (salted by the key's canonical
    /// encoding when present), then adds the word offset.
    pub fn resolve(&mut self, slot: &Slot) -> U256 {
        if let Some(hit) = self.resolved.get(slot) {
            return *hit;
        }
        let mut base = match &slot.path {
            Some(parent) => self.resolve(parent),
            None => U256::ZERO,
        };
        if slot.hash_path {
            let base_word = B256::from(base);
            let digest = match &slot.key {
                Some(key) => {
                    let mut salted = key.encode_for_hash();
                    salted.extend_from_slice(base_word.as_slice());
                    keccak256(&salted)
                }
                None => keccak256(base_word),
            };
            base = U256::from_be_bytes(digest.0);
        }
        let address = base.wrapping_add(slot.offset);
        self.resolved.insert(slot.clone(), address);
        address
    }
}
