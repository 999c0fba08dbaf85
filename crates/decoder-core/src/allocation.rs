//! Allocation model: precomputed layout tables consumed read-only.
//!
//! The tables are produced once per decoding session by an external
//! allocation pass and shared immutably across every decode in that
//! session. Lookup misses are reported as retryable errors, never panics,
//! since the caller may discover new types mid-session and rebuild.

use std::collections::BTreeMap;

use alloy_primitives::U256;

use crate::error::DecodeError;
use crate::pointer::slot::{Slot, SlotRange};
use crate::pointer::WORD_BYTES;
use crate::types::{DataType, TypeId};

/// Storage footprint of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StorageSize {
    /// The type always starts a fresh slot and spans this many whole words.
    Words(u64),
    /// The type occupies this many bytes and may share a word with
    /// neighbouring values.
    Bytes(u8),
}

impl StorageSize {
    /// Whole words consumed when the value starts a fresh slot.
    #[must_use]
    pub const fn word_span(self) -> u64 {
        match self {
            Self::Words(words) => words,
            Self::Bytes(_) => 1,
        }
    }
}

/// One struct member as laid out in call/event data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CallMember {
    /// Declared field name.
    pub name: String,
    /// Field type.
    pub ty: DataType,
    /// Byte offset of the field's head entry from the struct's start.
    pub offset: usize,
}

/// Flat-region layout of a struct.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CallLayout {
    /// Total size of the head block when the struct is embedded statically.
    pub head_bytes: usize,
    /// True when any member's encoded size is data-dependent.
    pub dynamic: bool,
    /// Members in declaration order.
    pub members: Vec<CallMember>,
}

/// One struct member as laid out in storage.
///
/// The range is relative: its slots are rootless and count words from the
/// struct's first slot. [`SlotRange::rebased_onto`] anchors it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct StorageMember {
    /// Declared field name.
    pub name: String,
    /// Field type.
    pub ty: DataType,
    /// Relative slot range assigned by the allocation pass.
    pub range: SlotRange,
}

/// Storage layout of a struct.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct StorageLayout {
    /// Whole words the struct spans.
    pub words: u64,
    /// Members in declaration order.
    pub members: Vec<StorageMember>,
}

/// Complete layout of a user-defined struct in both region families.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct StructDef {
    /// Declared struct name.
    pub name: String,
    /// Layout used for calldata and event data.
    pub call: CallLayout,
    /// Layout used for contract storage.
    pub storage: StorageLayout,
}

/// Definition of a user-defined enum.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EnumDef {
    /// Declared enum name.
    pub name: String,
    /// Variant names in ordinal order.
    pub variants: Vec<String>,
}

impl EnumDef {
    /// Number of declared variants.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Variant name for an ordinal, if one is declared.
    #[must_use]
    pub fn variant_name(&self, ordinal: u64) -> Option<&str> {
        let index = usize::try_from(ordinal).ok()?;
        self.variants.get(index).map(String::as_str)
    }

    /// Bytes needed in storage to distinguish every variant.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // at most 8 bytes for any usize ordinal
    pub fn storage_bytes(&self) -> u8 {
        let count = self.variants.len();
        if count <= 1 {
            return 1;
        }
        let bits = usize::BITS - (count - 1).leading_zeros();
        bits.div_ceil(8) as u8
    }
}

/// Read-only lookup tables for every user-defined type reachable from the
/// roots being decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AllocationTables {
    /// Struct layouts keyed by type id.
    pub structs: BTreeMap<TypeId, StructDef>,
    /// Enum definitions keyed by type id.
    pub enums: BTreeMap<TypeId, EnumDef>,
}

impl AllocationTables {
    /// Looks up a struct layout.
    ///
    /// # Errors
    /// [`DecodeError::UserDefinedTypeNotFound`] when the id has no entry.
    pub fn struct_def(&self, id: TypeId) -> Result<&StructDef, DecodeError> {
        self.structs
            .get(&id)
            .ok_or(DecodeError::UserDefinedTypeNotFound { type_id: id })
    }

    /// Looks up an enum definition.
    ///
    /// # Errors
    /// [`DecodeError::UserDefinedTypeNotFound`] when the id has no entry.
    pub fn enum_def(&self, id: TypeId) -> Result<&EnumDef, DecodeError> {
        self.enums
            .get(&id)
            .ok_or(DecodeError::UserDefinedTypeNotFound { type_id: id })
    }

    /// Whether a type's flat encoding is dynamically sized.
    ///
    /// # Errors
    /// Lookup misses propagate; mappings are unsupported in flat regions.
    pub fn is_dynamic(&self, ty: &DataType) -> Result<bool, DecodeError> {
        match ty {
            DataType::Elementary(elementary) => Ok(elementary.is_dynamic()),
            DataType::Array { length: None, .. } => Ok(true),
            DataType::Array {
                element,
                length: Some(_),
            } => self.is_dynamic(element),
            DataType::Struct(id) => Ok(self.struct_def(*id)?.call.dynamic),
            DataType::Enum(_) | DataType::Contract => Ok(false),
            DataType::Tuple(members) => {
                for member in members {
                    if self.is_dynamic(member)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            DataType::Mapping { .. } => Err(DecodeError::UnsupportedType { ty: ty.clone() }),
        }
    }

    /// Size in bytes of a type's entry in a flat head block: one word for
    /// scalars and for anything dynamic (an offset word), the full inline
    /// size for static composites.
    ///
    /// # Errors
    /// Lookup misses propagate; sizes that overflow the address space are
    /// reported, not wrapped.
    pub fn head_size(&self, ty: &DataType) -> Result<usize, DecodeError> {
        if self.is_dynamic(ty)? {
            return Ok(WORD_BYTES);
        }
        match ty {
            DataType::Elementary(_) | DataType::Enum(_) | DataType::Contract => Ok(WORD_BYTES),
            DataType::Array {
                element,
                length: Some(length),
            } => {
                let count = usize::try_from(*length).map_err(|_| {
                    DecodeError::OverlongArrayOrString {
                        declared: U256::from(*length),
                    }
                })?;
                self.head_size(element)?.checked_mul(count).ok_or_else(|| {
                    DecodeError::OverlongArrayOrString {
                        declared: U256::from(*length),
                    }
                })
            }
            DataType::Struct(id) => Ok(self.struct_def(*id)?.call.head_bytes),
            DataType::Tuple(members) => {
                let mut total = 0usize;
                for member in members {
                    total = total.checked_add(self.head_size(member)?).ok_or_else(|| {
                        DecodeError::OverlargePointer {
                            pointer: U256::from(total),
                        }
                    })?;
                }
                Ok(total)
            }
            // already rejected or classified dynamic by the check above
            DataType::Array { length: None, .. } | DataType::Mapping { .. } => {
                Err(DecodeError::UnsupportedType { ty: ty.clone() })
            }
        }
    }

    /// Storage footprint of a type.
    ///
    /// # Errors
    /// Lookup misses propagate; anonymous tuples have no storage form.
    pub fn storage_size(&self, ty: &DataType) -> Result<StorageSize, DecodeError> {
        match ty {
            DataType::Elementary(elementary) => Ok(match elementary.byte_width() {
                Some(32) | None => StorageSize::Words(1),
                Some(width) => StorageSize::Bytes(width),
            }),
            DataType::Array { length: None, .. } | DataType::Mapping { .. } => {
                Ok(StorageSize::Words(1))
            }
            DataType::Array {
                element,
                length: Some(length),
            } => {
                let words = match self.storage_size(element)? {
                    StorageSize::Bytes(bytes) => {
                        let per_word = u64::from(32 / bytes);
                        length.div_ceil(per_word)
                    }
                    StorageSize::Words(words) => {
                        length.checked_mul(words).ok_or_else(|| {
                            DecodeError::OverlongArrayOrString {
                                declared: U256::from(*length),
                            }
                        })?
                    }
                };
                Ok(StorageSize::Words(words))
            }
            DataType::Struct(id) => Ok(StorageSize::Words(self.struct_def(*id)?.storage.words)),
            DataType::Enum(id) => Ok(StorageSize::Bytes(self.enum_def(*id)?.storage_bytes())),
            DataType::Contract => Ok(StorageSize::Bytes(20)),
            DataType::Tuple(_) => Err(DecodeError::UnsupportedType { ty: ty.clone() }),
        }
    }

    /// Storage range a value of `ty` occupies when it starts at `slot`:
    /// whole words for word-granular types, the low bytes of that slot for
    /// packable ones.
    ///
    /// # Errors
    /// Propagates [`Self::storage_size`] failures.
    pub fn whole_range_at(&self, slot: Slot, ty: &DataType) -> Result<SlotRange, DecodeError> {
        Ok(match self.storage_size(ty)? {
            StorageSize::Words(words) => SlotRange::whole_words(slot, words),
            StorageSize::Bytes(bytes) => SlotRange::low_bytes(slot, bytes),
        })
    }
}
