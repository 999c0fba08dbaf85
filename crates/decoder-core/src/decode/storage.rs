//! Slot-addressed decode strategy for contract storage.
//!
//! Storage has no offset words. A value's location is a [`SlotRange`]
//! derived from the layout tables: either whole words starting at a slot
//! or a byte lane packed into one word. Dynamic payloads hang off a
//! keccak-derived child of their declaring slot, so reads here can
//! suspend whenever a word is absent from the snapshot.

use alloy_primitives::{Address, U256};

use super::{elementary, DecodeContext, Step};
use crate::allocation::StorageSize;
use crate::error::DecodeError;
use crate::pointer::slot::{Slot, SlotPosition, SlotRange};
use crate::pointer::WORD_BYTES;
use crate::types::{DataType, ElementaryType, TypeId};
use crate::value::{Decoded, ElementaryValue, StringData, TypedValue};

/// Reads the raw bytes a range covers. The outer error channel carries
/// suspensions; data faults come back on the inner `Result` so the caller
/// can route them through the failure policy.
fn read_range(
    cx: &mut DecodeContext<'_>,
    range: &SlotRange,
) -> Step<Result<Vec<u8>, DecodeError>> {
    match range {
        SlotRange::Packed { from, length } => {
            let start = usize::from(from.index);
            let length = usize::from(*length);
            let end = start + length;
            if end > WORD_BYTES {
                return Ok(Err(DecodeError::OutOfBoundsRead {
                    offset: start,
                    length,
                    available: WORD_BYTES,
                }));
            }
            let word = cx.storage_word(&from.slot)?;
            Ok(Ok(word[start..end].to_vec()))
        }
        SlotRange::Span { from, to } => {
            let span = to
                .slot
                .offset
                .wrapping_sub(from.slot.offset)
                .wrapping_add(U256::ONE);
            let Ok(words) = usize::try_from(span) else {
                return Ok(Err(DecodeError::OverlongArrayOrString { declared: span }));
            };
            let mut bytes = Vec::new();
            for index in 0..words {
                let slot = from.slot.offset_by(U256::from(index));
                let word = cx.storage_word(&slot)?;
                bytes.extend_from_slice(word.as_slice());
            }
            let end = bytes
                .len()
                .saturating_sub((WORD_BYTES - 1).saturating_sub(usize::from(to.index)));
            bytes.truncate(end);
            bytes.drain(..usize::from(from.index).min(end));
            Ok(Ok(bytes))
        }
    }
}

/// Decodes `ty` from the storage range the layout assigned it.
pub(crate) fn decode_storage(
    cx: &mut DecodeContext<'_>,
    ty: &DataType,
    range: &SlotRange,
) -> Step<Decoded> {
    match ty {
        DataType::Elementary(elementary_ty) if elementary_ty.is_dynamic() => {
            decode_blob(cx, *elementary_ty, range.base_slot().clone())
        }
        DataType::Elementary(elementary_ty) => {
            let bytes = match read_range(cx, range)? {
                Ok(bytes) => bytes,
                Err(err) => return cx.fail(err),
            };
            match elementary::decode_exact(*elementary_ty, &bytes, cx.mode) {
                Ok(value) => Ok(value.into()),
                Err(err) => cx.fail(err),
            }
        }
        DataType::Enum(id) => decode_enum(cx, *id, range),
        DataType::Contract => {
            let bytes = match read_range(cx, range)? {
                Ok(bytes) => bytes,
                Err(err) => return cx.fail(err),
            };
            if bytes.len() != 20 {
                return cx.fail(DecodeError::OutOfBoundsRead {
                    offset: 0,
                    length: 20,
                    available: bytes.len(),
                });
            }
            super::decode_contract(cx, Address::from_slice(&bytes))
        }
        DataType::Array { element, length } => decode_array(cx, element, *length, range),
        DataType::Struct(id) => decode_struct(cx, *id, range),
        DataType::Mapping { value, .. } => decode_mapping(cx, value, range),
        DataType::Tuple(_) => cx.fail(DecodeError::UnsupportedType { ty: ty.clone() }),
    }
}

/// `bytes`/`string` in storage use the length marker encoding: an even low
/// byte means the content shares the word, an odd one means the word holds
/// `2 * length + 1` and the content starts at the hashed child.
fn decode_blob(cx: &mut DecodeContext<'_>, ty: ElementaryType, slot: Slot) -> Step<Decoded> {
    let word = cx.storage_word(&slot)?;
    let marker = word[31];
    let content = if marker % 2 == 0 {
        let length = usize::from(marker / 2);
        if length > WORD_BYTES - 1 {
            // short form cannot spill into the length byte
            return cx.fail(DecodeError::OverlongArrayOrString {
                declared: U256::from(marker / 2),
            });
        }
        word[..length].to_vec()
    } else {
        let declared = (U256::from_be_bytes(word.0) - U256::ONE) / U256::from(2u8);
        let Ok(length) = usize::try_from(declared) else {
            return cx.fail(DecodeError::OverlongArrayOrString { declared });
        };
        let content_base = Slot::hashed_child(slot, U256::ZERO);
        let mut bytes = Vec::new();
        for index in 0..length.div_ceil(WORD_BYTES) {
            let content_slot = content_base.offset_by(U256::from(index));
            let word = cx.storage_word(&content_slot)?;
            bytes.extend_from_slice(word.as_slice());
        }
        bytes.truncate(length);
        bytes
    };
    let value = if matches!(ty, ElementaryType::Bytes) {
        ElementaryValue::Bytes(content.into())
    } else {
        ElementaryValue::String(StringData::from_raw(content))
    };
    Ok(value.into())
}

fn decode_enum(cx: &mut DecodeContext<'_>, id: TypeId, range: &SlotRange) -> Step<Decoded> {
    let def = match cx.tables.enum_def(id) {
        Ok(def) => def,
        Err(err) => return cx.fail(err),
    };
    let bytes = match read_range(cx, range)? {
        Ok(bytes) => bytes,
        Err(err) => return cx.fail(err),
    };
    // packed ranges are already exact, so there is no padding to police
    let ordinal = u64::try_from(U256::from_be_slice(&bytes)).unwrap_or(u64::MAX);
    match def.variant_name(ordinal) {
        Some(variant) => Ok(Decoded::Value(TypedValue::Enum {
            type_id: id,
            variant: variant.to_owned(),
            ordinal,
        })),
        None => cx.fail(DecodeError::EnumOutOfRange {
            type_id: id,
            ordinal,
            variant_count: def.variant_count() as u64,
        }),
    }
}

fn decode_array(
    cx: &mut DecodeContext<'_>,
    element: &DataType,
    length: Option<u64>,
    range: &SlotRange,
) -> Step<Decoded> {
    let base = range.base_slot();
    let (count, content_base) = if let Some(static_count) = length {
        let Ok(count) = usize::try_from(static_count) else {
            return cx.fail(DecodeError::OverlongArrayOrString {
                declared: U256::from(static_count),
            });
        };
        // static arrays lay their elements out from the declaring slot
        (count, base.clone())
    } else {
        let count_word = cx.storage_word(base)?;
        let declared = U256::from_be_bytes(count_word.0);
        let Ok(count) = usize::try_from(declared) else {
            return cx.fail(DecodeError::OverlongArrayOrString { declared });
        };
        (count, Slot::hashed_child(base.clone(), U256::ZERO))
    };

    let size = match cx.tables.storage_size(element) {
        Ok(size) => size,
        Err(err) => return cx.fail(err),
    };
    let mut children = Vec::new();
    for index in 0..count {
        let child_range = match size {
            StorageSize::Words(words) => {
                let slot = content_base.offset_by(U256::from(index) * U256::from(words));
                SlotRange::whole_words(slot, words)
            }
            StorageSize::Bytes(width) => SlotRange::Packed {
                from: SlotPosition::packed_element(&content_base, width, index as u64),
                length: width,
            },
        };
        children.push(decode_storage(cx, element, &child_range)?);
    }
    Ok(Decoded::Value(TypedValue::Array(children)))
}

fn decode_struct(cx: &mut DecodeContext<'_>, id: TypeId, range: &SlotRange) -> Step<Decoded> {
    let def = match cx.tables.struct_def(id) {
        Ok(def) => def,
        Err(err) => return cx.fail(err),
    };
    let base = range.base_slot();
    let mut fields = Vec::with_capacity(def.storage.members.len());
    for member in &def.storage.members {
        // member ranges are stored relative to slot zero
        let member_range = member.range.rebased_onto(base);
        let decoded = decode_storage(cx, &member.ty, &member_range)?;
        fields.push((member.name.clone(), decoded));
    }
    Ok(Decoded::Value(TypedValue::Struct {
        type_id: id,
        fields,
    }))
}

/// Mappings cannot be enumerated from storage alone, so entries come from
/// the keys the caller observed. An observation contributes an entry when
/// its path resolves to the same address as this mapping's own slot.
fn decode_mapping(
    cx: &mut DecodeContext<'_>,
    value_ty: &DataType,
    range: &SlotRange,
) -> Step<Decoded> {
    let base = range.base_slot().clone();
    let base_address = cx.resolver.resolve(&base);
    let observations = cx.observations;
    let mut entries = Vec::new();
    for observation in observations {
        if cx.resolver.resolve(&observation.path) != base_address {
            continue;
        }
        let entry_slot = Slot::mapping_entry(base.clone(), observation.key.clone());
        let decoded = match cx.tables.whole_range_at(entry_slot, value_ty) {
            Ok(value_range) => decode_storage(cx, value_ty, &value_range)?,
            Err(err) => cx.fail(err)?,
        };
        entries.push((observation.key.clone(), decoded));
    }
    Ok(Decoded::Value(TypedValue::Mapping { entries }))
}
