//! Flat-buffer decode strategy for calldata and event data.
//!
//! Values live in a head block of fixed-size entries. A static value is
//! its own head entry; a dynamic value's entry is one offset word pointing
//! at its body, measured from the base of the enclosing argument or
//! element list. Every nesting level that starts a new list re-derives the
//! base, so offsets are never relative to the absolute buffer start.

use alloy_primitives::{B256, U256};

use super::{elementary, DecodeContext, Step};
use crate::error::DecodeError;
use crate::pointer::{DataRegion, FlatPointer, WORD_BYTES};
use crate::types::{DataType, ElementaryType, TypeId};
use crate::value::{Decoded, ElementaryValue, StringData, TypedValue};

fn read_slice<'a>(
    cx: &DecodeContext<'a>,
    region: DataRegion,
    offset: usize,
    length: usize,
) -> Result<&'a [u8], DecodeError> {
    let data = cx.state.region_bytes(region);
    let end = offset
        .checked_add(length)
        .ok_or_else(|| DecodeError::OverlargePointer {
            pointer: U256::from(offset),
        })?;
    if end > data.len() {
        return Err(DecodeError::OutOfBoundsRead {
            offset,
            length,
            available: data.len(),
        });
    }
    Ok(&data[offset..end])
}

fn read_word(
    cx: &DecodeContext<'_>,
    region: DataRegion,
    offset: usize,
) -> Result<B256, DecodeError> {
    Ok(B256::from_slice(read_slice(cx, region, offset, WORD_BYTES)?))
}

/// Reads an offset word and resolves it relative to `base`.
fn indirect(
    cx: &DecodeContext<'_>,
    pointer: &FlatPointer,
    base: usize,
) -> Result<usize, DecodeError> {
    let word = read_word(cx, pointer.region, pointer.start)?;
    let value = U256::from_be_bytes(word.0);
    let relative = usize::try_from(value).map_err(|_| DecodeError::OverlargePointer {
        pointer: value,
    })?;
    base.checked_add(relative)
        .ok_or(DecodeError::OverlargePointer { pointer: value })
}

/// Decodes `ty` at `pointer`, resolving offset words relative to `base`.
pub(crate) fn decode_flat(
    cx: &mut DecodeContext<'_>,
    ty: &DataType,
    pointer: &FlatPointer,
    base: usize,
) -> Step<Decoded> {
    match ty {
        DataType::Elementary(elementary_ty) if elementary_ty.is_dynamic() => {
            decode_blob(cx, *elementary_ty, pointer, base)
        }
        DataType::Elementary(elementary_ty) => {
            let word = match read_word(cx, pointer.region, pointer.start) {
                Ok(word) => word,
                Err(err) => return cx.fail(err),
            };
            match elementary::decode_word(*elementary_ty, word, cx.mode) {
                Ok(value) => Ok(value.into()),
                Err(err) => cx.fail(err),
            }
        }
        DataType::Enum(id) => decode_enum(cx, *id, pointer),
        DataType::Contract => {
            let word = match read_word(cx, pointer.region, pointer.start) {
                Ok(word) => word,
                Err(err) => return cx.fail(err),
            };
            match elementary::decode_address(word, cx.mode) {
                Ok(account) => super::decode_contract(cx, account),
                Err(err) => cx.fail(err),
            }
        }
        DataType::Array { element, length } => {
            decode_array(cx, ty, element, *length, pointer, base)
        }
        DataType::Struct(id) => decode_struct(cx, *id, pointer, base),
        DataType::Tuple(members) => decode_tuple(cx, ty, members, pointer, base),
        DataType::Mapping { .. } => cx.fail(DecodeError::UnsupportedType { ty: ty.clone() }),
    }
}

/// Length-prefixed `bytes`/`string` body behind an offset word.
fn decode_blob(
    cx: &mut DecodeContext<'_>,
    ty: ElementaryType,
    pointer: &FlatPointer,
    base: usize,
) -> Step<Decoded> {
    let target = match indirect(cx, pointer, base) {
        Ok(target) => target,
        Err(err) => return cx.fail(err),
    };
    let length_word = match read_word(cx, pointer.region, target) {
        Ok(word) => word,
        Err(err) => return cx.fail(err),
    };
    let declared = U256::from_be_bytes(length_word.0);
    let Ok(length) = usize::try_from(declared) else {
        return cx.fail(DecodeError::OverlongArrayOrString { declared });
    };
    // crude guard: the region may itself still be incomplete, so this
    // bounds the claim against whatever is currently known
    if cx.mode.is_strict() && length > cx.state.region_bytes(pointer.region).len() {
        return cx.fail(DecodeError::OverlongArrayOrString { declared });
    }
    let Some(content_start) = target.checked_add(WORD_BYTES) else {
        return cx.fail(DecodeError::OverlargePointer {
            pointer: U256::from(target),
        });
    };
    let content = match read_slice(cx, pointer.region, content_start, length) {
        Ok(content) => content.to_vec(),
        Err(err) => return cx.fail(err),
    };
    let value = if matches!(ty, ElementaryType::Bytes) {
        ElementaryValue::Bytes(content.into())
    } else {
        ElementaryValue::String(StringData::from_raw(content))
    };
    Ok(value.into())
}

fn decode_enum(cx: &mut DecodeContext<'_>, id: TypeId, pointer: &FlatPointer) -> Step<Decoded> {
    let def = match cx.tables.enum_def(id) {
        Ok(def) => def,
        Err(err) => return cx.fail(err),
    };
    let word = match read_word(cx, pointer.region, pointer.start) {
        Ok(word) => word,
        Err(err) => return cx.fail(err),
    };
    // the whole word is the ordinal, so stray high bytes fail the range
    // check; permissive mode masks down to the enum's declared width
    let value = if cx.mode.is_permissive() {
        let width = usize::from(def.storage_bytes());
        U256::from_be_slice(&word[32 - width..])
    } else {
        U256::from_be_bytes(word.0)
    };
    let ordinal = u64::try_from(value).unwrap_or(u64::MAX);
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

#[allow(clippy::too_many_lines)]
fn decode_array(
    cx: &mut DecodeContext<'_>,
    ty: &DataType,
    element: &DataType,
    length: Option<u64>,
    pointer: &FlatPointer,
    base: usize,
) -> Step<Decoded> {
    let element_dynamic = match cx.tables.is_dynamic(element) {
        Ok(dynamic) => dynamic,
        Err(err) => return cx.fail(err),
    };
    let dynamic = length.is_none() || element_dynamic;

    let (count, elements_start) = if dynamic {
        let target = match indirect(cx, pointer, base) {
            Ok(target) => target,
            Err(err) => return cx.fail(err),
        };
        if let Some(static_count) = length {
            let Ok(count) = usize::try_from(static_count) else {
                return cx.fail(DecodeError::OverlongArrayOrString {
                    declared: U256::from(static_count),
                });
            };
            (count, target)
        } else {
            let length_word = match read_word(cx, pointer.region, target) {
                Ok(word) => word,
                Err(err) => return cx.fail(err),
            };
            let declared = U256::from_be_bytes(length_word.0);
            let Ok(count) = usize::try_from(declared) else {
                return cx.fail(DecodeError::OverlongArrayOrString { declared });
            };
            let Some(elements_start) = target.checked_add(WORD_BYTES) else {
                return cx.fail(DecodeError::OverlargePointer {
                    pointer: U256::from(target),
                });
            };
            (count, elements_start)
        }
    } else if let Some(static_count) = length {
        let Ok(count) = usize::try_from(static_count) else {
            return cx.fail(DecodeError::OverlongArrayOrString {
                declared: U256::from(static_count),
            });
        };
        (count, pointer.start)
    } else {
        // a length-less array is always classified dynamic above
        return cx.fail(DecodeError::UnsupportedType { ty: ty.clone() });
    };

    let element_head = match cx.tables.head_size(element) {
        Ok(head) => head,
        Err(err) => return cx.fail(err),
    };
    if cx.mode.is_strict() {
        let known = cx.state.region_bytes(pointer.region).len();
        let backed = count
            .checked_mul(element_head)
            .is_some_and(|bytes| bytes <= known);
        if !backed {
            return cx.fail(DecodeError::OverlongArrayOrString {
                declared: U256::from(count),
            });
        }
    }

    let mut children = Vec::new();
    for index in 0..count {
        let element_start = index
            .checked_mul(element_head)
            .and_then(|delta| elements_start.checked_add(delta));
        let child = match element_start {
            Some(start) => {
                let element_pointer = FlatPointer::new(pointer.region, start, element_head);
                decode_flat(cx, element, &element_pointer, elements_start)?
            }
            None => {
                let wide = U256::from(index) * U256::from(element_head)
                    + U256::from(elements_start);
                cx.fail(DecodeError::OverlargePointer { pointer: wide })?
            }
        };
        children.push(child);
    }
    Ok(Decoded::Value(TypedValue::Array(children)))
}

fn decode_struct(
    cx: &mut DecodeContext<'_>,
    id: TypeId,
    pointer: &FlatPointer,
    base: usize,
) -> Step<Decoded> {
    let def = match cx.tables.struct_def(id) {
        Ok(def) => def,
        Err(err) => return cx.fail(err),
    };
    let members_start = if def.call.dynamic {
        match indirect(cx, pointer, base) {
            Ok(target) => target,
            Err(err) => return cx.fail(err),
        }
    } else {
        pointer.start
    };

    let mut fields = Vec::with_capacity(def.call.members.len());
    for member in &def.call.members {
        let located = cx.tables.head_size(&member.ty).and_then(|head| {
            members_start
                .checked_add(member.offset)
                .map(|start| FlatPointer::new(pointer.region, start, head))
                .ok_or_else(|| DecodeError::OverlargePointer {
                    pointer: U256::from(member.offset),
                })
        });
        let decoded = match located {
            Ok(member_pointer) => decode_flat(cx, &member.ty, &member_pointer, members_start)?,
            Err(err) => cx.fail(err)?,
        };
        fields.push((member.name.clone(), decoded));
    }
    Ok(Decoded::Value(TypedValue::Struct {
        type_id: id,
        fields,
    }))
}

fn decode_tuple(
    cx: &mut DecodeContext<'_>,
    ty: &DataType,
    members: &[DataType],
    pointer: &FlatPointer,
    base: usize,
) -> Step<Decoded> {
    let dynamic = match cx.tables.is_dynamic(ty) {
        Ok(dynamic) => dynamic,
        Err(err) => return cx.fail(err),
    };
    let members_start = if dynamic {
        match indirect(cx, pointer, base) {
            Ok(target) => target,
            Err(err) => return cx.fail(err),
        }
    } else {
        pointer.start
    };

    let mut children = Vec::with_capacity(members.len());
    let mut offset = 0usize;
    for member in members {
        // a head-size miss makes every later offset unknowable, so the
        // whole tuple fails rather than corrupting its siblings
        let head = match cx.tables.head_size(member) {
            Ok(head) => head,
            Err(err) => return cx.fail(err),
        };
        let Some(start) = members_start.checked_add(offset) else {
            return cx.fail(DecodeError::OverlargePointer {
                pointer: U256::from(offset),
            });
        };
        let member_pointer = FlatPointer::new(pointer.region, start, head);
        children.push(decode_flat(cx, member, &member_pointer, members_start)?);
        let Some(next) = offset.checked_add(head) else {
            return cx.fail(DecodeError::OverlargePointer {
                pointer: U256::from(offset),
            });
        };
        offset = next;
    }
    Ok(Decoded::Value(TypedValue::Tuple(children)))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use alloy_primitives::{B256, U256};

    use super::{decode_flat, indirect, read_slice};
    use crate::allocation::AllocationTables;
    use crate::decode::{DecodeContext, DecodeMode, Interrupt, Step};
    use crate::error::DecodeError;
    use crate::pointer::slot::SlotResolver;
    use crate::pointer::{DataRegion, FlatPointer};
    use crate::state::EvmState;
    use crate::types::{DataType, ElementaryType};
    use crate::value::{Decoded, ElementaryValue, TypedValue};

    fn decode_calldata(ty: &DataType, data: &[u8], start: usize, mode: DecodeMode) -> Step<Decoded> {
        let tables = AllocationTables::default();
        let state = EvmState {
            calldata: data.to_vec().into(),
            ..EvmState::default()
        };
        let mut resolver = SlotResolver::new();
        let words = BTreeMap::new();
        let code = BTreeMap::new();
        let mut cx = DecodeContext {
            tables: &tables,
            state: &state,
            observations: &[],
            mode,
            resolver: &mut resolver,
            fetched_words: &words,
            fetched_code: &code,
        };
        let pointer = FlatPointer::new(DataRegion::Calldata, start, data.len());
        decode_flat(&mut cx, ty, &pointer, start)
    }

    fn words(list: &[B256]) -> Vec<u8> {
        list.iter().flat_map(|word| word.to_vec()).collect()
    }

    #[test]
    fn truncated_reads_embed_bounds_errors_in_normal_mode() {
        let step = decode_calldata(&DataType::uint256(), &[0u8; 16], 0, DecodeMode::Normal);
        assert_eq!(
            step.unwrap(),
            Decoded::Error(DecodeError::OutOfBoundsRead {
                offset: 0,
                length: 32,
                available: 16,
            })
        );
    }

    #[test]
    fn truncated_reads_abort_in_strict_mode() {
        let step = decode_calldata(&DataType::uint256(), &[0u8; 16], 0, DecodeMode::Strict);
        assert_eq!(
            step.unwrap_err(),
            Interrupt::Abort(DecodeError::OutOfBoundsRead {
                offset: 0,
                length: 32,
                available: 16,
            })
        );
    }

    #[test]
    fn offset_words_resolve_relative_to_the_base() {
        let data = words(&[B256::with_last_byte(64)]);
        let tables = AllocationTables::default();
        let state = EvmState {
            calldata: data.into(),
            ..EvmState::default()
        };
        let mut resolver = SlotResolver::new();
        let fetched_words = BTreeMap::new();
        let fetched_code = BTreeMap::new();
        let cx = DecodeContext {
            tables: &tables,
            state: &state,
            observations: &[],
            mode: DecodeMode::Normal,
            resolver: &mut resolver,
            fetched_words: &fetched_words,
            fetched_code: &fetched_code,
        };
        let pointer = FlatPointer::new(DataRegion::Calldata, 0, 32);
        assert_eq!(indirect(&cx, &pointer, 100).unwrap(), 164);

        let huge = B256::from(U256::MAX);
        let state = EvmState {
            calldata: words(&[huge]).into(),
            ..EvmState::default()
        };
        let cx = DecodeContext {
            tables: &tables,
            state: &state,
            observations: &[],
            mode: DecodeMode::Normal,
            resolver: &mut resolver,
            fetched_words: &fetched_words,
            fetched_code: &fetched_code,
        };
        assert_eq!(
            indirect(&cx, &pointer, 0).unwrap_err(),
            DecodeError::OverlargePointer { pointer: U256::MAX }
        );
    }

    #[test]
    fn slices_past_the_region_end_are_rejected() {
        let tables = AllocationTables::default();
        let state = EvmState {
            calldata: vec![0u8; 40].into(),
            ..EvmState::default()
        };
        let mut resolver = SlotResolver::new();
        let fetched_words = BTreeMap::new();
        let fetched_code = BTreeMap::new();
        let cx = DecodeContext {
            tables: &tables,
            state: &state,
            observations: &[],
            mode: DecodeMode::Normal,
            resolver: &mut resolver,
            fetched_words: &fetched_words,
            fetched_code: &fetched_code,
        };
        assert!(read_slice(&cx, DataRegion::Calldata, 8, 32).is_ok());
        assert_eq!(
            read_slice(&cx, DataRegion::Calldata, 9, 32).unwrap_err(),
            DecodeError::OutOfBoundsRead {
                offset: 9,
                length: 32,
                available: 40,
            }
        );
    }

    #[test]
    fn static_arrays_read_elements_in_place() {
        let data = words(&[B256::with_last_byte(7), B256::with_last_byte(9)]);
        let ty = DataType::static_array(DataType::uint256(), 2);
        let step = decode_calldata(&ty, &data, 0, DecodeMode::Strict).unwrap();
        let Decoded::Value(TypedValue::Array(children)) = step else {
            panic!("expected an array value");
        };
        assert_eq!(
            children,
            vec![
                ElementaryValue::Uint(U256::from(7u8)).into(),
                ElementaryValue::Uint(U256::from(9u8)).into(),
            ]
        );
    }

    #[test]
    fn bad_element_padding_spares_its_siblings() {
        let mut dirty = B256::with_last_byte(1);
        dirty[0] = 0xff;
        let data = words(&[dirty, B256::with_last_byte(3)]);
        let ty = DataType::static_array(
            DataType::Elementary(ElementaryType::Uint { bits: 8 }),
            2,
        );

        let step = decode_calldata(&ty, &data, 0, DecodeMode::Normal).unwrap();
        let Decoded::Value(TypedValue::Array(children)) = step else {
            panic!("expected an array value");
        };
        assert_eq!(
            children[0],
            Decoded::Error(DecodeError::BadPadding {
                ty: ElementaryType::Uint { bits: 8 },
            })
        );
        assert_eq!(
            children[1],
            ElementaryValue::Uint(U256::from(3u8)).into()
        );
    }
}
