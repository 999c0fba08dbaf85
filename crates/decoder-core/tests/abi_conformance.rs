//! Calldata and event data conformance coverage.

use alloy_primitives::{B256, I256, U256};
use proptest::prelude::*;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

use decoder_core::{
    AllocationTables, CallLayout, CallMember, DataType, DecodeError, DecodeMachine, DecodeMode,
    DecodeProgress, DecodeSession, Decoded, ElementaryType, ElementaryValue, EnumDef, EvmState,
    Pointer, StorageLayout, StringData, StructDef, TypeId, TypedValue,
};

fn word(value: u64) -> B256 {
    B256::from(U256::from(value))
}

fn calldata_bytes(words: &[B256]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_vec()).collect()
}

fn decode_calldata(
    tables: &AllocationTables,
    ty: DataType,
    data: &[u8],
    start: usize,
    mode: DecodeMode,
) -> DecodeProgress {
    let state = EvmState {
        calldata: data.to_vec().into(),
        ..EvmState::default()
    };
    let session = DecodeSession {
        tables,
        state: &state,
        observations: &[],
    };
    let pointer = Pointer::calldata(start, data.len().saturating_sub(start));
    DecodeMachine::new(session, ty, pointer, mode).advance()
}

fn finished(progress: DecodeProgress) -> Decoded {
    match progress {
        DecodeProgress::Finished(decoded) => decoded,
        other => panic!("expected a finished decode, got {other:?}"),
    }
}

fn aborted(progress: DecodeProgress) -> DecodeError {
    match progress {
        DecodeProgress::Aborted(err) => err,
        other => panic!("expected an aborted decode, got {other:?}"),
    }
}

#[test]
fn uint256_argument_after_the_selector_decodes_to_one() {
    let mut data = vec![0xab, 0x12, 0x34, 0x56];
    data.extend_from_slice(word(1).as_slice());

    for mode in [DecodeMode::Normal, DecodeMode::Strict, DecodeMode::Permissive] {
        let tables = AllocationTables::default();
        let decoded = finished(decode_calldata(&tables, DataType::uint256(), &data, 4, mode));
        assert_eq!(decoded, ElementaryValue::Uint(U256::ONE).into());
    }
}

#[test]
fn offset_string_decodes_to_hello() {
    let mut padded = B256::ZERO;
    padded[..5].copy_from_slice(b"hello");
    let data = calldata_bytes(&[word(32), word(5), padded]);

    for mode in [DecodeMode::Normal, DecodeMode::Strict, DecodeMode::Permissive] {
        let tables = AllocationTables::default();
        let decoded = finished(decode_calldata(
            &tables,
            DataType::Elementary(ElementaryType::String),
            &data,
            0,
            mode,
        ));
        assert_eq!(
            decoded,
            ElementaryValue::String(StringData::Utf8("hello".to_owned())).into()
        );
    }
}

#[test]
fn unrepresentable_length_aborts_strict_and_embeds_one_error_node() {
    let declared = U256::ONE << 64;
    let length_word = B256::from(declared);
    let data = calldata_bytes(&[word(32), length_word]);
    let ty = DataType::dynamic_array(DataType::uint256());
    let tables = AllocationTables::default();

    assert_eq!(
        aborted(decode_calldata(
            &tables,
            ty.clone(),
            &data,
            0,
            DecodeMode::Strict
        )),
        DecodeError::OverlongArrayOrString { declared }
    );
    // the array position holds exactly one error node, not a partial array
    assert_eq!(
        finished(decode_calldata(&tables, ty, &data, 0, DecodeMode::Normal)),
        Decoded::Error(DecodeError::OverlongArrayOrString { declared })
    );
}

#[test]
fn nested_dynamic_arrays_rebase_offsets_per_level() {
    // outer body at 32; element offsets are relative to the position
    // right after the outer length word
    let data = calldata_bytes(&[
        word(32),
        word(2),
        word(64),
        word(128),
        word(1),
        word(11),
        word(2),
        word(22),
        word(33),
    ]);
    let ty = DataType::dynamic_array(DataType::dynamic_array(DataType::uint256()));
    let tables = AllocationTables::default();

    let decoded = finished(decode_calldata(&tables, ty, &data, 0, DecodeMode::Strict));
    assert_eq!(
        decoded,
        Decoded::Value(TypedValue::Array(vec![
            Decoded::Value(TypedValue::Array(vec![ElementaryValue::Uint(
                U256::from(11u8)
            )
            .into()])),
            Decoded::Value(TypedValue::Array(vec![
                ElementaryValue::Uint(U256::from(22u8)).into(),
                ElementaryValue::Uint(U256::from(33u8)).into(),
            ])),
        ]))
    );
}

#[test]
fn static_tuples_lay_members_inline() {
    let data = calldata_bytes(&[word(7), word(1)]);
    let ty = DataType::Tuple(vec![
        DataType::uint256(),
        DataType::Elementary(ElementaryType::Bool),
    ]);
    let tables = AllocationTables::default();

    let decoded = finished(decode_calldata(&tables, ty, &data, 0, DecodeMode::Strict));
    assert_eq!(
        decoded,
        Decoded::Value(TypedValue::Tuple(vec![
            ElementaryValue::Uint(U256::from(7u8)).into(),
            ElementaryValue::Bool(true).into(),
        ]))
    );
}

#[test]
fn dynamic_tuples_sit_behind_one_offset() {
    let mut tag = B256::ZERO;
    tag[..3].copy_from_slice(b"abc");
    let data = calldata_bytes(&[word(32), word(99), word(64), word(3), tag]);
    let ty = DataType::Tuple(vec![
        DataType::uint256(),
        DataType::Elementary(ElementaryType::String),
    ]);
    let tables = AllocationTables::default();

    let decoded = finished(decode_calldata(&tables, ty, &data, 0, DecodeMode::Strict));
    assert_eq!(
        decoded,
        Decoded::Value(TypedValue::Tuple(vec![
            ElementaryValue::Uint(U256::from(99u8)).into(),
            ElementaryValue::String(StringData::Utf8("abc".to_owned())).into(),
        ]))
    );
}

fn profile_tables() -> AllocationTables {
    let mut tables = AllocationTables::default();
    tables.structs.insert(
        TypeId(7),
        StructDef {
            name: "Profile".into(),
            call: CallLayout {
                head_bytes: 64,
                dynamic: true,
                members: vec![
                    CallMember {
                        name: "id".into(),
                        ty: DataType::uint256(),
                        offset: 0,
                    },
                    CallMember {
                        name: "tag".into(),
                        ty: DataType::Elementary(ElementaryType::String),
                        offset: 32,
                    },
                ],
            },
            storage: StorageLayout {
                words: 2,
                members: vec![],
            },
        },
    );
    tables.enums.insert(
        TypeId(3),
        EnumDef {
            name: "Phase".into(),
            variants: vec!["Idle".into(), "Armed".into(), "Done".into()],
        },
    );
    tables
}

#[test]
fn dynamic_structs_decode_by_call_layout() {
    let mut tag = B256::ZERO;
    tag[..2].copy_from_slice(b"ok");
    let data = calldata_bytes(&[word(32), word(123), word(64), word(2), tag]);
    let tables = profile_tables();

    let decoded = finished(decode_calldata(
        &tables,
        DataType::Struct(TypeId(7)),
        &data,
        0,
        DecodeMode::Strict,
    ));
    assert_eq!(
        decoded,
        Decoded::Value(TypedValue::Struct {
            type_id: TypeId(7),
            fields: vec![
                ("id".to_owned(), ElementaryValue::Uint(U256::from(123u8)).into()),
                (
                    "tag".to_owned(),
                    ElementaryValue::String(StringData::Utf8("ok".to_owned())).into()
                ),
            ],
        })
    );
}

#[test]
fn enums_check_their_ordinal_against_the_declaration() {
    let tables = profile_tables();
    let ty = DataType::Enum(TypeId(3));

    let decoded = finished(decode_calldata(
        &tables,
        ty.clone(),
        word(1).as_slice(),
        0,
        DecodeMode::Normal,
    ));
    assert_eq!(
        decoded,
        Decoded::Value(TypedValue::Enum {
            type_id: TypeId(3),
            variant: "Armed".to_owned(),
            ordinal: 1,
        })
    );

    let out_of_range = DecodeError::EnumOutOfRange {
        type_id: TypeId(3),
        ordinal: 7,
        variant_count: 3,
    };
    assert_eq!(
        finished(decode_calldata(
            &tables,
            ty.clone(),
            word(7).as_slice(),
            0,
            DecodeMode::Normal
        )),
        Decoded::Error(out_of_range.clone())
    );
    assert_eq!(
        aborted(decode_calldata(
            &tables,
            ty,
            word(7).as_slice(),
            0,
            DecodeMode::Strict
        )),
        out_of_range
    );
}

#[test]
fn unknown_type_ids_surface_retryable_lookup_errors() {
    let tables = AllocationTables::default();
    let decoded = finished(decode_calldata(
        &tables,
        DataType::Struct(TypeId(9)),
        word(0).as_slice(),
        0,
        DecodeMode::Normal,
    ));
    let Decoded::Error(err) = decoded else {
        panic!("lookup miss must decode to an error node");
    };
    assert_eq!(err, DecodeError::UserDefinedTypeNotFound { type_id: TypeId(9) });
    assert!(err.is_retryable());
}

#[test]
fn event_data_decodes_like_calldata() {
    let mut padded = B256::ZERO;
    padded[..5].copy_from_slice(b"hello");
    let state = EvmState {
        event_data: calldata_bytes(&[word(32), word(5), padded]).into(),
        ..EvmState::default()
    };
    let tables = AllocationTables::default();
    let session = DecodeSession {
        tables: &tables,
        state: &state,
        observations: &[],
    };
    let mut machine = DecodeMachine::new(
        session,
        DataType::Elementary(ElementaryType::String),
        Pointer::event_data(0, 96),
        DecodeMode::Strict,
    );
    assert_eq!(
        finished(machine.advance()),
        ElementaryValue::String(StringData::Utf8("hello".to_owned())).into()
    );
}

#[test]
fn element_failures_leave_their_siblings_intact() {
    // count 4 declared, but the region backs only the first element
    let data = calldata_bytes(&[word(32), word(4), word(5)]);
    let ty = DataType::dynamic_array(DataType::uint256());
    let tables = AllocationTables::default();

    let decoded = finished(decode_calldata(
        &tables,
        ty.clone(),
        &data,
        0,
        DecodeMode::Normal,
    ));
    let Decoded::Value(TypedValue::Array(children)) = decoded else {
        panic!("expected an array value");
    };
    assert_eq!(children.len(), 4);
    assert_eq!(children[0], ElementaryValue::Uint(U256::from(5u8)).into());
    for child in &children[1..] {
        assert!(matches!(child, Decoded::Error(DecodeError::OutOfBoundsRead { .. })));
    }

    // strict bounds the declared count against the known region instead
    assert_eq!(
        aborted(decode_calldata(&tables, ty, &data, 0, DecodeMode::Strict)),
        DecodeError::OverlongArrayOrString {
            declared: U256::from(4u8),
        }
    );
}

#[test]
fn negative_ints_and_fixed_bytes_keep_their_shape() {
    let minus_five = B256::from(I256::unchecked_from(-5i32).into_raw());
    let tables = AllocationTables::default();
    assert_eq!(
        finished(decode_calldata(
            &tables,
            DataType::Elementary(ElementaryType::Int { bits: 256 }),
            minus_five.as_slice(),
            0,
            DecodeMode::Strict,
        )),
        ElementaryValue::Int(I256::unchecked_from(-5i32)).into()
    );

    let mut selector = B256::ZERO;
    selector[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(
        finished(decode_calldata(
            &tables,
            DataType::Elementary(ElementaryType::FixedBytes { width: 4 }),
            selector.as_slice(),
            0,
            DecodeMode::Strict,
        )),
        ElementaryValue::FixedBytes {
            word: selector,
            width: 4,
        }
        .into()
    );
}

#[test]
fn error_nodes_render_as_inline_placeholders() {
    let mut dirty = B256::from(U256::from(3u8));
    dirty[0] = 0xff;
    let data = calldata_bytes(&[word(1), dirty]);
    let ty = DataType::static_array(DataType::Elementary(ElementaryType::Uint { bits: 8 }), 2);
    let tables = AllocationTables::default();

    let decoded = finished(decode_calldata(&tables, ty, &data, 0, DecodeMode::Normal));
    let rendered = decoded.to_string();
    assert!(rendered.starts_with('['));
    assert!(rendered.contains("<decoding error: "));
    assert!(rendered.contains('1'));
}

#[test]
fn repeated_decodes_of_one_snapshot_are_identical() {
    let mut tag = B256::ZERO;
    tag[..3].copy_from_slice(b"abc");
    let data = calldata_bytes(&[word(32), word(99), word(64), word(3), tag]);
    let ty = DataType::Tuple(vec![
        DataType::uint256(),
        DataType::Elementary(ElementaryType::String),
    ]);
    let tables = AllocationTables::default();

    let first = decode_calldata(&tables, ty.clone(), &data, 0, DecodeMode::Normal);
    let second = decode_calldata(&tables, ty, &data, 0, DecodeMode::Normal);
    assert_eq!(first, second);
}

fn proptest_type(selector: u8) -> DataType {
    match selector % 6 {
        0 => DataType::uint256(),
        1 => DataType::Elementary(ElementaryType::Bool),
        2 => DataType::Elementary(ElementaryType::Address),
        3 => DataType::Elementary(ElementaryType::String),
        4 => DataType::Elementary(ElementaryType::Bytes),
        _ => DataType::dynamic_array(DataType::uint256()),
    }
}

proptest! {
    #[test]
    fn uint256_words_round_trip(raw in any::<[u8; 32]>()) {
        let tables = AllocationTables::default();
        let decoded = finished(decode_calldata(
            &tables,
            DataType::uint256(),
            &raw,
            0,
            DecodeMode::Strict,
        ));
        prop_assert_eq!(decoded, ElementaryValue::Uint(U256::from_be_bytes(raw)).into());
    }

    #[test]
    fn canonical_scalar_words_re_encode_to_their_bytes(
        raw in any::<[u8; 32]>(),
        selector in any::<u8>(),
    ) {
        // canonicalise the padding for the chosen scalar so the decode
        // succeeds, then check re-encoding reproduces the word exactly
        let ty = match selector % 5 {
            0 => ElementaryType::Uint { bits: 256 },
            1 => ElementaryType::Int { bits: 256 },
            2 => ElementaryType::Uint { bits: 64 },
            3 => ElementaryType::Address,
            _ => ElementaryType::FixedBytes { width: 8 },
        };
        let mut word = B256::from(raw);
        match ty {
            ElementaryType::FixedBytes { width } => {
                for byte in &mut word[usize::from(width)..] {
                    *byte = 0;
                }
            }
            ElementaryType::Int { bits } | ElementaryType::Uint { bits } => {
                let width = usize::from(bits / 8);
                let fill = if matches!(ty, ElementaryType::Int { .. }) && word[32 - width] & 0x80 != 0
                {
                    0xff
                } else {
                    0x00
                };
                for byte in &mut word[..32 - width] {
                    *byte = fill;
                }
            }
            _ => {
                for byte in &mut word[..12] {
                    *byte = 0;
                }
            }
        }
        let tables = AllocationTables::default();
        let decoded = finished(decode_calldata(
            &tables,
            DataType::Elementary(ty),
            word.as_slice(),
            0,
            DecodeMode::Strict,
        ));
        let Decoded::Value(TypedValue::Elementary(value)) = decoded else {
            panic!("canonical scalar words decode cleanly");
        };
        prop_assert_eq!(value.to_word(), Some(word));
    }

    #[test]
    fn strict_success_implies_the_same_normal_result(
        words in prop::collection::vec(any::<[u8; 32]>(), 1..6),
        selector in any::<u8>(),
    ) {
        let data: Vec<u8> = words.concat();
        let ty = proptest_type(selector);
        let tables = AllocationTables::default();

        let strict = decode_calldata(&tables, ty.clone(), &data, 0, DecodeMode::Strict);
        prop_assert!(!matches!(strict, DecodeProgress::AwaitingData(_)));
        if let DecodeProgress::Finished(decoded) = strict {
            let normal = decode_calldata(&tables, ty, &data, 0, DecodeMode::Normal);
            prop_assert_eq!(normal, DecodeProgress::Finished(decoded));
        }
    }
}
