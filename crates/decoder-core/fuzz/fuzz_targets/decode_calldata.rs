#![no_main]

use decoder_core::{
    AllocationTables, DataType, DecodeMachine, DecodeMode, DecodeProgress, DecodeSession,
    ElementaryType, EvmState, Pointer,
};
use libfuzzer_sys::fuzz_target;

fn pick_type(selector: u8) -> DataType {
    match selector % 10 {
        0 => DataType::uint256(),
        1 => DataType::Elementary(ElementaryType::Bool),
        2 => DataType::Elementary(ElementaryType::Address),
        3 => DataType::Elementary(ElementaryType::FixedBytes { width: 4 }),
        4 => DataType::Elementary(ElementaryType::String),
        5 => DataType::Elementary(ElementaryType::Bytes),
        6 => DataType::dynamic_array(DataType::uint256()),
        7 => DataType::Tuple(vec![
            DataType::uint256(),
            DataType::Elementary(ElementaryType::Bool),
        ]),
        8 => DataType::static_array(DataType::uint256(), 3),
        _ => DataType::Elementary(ElementaryType::Int { bits: 128 }),
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((selector, calldata)) = data.split_first() else {
        return;
    };
    let ty = pick_type(*selector);
    let tables = AllocationTables::default();
    let state = EvmState {
        calldata: calldata.to_vec().into(),
        ..EvmState::default()
    };
    let session = DecodeSession {
        tables: &tables,
        state: &state,
        observations: &[],
    };
    let pointer = Pointer::calldata(0, calldata.len());

    // an unbacked dynamic count decodes to one error node per element in
    // the non-strict modes; only strict bounds the count against the
    // region, so unconstrained counts are driven through strict alone
    let modes: &[DecodeMode] = if matches!(ty, DataType::Array { length: None, .. }) {
        &[DecodeMode::Strict]
    } else {
        &[DecodeMode::Normal, DecodeMode::Strict, DecodeMode::Permissive]
    };
    for mode in modes {
        let mut machine = DecodeMachine::new(session, ty.clone(), pointer.clone(), *mode);
        // flat regions without contract references never need host data
        assert!(!matches!(
            machine.advance(),
            DecodeProgress::AwaitingData(_)
        ));
    }
});
