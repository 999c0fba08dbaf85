//! Walkthrough decoding one token transfer call and the token's storage.
//!
//! Builds a synthetic ERC20-style snapshot, then drives two decodes: the
//! calldata of `transfer(address,uint256)` and a storage layout holding the
//! token name, total supply, and one observed balance entry.
//!
//! ```sh
//! cargo run -p decoder-core --example token_walkthrough
//! ```

use std::collections::BTreeMap;

use alloy_primitives::{address, Address, Bytes, B256, U256};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

use decoder_core::{
    run_to_completion, AllocationTables, DataType, DecodeMachine, DecodeMode, DecodeProgress,
    DecodeSession, ElementaryType, ElementaryValue, EvmState, KeyObservation, Pointer, ReadError,
    Slot, SlotRange, SlotResolver, StateReader,
};

struct SnapshotReader {
    words: BTreeMap<U256, B256>,
}

impl StateReader for SnapshotReader {
    fn storage_word(&mut self, _address: Address, slot: U256) -> Result<B256, ReadError> {
        self.words.get(&slot).copied().ok_or_else(|| ReadError {
            reason: format!("slot {slot} is not in the snapshot"),
        })
    }

    fn contract_code(&mut self, account: Address, _block: u64) -> Result<Bytes, ReadError> {
        Err(ReadError {
            reason: format!("no code snapshot for {account}"),
        })
    }
}

fn transfer_calldata(to: Address, amount: U256) -> Bytes {
    let mut data = vec![0xa9, 0x05, 0x9c, 0xbb];
    data.extend_from_slice(to.into_word().as_slice());
    data.extend_from_slice(&amount.to_be_bytes::<32>());
    data.into()
}

fn short_string_word(text: &str) -> B256 {
    let mut word = B256::ZERO;
    word[..text.len()].copy_from_slice(text.as_bytes());
    word[31] = u8::try_from(text.len() * 2).expect("short form length fits one byte");
    word
}

fn main() {
    let holder = address!("00000000000000000000000000000000000000aa");
    let tables = AllocationTables::default();

    // calldata of transfer(address,uint256): two head words after the selector
    let call_state = EvmState {
        calldata: transfer_calldata(holder, U256::from(1_500u64)),
        ..EvmState::default()
    };
    let session = DecodeSession {
        tables: &tables,
        state: &call_state,
        observations: &[],
    };
    let arguments = DataType::Tuple(vec![
        DataType::Elementary(ElementaryType::Address),
        DataType::uint256(),
    ]);
    let pointer = Pointer::calldata(4, call_state.calldata.len() - 4);
    match DecodeMachine::new(session, arguments, pointer, DecodeMode::Normal).advance() {
        DecodeProgress::Finished(decoded) => println!("transfer arguments: {decoded}"),
        other => println!("calldata decode did not finish: {other:?}"),
    }

    // storage: name at slot 0, total supply at slot 1, balances at slot 2
    let balances_slot = Slot::root(U256::from(2u8));
    let entry = Slot::mapping_entry(balances_slot.clone(), ElementaryValue::Address(holder));
    let entry_address = SlotResolver::new().resolve(&entry);

    let words: BTreeMap<U256, B256> = [
        (U256::ZERO, short_string_word("Pony Gold")),
        (U256::ONE, B256::from(U256::from(21_000_000u64))),
        (entry_address, B256::from(U256::from(1_500u64))),
    ]
    .into_iter()
    .collect();
    let observations = vec![KeyObservation {
        path: balances_slot,
        key: ElementaryValue::Address(holder),
    }];

    let storage_state = EvmState::default();
    let session = DecodeSession {
        tables: &tables,
        state: &storage_state,
        observations: &observations,
    };
    let schema = [
        ("name", DataType::Elementary(ElementaryType::String), 0u8),
        ("totalSupply", DataType::uint256(), 1),
        (
            "balances",
            DataType::Mapping {
                key: ElementaryType::Address,
                value: Box::new(DataType::uint256()),
            },
            2,
        ),
    ];
    let mut reader = SnapshotReader { words };
    for (label, ty, slot) in schema {
        let machine = DecodeMachine::new(
            session,
            ty,
            Pointer::storage(SlotRange::word(Slot::root(U256::from(slot)))),
            DecodeMode::Normal,
        );
        match run_to_completion(machine, &mut reader) {
            Ok(decoded) => println!("{label}: {decoded}"),
            Err(err) => println!("{label}: decode aborted: {err}"),
        }
    }
}
