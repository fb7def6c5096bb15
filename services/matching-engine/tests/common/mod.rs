//! Shared fixtures for the engine integration tests

#![allow(dead_code)]

use ledger_types::contract::{encode_program, MagneticContractArgs};
use ledger_types::ids::{AssetId, Hash};
use ledger_types::order::{Order, OrderUtxo, TradePair};
use magnetic_engine::{Engine, EngineConfig, OrderTable};

pub const NODE_PROGRAM: &[u8] = &[0x00, 0x14, 0xfe, 0xed];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn asset(n: u64) -> AssetId {
    AssetId::from_u64(n)
}

pub fn pair(from: u64, to: u64) -> TradePair {
    TradePair::new(asset(from), asset(to))
}

pub fn seller_program(seed: u64) -> Vec<u8> {
    let mut program = vec![0x00, 0x14];
    program.extend_from_slice(&seed.to_be_bytes());
    program
}

/// Order offering `amount` of `from` for `num / den` units of `to` each
pub fn order(from: u64, to: u64, num: i64, den: i64, amount: u64, seed: u64) -> Order {
    let control_program = encode_program(&MagneticContractArgs {
        requested_asset: asset(to),
        ratio_numerator: num,
        ratio_denominator: den,
        seller_program: seller_program(seed),
        seller_key: vec![0x02; 32],
    })
    .unwrap();

    Order::new(
        asset(from),
        OrderUtxo {
            source_id: Hash::digest(&seed.to_le_bytes()),
            source_pos: 0,
            amount,
            control_program,
        },
    )
    .unwrap()
}

pub fn config() -> EngineConfig {
    EngineConfig::new(NODE_PROGRAM.to_vec())
}

pub fn engine_with(config: EngineConfig, orders: Vec<Order>) -> Engine {
    let engine = Engine::new(OrderTable::in_memory(), config).unwrap();
    for order in orders {
        engine.add_order(order).unwrap();
    }
    engine
}

pub fn engine(orders: Vec<Order>) -> Engine {
    engine_with(config(), orders)
}
