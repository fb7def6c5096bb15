//! Order fixtures for the journal unit tests

use ledger_types::contract::{encode_program, MagneticContractArgs};
use ledger_types::ids::{AssetId, Hash};
use ledger_types::order::{Order, OrderUtxo};

/// Order of `amount` units of asset 1 for asset 2 at 1:1, keyed by `seed`
pub fn sample_order(seed: u8, amount: u64) -> Order {
    let control_program = encode_program(&MagneticContractArgs {
        requested_asset: AssetId::from_u64(2),
        ratio_numerator: 1,
        ratio_denominator: 1,
        seller_program: vec![0x00, 0x14, seed],
        seller_key: vec![seed; 32],
    })
    .unwrap();
    Order::new(
        AssetId::from_u64(1),
        OrderUtxo {
            source_id: Hash::digest(&[seed]),
            source_pos: 0,
            amount,
            control_program,
        },
    )
    .unwrap()
}
