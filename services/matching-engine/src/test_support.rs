//! Order fixtures shared by the unit tests

use ledger_types::contract::{encode_program, MagneticContractArgs};
use ledger_types::ids::{AssetId, Hash};
use ledger_types::order::{Order, OrderUtxo, TradePair};

pub const NODE_PROGRAM: &[u8] = &[0x00, 0x14, 0xfe, 0xfe];

pub fn pair(from: u64, to: u64) -> TradePair {
    TradePair::new(AssetId::from_u64(from), AssetId::from_u64(to))
}

/// Order offering `amount` of asset `from` at `num / den` units of `to` each.
/// `seed` picks the output and the seller, so distinct seeds give distinct keys.
pub fn order_with(from: u64, to: u64, num: i64, den: i64, amount: u64, seed: u8) -> Order {
    let program = encode_program(&MagneticContractArgs {
        requested_asset: AssetId::from_u64(to),
        ratio_numerator: num,
        ratio_denominator: den,
        seller_program: vec![0x00, 0x14, seed],
        seller_key: vec![seed; 32],
    })
    .unwrap();

    Order::new(
        AssetId::from_u64(from),
        OrderUtxo {
            source_id: Hash::digest(&[seed]),
            source_pos: seed as u64,
            amount,
            control_program: program,
        },
    )
    .unwrap()
}
