use alloy_primitives::{keccak256, B256, U256};

pub mod host;
#[cfg(feature = "evm")]
pub mod recorder;
#[cfg(feature = "evm")]
pub mod revm_host;

pub type SlotId = U256;

/// Computes the storage slot of a (possibly nested) Solidity mapping entry.
///
/// # Arguments
///
/// * `keys` - The 32 byte encoded keys, outermost mapping first.
/// * `map_base_slot` - The slot the outermost mapping was declared at.
///
/// # Notes
///
/// Each level is computed as `keccak256(key ++ slot)`, so for keys `[a, b]` the result is
/// `keccak256(b ++ keccak256(a ++ map_base_slot))`.
pub fn mapping_slot(keys: &[B256], map_base_slot: SlotId) -> SlotId {
    keys.iter()
        .fold(map_base_slot, |slot, key| {
            let concatenated = [key.as_slice(), &slot.to_be_bytes::<32>()].concat();
            SlotId::from_be_bytes(keccak256(&concatenated).0)
        })
}
