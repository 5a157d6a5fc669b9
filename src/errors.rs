//! Storage discovery errors
use alloy_primitives::{Address, FixedBytes, B256, U256};
use thiserror::Error;

/// Represents the user-facing errors of the stdstore package.
///
/// None of these are retried internally. Every probing mutation done on the target has already
/// been rolled back by the time one of them reaches the caller.
///
/// Variants:
/// - `NoStorageUse`: the called function did not read any storage of the target.
/// - `PackedSlot`: the slot content does not match the value returned by the call, so the slot is
///   shared with other data and overwriting it would corrupt it.
/// - `SlotNotFound`: no recorded slot could be attributed to the returned value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StdStorageError {
    #[error("No storage use detected for target {target} (selector {selector})")]
    NoStorageUse { target: Address, selector: FixedBytes<4> },
    #[error(
        "Packed slot {0}. This would cause dangerous overwriting and currently isn't supported"
    )]
    PackedSlot(U256),
    #[error("Slot(s) not found for target {target} (selector {selector})")]
    SlotNotFound { target: Address, selector: FixedBytes<4> },
    #[error("Slot {0} holds a dynamically-sized value")]
    UnexpectedDynamic(U256),
    #[error("Cannot decode {0} as a bool. Make sure you are reading a bool")]
    InvalidBool(B256),
    #[error("Missing function selector")]
    MissingSelector,
    #[error("Host error: {0}")]
    Host(String),
}

impl StdStorageError {
    /// Wraps an error returned by the storage host.
    pub fn host<E: std::fmt::Debug>(err: E) -> Self {
        StdStorageError::Host(format!("{err:?}"))
    }
}
