//! stdstore: storage slot discovery for EVM contracts
//!
//! Given a contract, the signature of one of its getters and the getter's arguments, this
//! library finds the raw storage slot backing the returned value without any knowledge of the
//! contract's storage layout. It works by recording the slots the getter reads and, when there
//! is more than one, by overwriting candidates with a sentinel until the getter returns it.
//! `bytes` and `string` values are matched against their storage encoding instead.
//!
//! Once a slot is known it can be read or overwritten. Writes are refused whenever the slot is
//! shared with other fields, so a write never corrupts neighbouring data.
//!
//! The VM is abstracted behind [`evm::host::StorageHost`]. With the `evm` feature (enabled by
//! default) the crate ships [`evm::revm_host::RevmHost`], a host backed by revm.

pub mod errors;
pub mod evm;
pub mod storage;

pub use errors::StdStorageError;
pub use evm::host::{CallOutcome, StorageHost};
pub use storage::{
    models::{IntoStorageWord, ProbeRequest, ResolvedSlot},
    StdStorage, StdStorageConfig,
};
