//! Storage slot discovery and checked writes.
//!
//! [`StdStorage`] finds the raw storage slot behind a getter by calling it with storage access
//! recording armed and, when several slots were read, by overwriting each candidate with a
//! sentinel until the getter returns it. Every overwrite is restored before moving on, so a
//! discovery run leaves the target's storage untouched.
use alloy_primitives::{b256, Address, B256, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{errors::StdStorageError, evm::host::StorageHost};

pub mod cache;
pub mod codec;
pub mod models;
pub mod probe;
mod resolver;
mod writer;

use cache::SlotCache;
use models::ProbeRequest;
use probe::Probe;

/// Marker written into candidate slots while probing, `bytes32(hex"1337")`.
pub const SENTINEL: B256 =
    b256!("1337000000000000000000000000000000000000000000000000000000000000");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StdStorageConfig {
    /// Value written into candidate slots while probing. Should not occur as real data in the
    /// probed contract.
    pub sentinel: B256,
}

impl Default for StdStorageConfig {
    fn default() -> Self {
        Self { sentinel: SENTINEL }
    }
}

/// Storage discovery and checked writes on top of a [`StorageHost`].
#[derive(Debug)]
pub struct StdStorage<H> {
    pub host: H,
    cache: SlotCache,
    config: StdStorageConfig,
}

impl<H: StorageHost> StdStorage<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, StdStorageConfig::default())
    }

    pub fn with_config(host: H, config: StdStorageConfig) -> Self {
        Self { host, cache: SlotCache::new(), config }
    }

    /// Starts building a lookup against `target`.
    pub fn target(&mut self, target: Address) -> Probe<'_, H> {
        Probe::new(self, target)
    }

    pub fn cache(&self) -> &SlotCache {
        &self.cache
    }

    pub fn config(&self) -> &StdStorageConfig {
        &self.config
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Drops the cached resolution of `request`, so the next lookup runs discovery again.
    pub fn forget(&mut self, request: &ProbeRequest) -> Option<models::ResolvedSlot> {
        self.cache
            .remove(&request.slot_key())
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Removes a freshly discovered entry of a one-shot request.
    fn finish(&mut self, request: &ProbeRequest, fresh: bool) {
        if request.one_shot && fresh {
            debug!(
                target = %request.target,
                selector = %request.selector,
                "Forgetting one-shot slot"
            );
            self.forget(request);
        }
    }

    fn load_slot(&mut self, target: Address, slot: U256) -> Result<B256, StdStorageError> {
        self.host
            .load(target, slot)
            .map_err(StdStorageError::host)
    }

    fn store_slot(
        &mut self,
        target: Address,
        slot: U256,
        value: B256,
    ) -> Result<(), StdStorageError> {
        self.host
            .store(target, slot, value)
            .map_err(StdStorageError::host)
    }
}

fn warn_if_uninitialized(target: Address, slot: U256, value: &B256) {
    if value.is_zero() {
        warn!(%target, %slot, "Found uninitialized slot; the value found may be a false positive");
    }
}
