use alloy_primitives::{Address, FixedBytes, B256, I256, U256};

use super::{
    models::{selector_of, IntoStorageWord, LookupKey, ProbeRequest, ResolvedSlot},
    StdStorage,
};
use crate::{errors::StdStorageError, evm::host::StorageHost};

/// Fluent builder for a [`ProbeRequest`], consumed by exactly one terminal call.
///
/// ```ignore
/// let slot = storage
///     .target(token)
///     .sig("balanceOf(address)")
///     .with_key(owner)
///     .find()?;
/// ```
#[must_use = "a probe does nothing until a terminal method is called"]
pub struct Probe<'a, H> {
    storage: &'a mut StdStorage<H>,
    target: Address,
    selector: Option<FixedBytes<4>>,
    keys: Vec<LookupKey>,
    depth: usize,
    one_shot: bool,
}

impl<'a, H: StorageHost> Probe<'a, H> {
    pub(super) fn new(storage: &'a mut StdStorage<H>, target: Address) -> Self {
        Self { storage, target, selector: None, keys: Vec::new(), depth: 0, one_shot: false }
    }

    /// Sets the getter by its signature, e.g. `map_addr(address)`.
    pub fn sig(mut self, signature: &str) -> Self {
        self.selector = Some(selector_of(signature));
        self
    }

    pub fn selector(mut self, selector: impl Into<FixedBytes<4>>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Appends a getter argument. Nested mapping keys go outermost first.
    pub fn with_key(mut self, key: impl IntoStorageWord) -> Self {
        self.keys.push(LookupKey::new(key));
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Forget the slot after this lookup unless it was already cached.
    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    /// The request built so far.
    pub fn request(&self) -> Result<ProbeRequest, StdStorageError> {
        let selector = self
            .selector
            .ok_or(StdStorageError::MissingSelector)?;
        Ok(ProbeRequest {
            target: self.target,
            selector,
            keys: self.keys.clone(),
            depth: self.depth,
            one_shot: self.one_shot,
        })
    }

    fn into_parts(self) -> Result<(&'a mut StdStorage<H>, ProbeRequest), StdStorageError> {
        let request = self.request()?;
        Ok((self.storage, request))
    }

    pub fn find(self) -> Result<ResolvedSlot, StdStorageError> {
        let (storage, request) = self.into_parts()?;
        storage.find(request)
    }

    pub fn find_dynamic(self) -> Result<U256, StdStorageError> {
        let (storage, request) = self.into_parts()?;
        storage.find_dynamic(request)
    }

    pub fn checked_write(self, value: impl IntoStorageWord) -> Result<(), StdStorageError> {
        let (storage, request) = self.into_parts()?;
        storage.checked_write(request, value)
    }

    pub fn checked_write_dynamic(self, value: impl AsRef<[u8]>) -> Result<(), StdStorageError> {
        let (storage, request) = self.into_parts()?;
        storage.checked_write_dynamic(request, value.as_ref())
    }

    pub fn read(self) -> Result<B256, StdStorageError> {
        let (storage, request) = self.into_parts()?;
        storage.read(request)
    }

    pub fn read_u256(self) -> Result<U256, StdStorageError> {
        let (storage, request) = self.into_parts()?;
        storage.read_u256(request)
    }

    pub fn read_i256(self) -> Result<I256, StdStorageError> {
        let (storage, request) = self.into_parts()?;
        storage.read_i256(request)
    }

    pub fn read_address(self) -> Result<Address, StdStorageError> {
        let (storage, request) = self.into_parts()?;
        storage.read_address(request)
    }

    pub fn read_bool(self) -> Result<bool, StdStorageError> {
        let (storage, request) = self.into_parts()?;
        storage.read_bool(request)
    }

    pub fn read_bytes(self) -> Result<Vec<u8>, StdStorageError> {
        let (storage, request) = self.into_parts()?;
        storage.read_bytes(request)
    }
}
