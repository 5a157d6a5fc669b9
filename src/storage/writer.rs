use alloy_primitives::{Address, B256, I256, U256};
use tracing::debug;

use super::{
    codec,
    models::{IntoStorageWord, ProbeRequest},
    StdStorage,
};
use crate::{errors::StdStorageError, evm::host::StorageHost};

impl<H: StorageHost> StdStorage<H> {
    /// Overwrites the word returned by the request's getter.
    ///
    /// The slot is resolved first, then checked once more against a fresh call right before the
    /// write, so that a slot shared with other fields is never clobbered.
    pub fn checked_write(
        &mut self,
        request: ProbeRequest,
        value: impl IntoStorageWord,
    ) -> Result<(), StdStorageError> {
        let (resolved, fresh) = self.resolve(&request)?;
        if resolved.is_dynamic {
            return Err(StdStorageError::UnexpectedDynamic(resolved.slot));
        }

        let outcome = self
            .host
            .call(request.target, &request.calldata())
            .map_err(StdStorageError::host)?;
        let returned = codec::word_at(&outcome.output, request.depth);
        if self.load_slot(request.target, resolved.slot)? != returned {
            return Err(StdStorageError::PackedSlot(resolved.slot));
        }

        let value = value.into_storage_word();
        debug!(target = %request.target, slot = %resolved.slot, %value, "Writing storage slot");
        self.store_slot(request.target, resolved.slot, value)?;
        self.finish(&request, fresh);
        Ok(())
    }

    /// Overwrites the `bytes` or `string` value returned by the request's getter.
    ///
    /// Data slots of the previous value that the new one doesn't cover are zeroed.
    pub fn checked_write_dynamic(
        &mut self,
        request: ProbeRequest,
        value: &[u8],
    ) -> Result<(), StdStorageError> {
        let (base, fresh) = self.resolve_dynamic(&request)?;

        let outcome = self
            .host
            .call(request.target, &request.calldata())
            .map_err(StdStorageError::host)?;
        let returned = codec::decode_dynamic_return(&outcome.output, request.depth)
            .ok_or(StdStorageError::PackedSlot(base))?;
        let previous_base = self.load_slot(request.target, base)?;
        let current = match codec::long_length(&previous_base) {
            // only load as many data slots as the returned value can account for
            Some(length) if length == returned.len() => Some(self.load_data(
                request.target,
                base,
                &previous_base,
                length.div_ceil(32),
            )?),
            Some(_) => None,
            None => codec::unpack_inline(&previous_base),
        };
        if current.as_deref() != Some(returned.as_slice()) {
            return Err(StdStorageError::PackedSlot(base));
        }

        let previous_footprint = codec::footprint(&previous_base).unwrap_or_default();
        let packed = codec::pack(value);
        let start = codec::data_slot(base);
        debug!(
            target = %request.target,
            %base,
            length = value.len(),
            previous_footprint,
            "Writing dynamic value"
        );

        self.store_slot(request.target, base, packed.base)?;
        for (offset, word) in packed.data.iter().enumerate() {
            self.store_slot(request.target, start.wrapping_add(U256::from(offset)), *word)?;
        }
        for offset in packed.data.len()..previous_footprint {
            self.store_slot(request.target, start.wrapping_add(U256::from(offset)), B256::ZERO)?;
        }
        self.finish(&request, fresh);
        Ok(())
    }

    /// Reads the raw word backing the request's getter.
    pub fn read(&mut self, request: ProbeRequest) -> Result<B256, StdStorageError> {
        let (resolved, fresh) = self.resolve(&request)?;
        if resolved.is_dynamic {
            return Err(StdStorageError::UnexpectedDynamic(resolved.slot));
        }
        let word = self.load_slot(request.target, resolved.slot)?;
        self.finish(&request, fresh);
        Ok(word)
    }

    pub fn read_u256(&mut self, request: ProbeRequest) -> Result<U256, StdStorageError> {
        self.read(request)
            .map(|word| U256::from_be_bytes(word.0))
    }

    pub fn read_i256(&mut self, request: ProbeRequest) -> Result<I256, StdStorageError> {
        self.read(request)
            .map(|word| I256::from_raw(U256::from_be_bytes(word.0)))
    }

    pub fn read_address(&mut self, request: ProbeRequest) -> Result<Address, StdStorageError> {
        self.read(request)
            .map(Address::from_word)
    }

    /// Reads a bool, rejecting words other than 0 and 1.
    pub fn read_bool(&mut self, request: ProbeRequest) -> Result<bool, StdStorageError> {
        let word = self.read(request)?;
        if word == B256::ZERO {
            Ok(false)
        } else if word == B256::with_last_byte(1) {
            Ok(true)
        } else {
            Err(StdStorageError::InvalidBool(word))
        }
    }

    /// Reads the `bytes` or `string` value backing the request's getter from storage.
    pub fn read_bytes(&mut self, request: ProbeRequest) -> Result<Vec<u8>, StdStorageError> {
        let (base, fresh) = self.resolve_dynamic(&request)?;
        let base_word = self.load_slot(request.target, base)?;
        let value = match codec::footprint(&base_word) {
            Some(0) => codec::unpack_inline(&base_word),
            Some(needed) => Some(self.load_data(request.target, base, &base_word, needed)?),
            None => None,
        }
        .ok_or(StdStorageError::PackedSlot(base))?;
        self.finish(&request, fresh);
        Ok(value)
    }

    /// Loads and decodes the `needed` data slots of a long-form value.
    pub(super) fn load_data(
        &mut self,
        target: Address,
        base: U256,
        base_word: &B256,
        needed: usize,
    ) -> Result<Vec<u8>, StdStorageError> {
        let start = codec::data_slot(base);
        let mut data = Vec::with_capacity(needed);
        for offset in 0..needed {
            data.push(self.load_slot(target, start.wrapping_add(U256::from(offset)))?);
        }
        codec::unpack_multi(base_word, &data).ok_or(StdStorageError::PackedSlot(base))
    }
}
