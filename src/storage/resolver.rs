use alloy_primitives::{Bytes, U256};
use itertools::Itertools;
use tracing::{debug, info};

use super::{
    codec::{self, data_slot},
    models::{ProbeRequest, ResolvedSlot},
    warn_if_uninitialized, StdStorage,
};
use crate::{errors::StdStorageError, evm::host::StorageHost};

/// Return data and read set of one recorded call.
#[derive(Debug)]
struct Observation {
    output: Bytes,
    reads: Vec<U256>,
}

impl<H: StorageHost> StdStorage<H> {
    /// Finds the slot backing the `depth`-th word returned by the request's getter.
    ///
    /// If the getter reads more than one slot each of them is overwritten with the sentinel in
    /// turn, and restored, until the getter returns the sentinel. Getters returning `bytes` or
    /// `string` values are matched against their storage encoding instead, in which case the
    /// returned slot is marked dynamic.
    ///
    /// # Errors
    ///
    /// * `NoStorageUse` if the getter doesn't read any storage of the target.
    /// * `PackedSlot` if the only slot read doesn't hold exactly the returned word.
    /// * `SlotNotFound` if none of the slots read could be attributed to the returned value.
    pub fn find(&mut self, request: ProbeRequest) -> Result<ResolvedSlot, StdStorageError> {
        let (resolved, fresh) = self.resolve(&request)?;
        self.finish(&request, fresh);
        Ok(resolved)
    }

    /// Finds the base slot of the `bytes` or `string` value returned by the request's getter.
    pub fn find_dynamic(&mut self, request: ProbeRequest) -> Result<U256, StdStorageError> {
        let (slot, fresh) = self.resolve_dynamic(&request)?;
        self.finish(&request, fresh);
        Ok(slot)
    }

    /// Resolves a request, returning whether the resolution was freshly discovered.
    pub(crate) fn resolve(
        &mut self,
        request: &ProbeRequest,
    ) -> Result<(ResolvedSlot, bool), StdStorageError> {
        let key = request.slot_key();
        if let Some(resolved) = self.cache.get(&key) {
            return Ok((resolved, false));
        }

        let observation = self.observe(request)?;
        let expected = codec::word_at(&observation.output, request.depth);

        let resolved = match observation.reads.as_slice() {
            [] => {
                return Err(StdStorageError::NoStorageUse {
                    target: request.target,
                    selector: request.selector,
                })
            }
            [slot] => {
                let content = self.load_slot(request.target, *slot)?;
                warn_if_uninitialized(request.target, *slot, &content);
                if content != expected {
                    return Err(StdStorageError::PackedSlot(*slot));
                }
                ResolvedSlot::fixed(*slot)
            }
            reads => match self.probe_candidates(request, reads)? {
                Some(slot) => ResolvedSlot::fixed(slot),
                None => {
                    debug!(
                        target = %request.target,
                        "No candidate returned the sentinel, trying dynamic encodings"
                    );
                    codec::decode_dynamic_return(&observation.output, request.depth)
                        .map(|expected| self.match_dynamic(request, &expected, reads))
                        .transpose()?
                        .flatten()
                        .map(ResolvedSlot::dynamic)
                        .ok_or(StdStorageError::SlotNotFound {
                            target: request.target,
                            selector: request.selector,
                        })?
                }
            },
        };

        info!(
            target = %request.target,
            selector = %request.selector,
            slot = %resolved.slot,
            dynamic = resolved.is_dynamic,
            "Found storage slot"
        );
        self.cache.insert(key, resolved);
        Ok((resolved, true))
    }

    pub(crate) fn resolve_dynamic(
        &mut self,
        request: &ProbeRequest,
    ) -> Result<(U256, bool), StdStorageError> {
        let key = request.slot_key();
        if let Some(slot) = self.cache.get_dynamic(&key) {
            return Ok((slot, false));
        }

        let not_found =
            || StdStorageError::SlotNotFound { target: request.target, selector: request.selector };

        let observation = self.observe(request)?;
        let expected = codec::decode_dynamic_return(&observation.output, request.depth)
            .ok_or_else(not_found)?;

        let distinct: Vec<U256> = observation
            .reads
            .iter()
            .copied()
            .unique()
            .collect();

        let slot = match distinct.as_slice() {
            [] => {
                return Err(StdStorageError::NoStorageUse {
                    target: request.target,
                    selector: request.selector,
                })
            }
            [slot] => {
                let content = self.load_slot(request.target, *slot)?;
                warn_if_uninitialized(request.target, *slot, &content);
                if codec::unpack_inline(&content).as_deref() != Some(expected.as_slice()) {
                    return Err(StdStorageError::PackedSlot(*slot));
                }
                *slot
            }
            _ => self
                .match_dynamic(request, &expected, &observation.reads)?
                .ok_or_else(not_found)?,
        };

        info!(
            target = %request.target,
            selector = %request.selector,
            %slot,
            "Found dynamic storage slot"
        );
        self.cache
            .insert(key, ResolvedSlot::dynamic(slot));
        Ok((slot, true))
    }

    /// Calls the getter with recording armed and drains the target's reads.
    fn observe(&mut self, request: &ProbeRequest) -> Result<Observation, StdStorageError> {
        let calldata = request.calldata();
        debug!(
            target = %request.target,
            calldata = %hex::encode(&calldata),
            "Recording storage reads"
        );

        self.host.record();
        let outcome = self
            .host
            .call(request.target, &calldata);
        // drain even if the call failed, so recording never leaks into the next operation
        let (reads, _) = self.host.accesses(request.target);
        let outcome = outcome.map_err(StdStorageError::host)?;

        debug!(
            target = %request.target,
            ?reads,
            success = outcome.success,
            "Recorded storage reads"
        );
        Ok(Observation { output: outcome.output, reads })
    }

    /// Overwrites each candidate with the sentinel until the getter returns it.
    fn probe_candidates(
        &mut self,
        request: &ProbeRequest,
        reads: &[U256],
    ) -> Result<Option<U256>, StdStorageError> {
        let candidates: Vec<U256> = reads
            .iter()
            .copied()
            .unique()
            .collect();
        for slot in candidates {
            if self.probe(request, slot)? {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    /// Stores the sentinel in `slot`, calls the getter and restores the previous content.
    fn probe(&mut self, request: &ProbeRequest, slot: U256) -> Result<bool, StdStorageError> {
        let previous = self.load_slot(request.target, slot)?;
        warn_if_uninitialized(request.target, slot, &previous);

        let sentinel = self.config.sentinel;
        self.store_slot(request.target, slot, sentinel)?;
        let outcome = self
            .host
            .call(request.target, &request.calldata());
        self.store_slot(request.target, slot, previous)?;
        let outcome = outcome.map_err(StdStorageError::host)?;

        let matched = outcome.success && codec::word_at(&outcome.output, request.depth) == sentinel;
        debug!(target = %request.target, %slot, matched, "Probed candidate slot");
        Ok(matched)
    }

    /// Looks for a slot among `reads` whose storage encoding decodes to `expected`.
    ///
    /// Long-form candidates only qualify if the getter also read their whole data run, in order.
    fn match_dynamic(
        &mut self,
        request: &ProbeRequest,
        expected: &[u8],
        reads: &[U256],
    ) -> Result<Option<U256>, StdStorageError> {
        let candidates: Vec<U256> = reads
            .iter()
            .copied()
            .unique()
            .collect();
        for slot in candidates {
            let content = self.load_slot(request.target, slot)?;
            let decoded = if codec::is_long_form(&content) {
                let Some(length) = codec::long_length(&content) else { continue };
                let needed = length.div_ceil(32);
                if length != expected.len() || !check_for_data(reads, data_slot(slot), needed) {
                    continue;
                }
                Some(self.load_data(request.target, slot, &content, needed)?)
            } else {
                codec::unpack_inline(&content)
            };

            if decoded.as_deref() == Some(expected) {
                debug!(target = %request.target, %slot, "Matched dynamic value");
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }
}

/// Whether `reads` contains the `needed` consecutive slots starting at `start`, in order.
fn check_for_data(reads: &[U256], start: U256, needed: usize) -> bool {
    if needed == 0 {
        return true;
    }
    reads
        .windows(needed)
        .any(|window| {
            window
                .iter()
                .enumerate()
                .all(|(offset, slot)| *slot == start.wrapping_add(U256::from(offset)))
        })
}
