use std::collections::HashMap;

use alloy_primitives::U256;

use super::models::{ResolvedSlot, SlotKey};

/// Memoized slot resolutions.
///
/// Fixed-size values and `bytes`/`string` base slots are kept apart so that asking for the
/// dynamic slot of a getter never returns a slot that was only verified as a single word.
/// Entries are never invalidated implicitly: as long as the target's code doesn't change, its
/// storage layout doesn't either.
#[derive(Debug, Clone, Default)]
pub struct SlotCache {
    static_slots: HashMap<SlotKey, U256>,
    dynamic_slots: HashMap<SlotKey, U256>,
}

impl SlotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a resolution in both namespaces, static first.
    pub fn get(&self, key: &SlotKey) -> Option<ResolvedSlot> {
        self.get_static(key)
            .map(ResolvedSlot::fixed)
            .or_else(|| {
                self.get_dynamic(key)
                    .map(ResolvedSlot::dynamic)
            })
    }

    pub fn get_static(&self, key: &SlotKey) -> Option<U256> {
        self.static_slots.get(key).copied()
    }

    pub fn get_dynamic(&self, key: &SlotKey) -> Option<U256> {
        self.dynamic_slots
            .get(key)
            .copied()
    }

    pub fn insert(&mut self, key: SlotKey, resolved: ResolvedSlot) {
        if resolved.is_dynamic {
            self.dynamic_slots
                .insert(key, resolved.slot);
        } else {
            self.static_slots
                .insert(key, resolved.slot);
        }
    }

    /// Removes the entry from both namespaces, returning the static one if there was one.
    pub fn remove(&mut self, key: &SlotKey) -> Option<ResolvedSlot> {
        let fixed = self
            .static_slots
            .remove(key)
            .map(ResolvedSlot::fixed);
        let dynamic = self
            .dynamic_slots
            .remove(key)
            .map(ResolvedSlot::dynamic);
        fixed.or(dynamic)
    }

    pub fn clear(&mut self) {
        self.static_slots.clear();
        self.dynamic_slots.clear();
    }

    pub fn len(&self) -> usize {
        self.static_slots.len() + self.dynamic_slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
