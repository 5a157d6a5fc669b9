use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use revm::{
    interpreter::{opcode, Interpreter},
    Database, EvmContext, Inspector,
};

/// Records storage slots reads and writes, per contract address.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordAccess {
    /// Storage slots reads.
    pub reads: HashMap<Address, Vec<U256>>,
    /// Storage slots writes.
    pub writes: HashMap<Address, Vec<U256>>,
}

impl RecordAccess {
    /// Records a read access to a storage slot.
    pub fn record_read(&mut self, target: Address, slot: U256) {
        self.reads
            .entry(target)
            .or_default()
            .push(slot);
    }

    /// Records a write access to a storage slot.
    ///
    /// This also records a read internally as `SSTORE` does an implicit `SLOAD`.
    pub fn record_write(&mut self, target: Address, slot: U256) {
        self.record_read(target, slot);
        self.writes
            .entry(target)
            .or_default()
            .push(slot);
    }

    /// Removes and returns the reads and writes recorded for `target`.
    pub fn take(&mut self, target: &Address) -> (Vec<U256>, Vec<U256>) {
        (
            self.reads
                .remove(target)
                .unwrap_or_default(),
            self.writes
                .remove(target)
                .unwrap_or_default(),
        )
    }
}

/// Inspector feeding `SLOAD` and `SSTORE` keys into a [`RecordAccess`] while recording is armed.
#[derive(Debug, Default)]
pub struct StorageRecorder {
    pub accesses: Option<RecordAccess>,
}

impl<DB: Database> Inspector<DB> for StorageRecorder {
    fn step(&mut self, interp: &mut Interpreter, _context: &mut EvmContext<DB>) {
        let Some(accesses) = self.accesses.as_mut() else {
            return;
        };
        let address = interp.contract.target_address;
        match interp.current_opcode() {
            opcode::SLOAD => {
                if let Ok(key) = interp.stack().peek(0) {
                    accesses.record_read(address, key);
                }
            }
            opcode::SSTORE => {
                if let Ok(key) = interp.stack().peek(0) {
                    accesses.record_write(address, key);
                }
            }
            _ => (),
        }
    }
}
