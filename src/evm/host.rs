use alloy_primitives::{Address, Bytes, B256, U256};

/// Outcome of a call executed by a [`StorageHost`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOutcome {
    /// Whether the call returned normally (as opposed to reverting or halting).
    pub success: bool,
    /// Returned data, or the revert data if the call did not succeed.
    pub output: Bytes,
}

impl CallOutcome {
    pub fn new(success: bool, output: impl Into<Bytes>) -> Self {
        Self { success, output: output.into() }
    }
}

/// The privileged VM operations storage discovery is built on.
///
/// Implementations are expected to execute calls strictly sequentially. Every method takes
/// `&mut self`, so a discovery run holds exclusive access to the host for its whole duration and
/// its temporary storage probes can't be observed by anybody else.
pub trait StorageHost {
    type Error: std::fmt::Debug;

    /// Executes a call to `target` without persisting any state changes it makes.
    fn call(&mut self, target: Address, calldata: &[u8]) -> Result<CallOutcome, Self::Error>;

    /// Starts recording storage accesses, discarding everything recorded so far.
    fn record(&mut self);

    /// Returns the slots `target` read and wrote since the last call to [`StorageHost::record`],
    /// in the order they were accessed, and stops recording.
    ///
    /// A write also counts as a read.
    fn accesses(&mut self, target: Address) -> (Vec<U256>, Vec<U256>);

    /// Reads a raw storage word.
    fn load(&mut self, target: Address, slot: U256) -> Result<B256, Self::Error>;

    /// Overwrites a raw storage word.
    fn store(&mut self, target: Address, slot: U256, value: B256) -> Result<(), Self::Error>;
}
