use alloy_primitives::{Address, Bytes, B256, U256};
use revm::{
    db::{CacheDB, EmptyDB},
    inspector_handle_register,
    primitives::{
        AccountInfo, BlockEnv, Bytecode, EVMError, EVMResult, ExecutionResult, SpecId,
        TransactTo, TxEnv,
    },
    DatabaseRef, Evm,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{
    host::{CallOutcome, StorageHost},
    recorder::{RecordAccess, StorageRecorder},
};

/// An error raised by the revm backend itself, as opposed to a call that reverted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RevmHostError {
    /// Something went wrong while reading from the underlying database.
    #[error("Storage error: {0}")]
    Database(String),
    /// The transaction could not be executed at all.
    #[error("Transaction error: {0}")]
    Transaction(String),
}

/// Environment used for every call executed by a [`RevmHost`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevmHostConfig {
    /// Address of the sending account
    pub caller: Address,
    /// Limit of gas to be used by each call
    pub gas_limit: u64,
    /// The block number calls are executed at
    pub block_number: u64,
    /// The timestamp calls are executed at
    pub timestamp: u64,
}

impl Default for RevmHostConfig {
    fn default() -> Self {
        Self { caller: Address::ZERO, gas_limit: 8_000_000, block_number: 0, timestamp: 0 }
    }
}

/// A [`StorageHost`] executing calls with revm on top of a [`CacheDB`].
///
/// Calls never commit: the state changes they make are dropped with the transaction result, so
/// the only way to mutate storage is [`StorageHost::store`].
#[derive(Debug, Clone)]
pub struct RevmHost<D = EmptyDB> {
    pub db: CacheDB<D>,
    pub config: RevmHostConfig,
    accesses: Option<RecordAccess>,
}

impl RevmHost<EmptyDB> {
    /// Creates a host over an empty in-memory state.
    pub fn in_memory(config: RevmHostConfig) -> Self {
        Self::new(EmptyDB::default(), config)
    }
}

impl<D: DatabaseRef> RevmHost<D>
where
    D::Error: std::fmt::Debug,
{
    pub fn new(db: D, config: RevmHostConfig) -> Self {
        Self { db: CacheDB::new(db), config, accesses: None }
    }

    /// Places runtime bytecode at `address`.
    pub fn deploy(&mut self, address: Address, code: Bytes) {
        let code = Bytecode::new_raw(code);
        let info = AccountInfo::new(U256::ZERO, 0, code.hash_slow(), code);
        self.db
            .insert_account_info(address, info);
    }
}

impl<D: DatabaseRef> StorageHost for RevmHost<D>
where
    D::Error: std::fmt::Debug,
{
    type Error = RevmHostError;

    fn call(&mut self, target: Address, calldata: &[u8]) -> Result<CallOutcome, Self::Error> {
        let tx_env = TxEnv {
            caller: self.config.caller,
            gas_limit: self.config.gas_limit,
            transact_to: TransactTo::Call(target),
            data: Bytes::copy_from_slice(calldata),
            ..Default::default()
        };

        let block_env = BlockEnv {
            number: U256::from(self.config.block_number),
            timestamp: U256::from(self.config.timestamp),
            ..Default::default()
        };

        let mut recorder = StorageRecorder { accesses: self.accesses.take() };
        let evm_result = {
            let mut vm = Evm::builder()
                .with_spec_id(SpecId::CANCUN)
                .with_ref_db(&self.db)
                .with_block_env(block_env)
                .with_tx_env(tx_env)
                .with_external_context(&mut recorder)
                .append_handler_register(inspector_handle_register)
                .build();

            debug!(%target, calldata = %hex::encode(calldata), "Executing call");
            vm.transact()
        };
        self.accesses = recorder.accesses;

        interpret_evm_result(evm_result)
    }

    fn record(&mut self) {
        self.accesses = Some(RecordAccess::default());
    }

    fn accesses(&mut self, target: Address) -> (Vec<U256>, Vec<U256>) {
        self.accesses
            .take()
            .map(|mut accesses| accesses.take(&target))
            .unwrap_or_default()
    }

    fn load(&mut self, target: Address, slot: U256) -> Result<B256, Self::Error> {
        let value = self
            .db
            .storage_ref(target, slot)
            .map_err(|err| RevmHostError::Database(format!("{err:?}")))?;
        Ok(B256::from(value.to_be_bytes::<32>()))
    }

    fn store(&mut self, target: Address, slot: U256, value: B256) -> Result<(), Self::Error> {
        self.db
            .insert_account_storage(target, slot, U256::from_be_bytes(value.0))
            .map_err(|err| RevmHostError::Database(format!("{err:?}")))
    }
}

/// Converts the result of a transaction into a [`CallOutcome`].
///
/// Reverts and halts are regular, unsuccessful outcomes. Only failures to execute the transaction
/// at all are returned as errors.
fn interpret_evm_result<DBError: std::fmt::Debug>(
    evm_result: EVMResult<DBError>,
) -> Result<CallOutcome, RevmHostError> {
    match evm_result {
        Ok(result_and_state) => match result_and_state.result {
            ExecutionResult::Success { output, .. } => {
                Ok(CallOutcome::new(true, output.into_data()))
            }
            ExecutionResult::Revert { output, .. } => Ok(CallOutcome::new(false, output)),
            ExecutionResult::Halt { reason, .. } => {
                debug!(?reason, "Call halted");
                Ok(CallOutcome::new(false, Bytes::new()))
            }
        },
        Err(EVMError::Database(db_error)) => {
            Err(RevmHostError::Database(format!("{db_error:?}")))
        }
        Err(err) => Err(RevmHostError::Transaction(format!("{err:?}"))),
    }
}
