//! In-memory [`StorageHost`] modelling a small Solidity contract.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Mutex},
};

use alloy_primitives::{address, keccak256, Address, FixedBytes, B256, U256};
use alloy_sol_types::SolValue;
use stdstore::{
    evm::mapping_slot,
    storage::{codec, models::selector_of},
    CallOutcome, StorageHost,
};
use tracing::{
    field::{Field, Visit},
    Event, Level, Subscriber,
};
use tracing_subscriber::{layer, Layer};

pub const STORAGE_TEST: Address = address!("5615dEB798BB3E4dFa0139dFa1b3D433Cc23b72f");

pub const EXISTS_SLOT: u64 = 0;
pub const MAP_ADDR_SLOT: u64 = 1;
pub const MAP_UINT_SLOT: u64 = 2;
pub const HIDDEN_SLOT: u64 = 3;
pub const BASIC_SLOT: u64 = 4;
pub const DEEP_MAP_SLOT: u64 = 6;
pub const PACKED_SLOT: u64 = 7;
pub const STR_SLOT: u64 = 8;
pub const MAP_BYTES_SLOT: u64 = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct MockHostError(pub String);

/// Storage view handed to getters; records every read while recording is armed.
pub struct Context<'a> {
    storage: &'a HashMap<U256, B256>,
    reads: Option<&'a mut Vec<U256>>,
}

impl Context<'_> {
    pub fn sload(&mut self, slot: U256) -> B256 {
        if let Some(reads) = self.reads.as_mut() {
            reads.push(slot);
        }
        self.storage
            .get(&slot)
            .copied()
            .unwrap_or_default()
    }

    pub fn sload_u256(&mut self, slot: U256) -> U256 {
        U256::from_be_bytes(self.sload(slot).0)
    }

    /// Reads a `bytes`/`string` value the way solc does: base slot first, then the data run.
    pub fn sload_bytes(&mut self, base: U256) -> Vec<u8> {
        let base_word = self.sload(base);
        if !codec::is_long_form(&base_word) {
            return codec::unpack_inline(&base_word).unwrap_or_default();
        }
        let needed = codec::footprint(&base_word).unwrap_or_default();
        let start = codec::data_slot(base);
        let data: Vec<B256> = (0..needed)
            .map(|offset| self.sload(start + U256::from(offset)))
            .collect();
        codec::unpack_multi(&base_word, &data).unwrap_or_default()
    }
}

/// A getter: receives the storage view and the ABI encoded arguments, returns the ABI encoded
/// result.
pub type Getter = fn(&mut Context<'_>, &[B256]) -> Vec<u8>;

#[derive(Default)]
pub struct MockHost {
    storage: HashMap<Address, HashMap<U256, B256>>,
    getters: HashMap<Address, HashMap<FixedBytes<4>, Getter>>,
    recording: Option<HashMap<Address, Vec<U256>>>,
    /// Makes every call after this many calls fail with a host error.
    pub fail_after: Option<usize>,
    pub calls: usize,
    pub loads: usize,
    pub stores: usize,
}

impl MockHost {
    pub fn register(&mut self, target: Address, signature: &str, getter: Getter) {
        self.getters
            .entry(target)
            .or_default()
            .insert(selector_of(signature), getter);
    }

    pub fn set(&mut self, target: Address, slot: U256, value: B256) {
        self.storage
            .entry(target)
            .or_default()
            .insert(slot, value);
    }

    pub fn get(&self, target: Address, slot: U256) -> B256 {
        self.storage
            .get(&target)
            .and_then(|storage| storage.get(&slot))
            .copied()
            .unwrap_or_default()
    }

    /// Number of host operations performed so far.
    pub fn operations(&self) -> usize {
        self.calls + self.loads + self.stores
    }
}

impl StorageHost for MockHost {
    type Error = MockHostError;

    fn call(&mut self, target: Address, calldata: &[u8]) -> Result<CallOutcome, Self::Error> {
        self.calls += 1;
        if self
            .fail_after
            .is_some_and(|limit| self.calls > limit)
        {
            return Err(MockHostError("call limit reached".to_string()));
        }
        if calldata.len() < 4 {
            return Ok(CallOutcome::new(false, Vec::new()));
        }
        let selector = FixedBytes::<4>::from_slice(&calldata[..4]);
        let Some(getter) = self
            .getters
            .get(&target)
            .and_then(|getters| getters.get(&selector))
            .copied()
        else {
            return Ok(CallOutcome::new(false, Vec::new()));
        };
        let args: Vec<B256> = calldata[4..]
            .chunks(32)
            .map(B256::left_padding_from)
            .collect();

        let empty = HashMap::new();
        let storage = self
            .storage
            .get(&target)
            .unwrap_or(&empty);
        let reads = self
            .recording
            .as_mut()
            .map(|recording| recording.entry(target).or_default());
        let mut context = Context { storage, reads };
        let output = getter(&mut context, &args);
        Ok(CallOutcome::new(true, output))
    }

    fn record(&mut self) {
        self.recording = Some(HashMap::new());
    }

    fn accesses(&mut self, target: Address) -> (Vec<U256>, Vec<U256>) {
        let reads = self
            .recording
            .take()
            .and_then(|mut recording| recording.remove(&target))
            .unwrap_or_default();
        (reads, Vec::new())
    }

    fn load(&mut self, target: Address, slot: U256) -> Result<B256, Self::Error> {
        self.loads += 1;
        Ok(self.get(target, slot))
    }

    fn store(&mut self, target: Address, slot: U256, value: B256) -> Result<(), Self::Error> {
        self.stores += 1;
        self.set(target, slot, value);
        Ok(())
    }
}

fn word(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}

fn slot(number: u64) -> U256 {
    U256::from(number)
}

/// A host with the test contract deployed at [`STORAGE_TEST`].
///
/// Layout:
///
/// | slot | variable                                                   |
/// |------|------------------------------------------------------------|
/// | 0    | `uint256 exists = 1`                                       |
/// | 1    | `mapping(address => uint256) map_addr`                     |
/// | 2    | `mapping(uint256 => uint256) map_uint`                     |
/// | 3    | `uint256 hidden`, only observable through `hashed()`       |
/// | 4, 5 | `UnpackedStruct basic = { a: 1337, b: 1337 }`              |
/// | 6    | `mapping(address => mapping(address => uint256)) deep_map` |
/// | 7    | `uint128 tA; uint128 tB` packed, `tB` set                  |
/// | 8    | `string str`                                               |
/// | 9    | `mapping(uint256 => bytes) map_bytes`                      |
pub fn storage_test_host() -> MockHost {
    let mut host = MockHost::default();
    host.set(STORAGE_TEST, slot(EXISTS_SLOT), word(U256::from(1)));
    host.set(STORAGE_TEST, slot(BASIC_SLOT), word(U256::from(1337)));
    host.set(STORAGE_TEST, slot(BASIC_SLOT + 1), word(U256::from(1337)));
    host.set(STORAGE_TEST, slot(HIDDEN_SLOT), word(U256::from(12)));
    // tA = 0, tB = 3
    host.set(STORAGE_TEST, slot(PACKED_SLOT), word(U256::from(3) << 128));

    host.register(STORAGE_TEST, "exists()", |ctx, _| {
        ctx.sload(slot(EXISTS_SLOT))
            .to_vec()
    });
    host.register(STORAGE_TEST, "exists_twice()", |ctx, _| {
        ctx.sload(slot(EXISTS_SLOT));
        ctx.sload(slot(EXISTS_SLOT))
            .to_vec()
    });
    host.register(STORAGE_TEST, "map_addr(address)", |ctx, args| {
        ctx.sload(mapping_slot(&args[..1], slot(MAP_ADDR_SLOT)))
            .to_vec()
    });
    host.register(STORAGE_TEST, "map_uint(uint256)", |ctx, args| {
        ctx.sload(mapping_slot(&args[..1], slot(MAP_UINT_SLOT)))
            .to_vec()
    });
    host.register(STORAGE_TEST, "hashed()", |ctx, _| {
        let exists = ctx.sload(slot(EXISTS_SLOT));
        let hidden = ctx.sload(slot(HIDDEN_SLOT));
        keccak256([exists.as_slice(), hidden.as_slice()].concat()).to_vec()
    });
    host.register(STORAGE_TEST, "basic()", |ctx, _| {
        let a = ctx.sload_u256(slot(BASIC_SLOT));
        let b = ctx.sload_u256(slot(BASIC_SLOT + 1));
        (a, b).abi_encode_params()
    });
    host.register(STORAGE_TEST, "deep_map(address,address)", |ctx, args| {
        ctx.sload(mapping_slot(&args[..2], slot(DEEP_MAP_SLOT)))
            .to_vec()
    });
    host.register(STORAGE_TEST, "tA()", |ctx, _| {
        let packed = ctx.sload_u256(slot(PACKED_SLOT));
        (packed & U256::from(u128::MAX)).abi_encode()
    });
    host.register(STORAGE_TEST, "str()", |ctx, _| {
        String::from_utf8_lossy(&ctx.sload_bytes(slot(STR_SLOT)))
            .into_owned()
            .abi_encode()
    });
    host.register(STORAGE_TEST, "guarded_str()", |ctx, _| {
        // require(exists != 0)
        if ctx.sload(slot(EXISTS_SLOT)).is_zero() {
            return Vec::new();
        }
        String::from_utf8_lossy(&ctx.sload_bytes(slot(STR_SLOT)))
            .into_owned()
            .abi_encode()
    });
    host.register(STORAGE_TEST, "map_bytes(uint256)", |ctx, args| {
        let base = mapping_slot(&args[..1], slot(MAP_BYTES_SLOT));
        alloy_primitives::Bytes::from(ctx.sload_bytes(base)).abi_encode()
    });
    host.register(STORAGE_TEST, "no_storage()", |_, _| U256::from(42).abi_encode());
    host
}

/// Writes `value` at `base` with the storage encoding of `bytes`/`string`.
pub fn set_bytes(host: &mut MockHost, target: Address, base: U256, value: &[u8]) {
    let packed = codec::pack(value);
    host.set(target, base, packed.base);
    let start = codec::data_slot(base);
    for (offset, data) in packed.data.into_iter().enumerate() {
        host.set(target, start + U256::from(offset), data);
    }
}

/// Calls a getter of [`STORAGE_TEST`] outside of any recording and returns its output.
pub fn call(host: &mut MockHost, signature: &str, args: &[B256]) -> Vec<u8> {
    let mut calldata = selector_of(signature).to_vec();
    for arg in args {
        calldata.extend_from_slice(arg.as_slice());
    }
    host.call(STORAGE_TEST, &calldata)
        .expect("mock calls don't fail")
        .output
        .to_vec()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Collects the messages of all `WARN` events emitted while installed.
#[derive(Clone, Default)]
pub struct CapturedWarnings(Arc<Mutex<Vec<String>>>);

impl CapturedWarnings {
    pub fn messages(&self) -> Vec<String> {
        self.0
            .lock()
            .expect("lock poisoned")
            .clone()
    }
}

impl<S: Subscriber> Layer<S> for CapturedWarnings {
    fn on_event(&self, event: &Event<'_>, _ctx: layer::Context<'_, S>) {
        if *event.metadata().level() != Level::WARN {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.0
            .lock()
            .expect("lock poisoned")
            .push(visitor.0);
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}
