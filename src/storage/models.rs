use alloy_primitives::{keccak256, Address, FixedBytes, B256, I256, U256};

/// Values that occupy exactly one 32 byte word, both as storage content and as ABI encoded
/// arguments.
pub trait IntoStorageWord {
    fn into_storage_word(self) -> B256;
}

impl IntoStorageWord for B256 {
    fn into_storage_word(self) -> B256 {
        self
    }
}

impl IntoStorageWord for U256 {
    fn into_storage_word(self) -> B256 {
        B256::from(self.to_be_bytes::<32>())
    }
}

impl IntoStorageWord for I256 {
    fn into_storage_word(self) -> B256 {
        self.into_raw()
            .into_storage_word()
    }
}

impl IntoStorageWord for u64 {
    fn into_storage_word(self) -> B256 {
        U256::from(self).into_storage_word()
    }
}

impl IntoStorageWord for Address {
    fn into_storage_word(self) -> B256 {
        self.into_word()
    }
}

impl IntoStorageWord for bool {
    fn into_storage_word(self) -> B256 {
        U256::from(self as u8).into_storage_word()
    }
}

/// One mapping key or array index, normalised to its 32 byte ABI encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupKey(pub B256);

impl LookupKey {
    pub fn new(value: impl IntoStorageWord) -> Self {
        Self(value.into_storage_word())
    }
}

/// Identifies one cached resolution: the same getter called with the same keys, looking at the
/// same word of the returned data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub target: Address,
    pub selector: FixedBytes<4>,
    pub key_hash: B256,
    pub depth: usize,
}

/// A fully specified storage lookup.
///
/// Keys are passed to the getter in order, so for a nested mapping the outermost key comes
/// first. `depth` selects which 32 byte word of the returned data is of interest, e.g. the
/// second field of a struct returned by a public getter has depth 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub target: Address,
    pub selector: FixedBytes<4>,
    pub keys: Vec<LookupKey>,
    pub depth: usize,
    /// Forget a freshly discovered slot once the request has been served.
    pub one_shot: bool,
}

impl ProbeRequest {
    pub fn new(target: Address, selector: impl Into<FixedBytes<4>>) -> Self {
        Self { target, selector: selector.into(), keys: Vec::new(), depth: 0, one_shot: false }
    }

    /// Creates a request for the function with the given signature, e.g. `balanceOf(address)`.
    pub fn from_sig(target: Address, signature: &str) -> Self {
        Self::new(target, selector_of(signature))
    }

    pub fn with_key(mut self, key: impl IntoStorageWord) -> Self {
        self.keys.push(LookupKey::new(key));
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    /// The selector followed by the ABI encoded keys.
    pub fn calldata(&self) -> Vec<u8> {
        let mut calldata = Vec::with_capacity(4 + 32 * self.keys.len());
        calldata.extend_from_slice(self.selector.as_slice());
        for key in &self.keys {
            calldata.extend_from_slice(key.0.as_slice());
        }
        calldata
    }

    pub fn slot_key(&self) -> SlotKey {
        let encoded_keys: Vec<u8> = self
            .keys
            .iter()
            .flat_map(|key| key.0 .0)
            .collect();
        SlotKey {
            target: self.target,
            selector: self.selector,
            key_hash: keccak256(encoded_keys),
            depth: self.depth,
        }
    }
}

/// Computes the 4 byte selector of a function signature.
pub fn selector_of(signature: &str) -> FixedBytes<4> {
    FixedBytes::from_slice(&keccak256(signature.as_bytes())[..4])
}

/// The storage slot backing a getter's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedSlot {
    pub slot: U256,
    /// Whether `slot` is the base slot of a `bytes` or `string` value.
    pub is_dynamic: bool,
}

impl ResolvedSlot {
    pub fn fixed(slot: U256) -> Self {
        Self { slot, is_dynamic: false }
    }

    pub fn dynamic(slot: U256) -> Self {
        Self { slot, is_dynamic: true }
    }
}
