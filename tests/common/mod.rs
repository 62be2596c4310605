//! Shared test helpers and utilities.
//!
//! Factories for stores, repositories and transactions with sensible defaults.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alloy::primitives::{address, keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use opera_data::{
    Account, AccountType, Contract, MemCache, StakerInfo, StakerInfoSource, Store, Transaction,
};
use opera_repo::{Repository, RepositoryConfig};

/// Token contract used across scenarios.
pub const TOKEN: Address = address!("0000000000000000000000000000000000000abc");

/// Plain contract without a token interface.
pub const VAULT: Address = address!("0000000000000000000000000000000000000def");

/// Sender of all sample transactions.
pub const SENDER: Address = address!("70997970c51812e339d9b73b0245ad59e15ebbf9");

/// Minimal ERC-20 interface.
pub const ERC20_ABI: &str = r#"[
    {"type":"function","name":"transfer","stateMutability":"nonpayable",
     "inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],
     "outputs":[{"name":"","type":"bool"}]},
    {"type":"function","name":"balanceOf","stateMutability":"view",
     "inputs":[{"name":"owner","type":"address"}],
     "outputs":[{"name":"","type":"uint256"}]},
    {"type":"event","name":"Transfer","anonymous":false,
     "inputs":[{"name":"from","type":"address","indexed":true},
               {"name":"to","type":"address","indexed":true},
               {"name":"value","type":"uint256","indexed":false}]}
]"#;

/// Creates an in-memory SQLite Store.
///
/// # Panics
/// Panics if the in-memory database cannot be created (should never happen).
pub fn test_store() -> Arc<Store> {
    Arc::new(Store::new(":memory:").expect("in-memory store should always open"))
}

/// Staker info source stub counting chain round trips.
pub struct StubSource {
    calls: AtomicUsize,
    reply: Option<StakerInfo>,
}

impl StubSource {
    pub fn new(reply: Option<StakerInfo>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StakerInfoSource for StubSource {
    async fn staker_info(&self, _id: U256) -> eyre::Result<Option<StakerInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Repository over the given store with a default cache and an empty source.
pub fn test_repository(store: Arc<Store>) -> Arc<Repository> {
    Arc::new(Repository::new(
        RepositoryConfig::default(),
        store,
        Arc::new(MemCache::default()),
        StubSource::new(None),
    ))
}

/// Registers a contract together with its account record.
pub fn register_contract(store: &Store, address: Address, kind: AccountType, abi: Option<&str>) {
    store
        .insert_account(&Account {
            address,
            account_type: kind,
        })
        .expect("account insert");
    store
        .insert_contract(&Contract {
            address,
            contract_type: kind.as_str().to_string(),
            abi: abi.map(str::to_string),
        })
        .expect("contract insert");
}

/// Call data for `signature` followed by two zero words.
pub fn call_data(signature: &str) -> Bytes {
    let mut input = keccak256(signature)[..4].to_vec();
    input.extend_from_slice(&[0u8; 64]);
    Bytes::from(input)
}

/// Transaction with a hash derived from `n`.
pub fn sample_call(n: u64, to: Option<Address>, input: Bytes) -> Transaction {
    let mut trx = Transaction::new(B256::from(U256::from(n)), SENDER, to, input);
    trx.block_number = Some(1_000 + n);
    trx
}

/// Validator metadata with a name and website.
pub fn sample_staker_info(name: &str) -> StakerInfo {
    StakerInfo {
        name: Some(name.to_string()),
        website: Some(format!("https://{}.example", name.to_lowercase())),
        ..StakerInfo::default()
    }
}
