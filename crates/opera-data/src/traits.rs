//! Collaborator interfaces consumed by the repository facade.
//!
//! Each concern is a separate capability so the facade and the call queue
//! can be wired against stubs in tests.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use eyre::Result;

use crate::cache::CacheError;
use crate::types::{Account, Contract, StakerInfo, Transaction, WithdrawFilter, WithdrawRequestList};

/// Persistent store owning transactions, accounts, contracts and withdrawals.
pub trait DataStore: Send + Sync {
    /// Loads an account by address.
    fn account(&self, address: &Address) -> Result<Option<Account>>;

    /// Loads a tracked contract by address.
    fn contract(&self, address: &Address) -> Result<Option<Contract>>;

    /// Writes the classification fields of an existing transaction.
    fn update_transaction(&self, trx: &Transaction) -> Result<()>;

    /// Loads one page of withdrawal requests.
    ///
    /// `count` is the page size; a negative value pages backwards from the cursor.
    fn withdrawals(
        &self,
        filter: &WithdrawFilter,
        cursor: Option<&str>,
        count: i32,
    ) -> Result<WithdrawRequestList>;
}

/// Shared in-memory cache of expensive entities.
pub trait EntityCache: Send + Sync {
    /// Stores staker information.
    fn push_staker_info(&self, id: U256, info: &StakerInfo) -> Result<(), CacheError>;

    /// Returns cached staker information, if present and not expired.
    fn pull_staker_info(&self, id: U256) -> Option<StakerInfo>;
}

/// Authoritative source of on-chain staker metadata.
#[async_trait]
pub trait StakerInfoSource: Send + Sync {
    /// Queries staker information; `Ok(None)` when the staker published nothing.
    async fn staker_info(&self, id: U256) -> Result<Option<StakerInfo>>;
}
