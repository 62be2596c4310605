//! Repository facade used by resolvers and workers.
//!
//! Cacheable entities are read cache first, then from the authoritative
//! source, with write-back into the cache. Store-owned records go straight
//! to the persistent store.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use eyre::{Context, Result};
use opera_data::{
    Account, CacheError, Contract, DataStore, EntityCache, StakerInfo, StakerInfoSource,
    Transaction, WithdrawFilter, WithdrawRequestList,
};

use crate::config::RepositoryConfig;

pub struct Repository {
    cfg: RepositoryConfig,
    store: Arc<dyn DataStore>,
    cache: Arc<dyn EntityCache>,
    source: Arc<dyn StakerInfoSource>,
}

impl Repository {
    /// Wires the facade over its collaborators.
    pub fn new(
        cfg: RepositoryConfig,
        store: Arc<dyn DataStore>,
        cache: Arc<dyn EntityCache>,
        source: Arc<dyn StakerInfoSource>,
    ) -> Self {
        Self {
            cfg,
            store,
            cache,
            source,
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.cfg
    }

    /// Tracked contract at the given address.
    pub fn contract(&self, addr: &Address) -> Result<Option<Contract>> {
        self.store
            .contract(addr)
            .wrap_err_with(|| format!("failed to load contract {}", addr))
    }

    /// Account at the given address.
    pub fn account(&self, addr: &Address) -> Result<Option<Account>> {
        self.store
            .account(addr)
            .wrap_err_with(|| format!("failed to load account {}", addr))
    }

    /// Persists the classification fields of a transaction.
    pub fn transaction_update(&self, trx: &Transaction) -> Result<()> {
        self.store.update_transaction(trx)
    }

    /// Queries the authoritative source for staker information, bypassing the cache.
    ///
    /// The result is always written back to the cache, including the empty
    /// record for unknown stakers, so repeated misses do not reach the chain.
    ///
    /// # Errors
    /// Returns the source error if the chain could not be queried.
    pub async fn pull_staker_info(&self, id: U256) -> Result<StakerInfo> {
        let info = self.source.staker_info(id).await?.unwrap_or_default();

        // a cache failure must not hide the fresh value
        let _ = self.store_staker_info(id, &info);
        Ok(info)
    }

    /// Keeps staker information in the in-memory cache.
    pub fn store_staker_info(&self, id: U256, info: &StakerInfo) -> Result<(), CacheError> {
        self.cache.push_staker_info(id, info).map_err(|err| {
            tracing::error!(staker_id = %id, error = %err, "staker info can not be kept");
            err
        })
    }

    /// Best-effort staker information lookup.
    ///
    /// Returns `None` for stakers without published info and when the source
    /// is unreachable; errors are logged, never surfaced.
    pub async fn retrieve_staker_info(&self, id: U256) -> Option<StakerInfo> {
        if let Some(info) = self.cache.pull_staker_info(id) {
            tracing::trace!(staker_id = %id, "staker info cache hit");
            return Some(info).filter(|info| !info.is_empty());
        }

        match self.pull_staker_info(id).await {
            Ok(info) if !info.is_empty() => Some(info),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(staker_id = %id, error = %err, "staker info not available");
                None
            }
        }
    }

    /// Withdraw requests of a delegator, optionally limited to one staker.
    ///
    /// Always served by the persistent store so new requests show up at once.
    pub fn withdraw_requests(
        &self,
        addr: &Address,
        staker_id: Option<U256>,
        cursor: Option<&str>,
        count: i32,
    ) -> Result<WithdrawRequestList> {
        match staker_id {
            Some(id) => {
                tracing::debug!(address = %addr, staker_id = %id, "loading withdraw requests")
            }
            None => tracing::debug!(address = %addr, "loading withdraw requests to any validator"),
        }

        let filter = WithdrawFilter {
            address: *addr,
            staker_id,
        };
        self.store
            .withdrawals(&filter, cursor, count)
            .wrap_err_with(|| format!("failed to load withdraw requests of {}", addr))
    }

    /// True if the address is the Special Fee Contract.
    pub fn is_sfc_contract(&self, addr: &Address) -> bool {
        *addr == self.cfg.sfc_contract
    }

    /// True if the address is the staker info contract.
    pub fn is_sti_contract(&self, addr: &Address) -> bool {
        *addr == self.cfg.sti_contract
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use async_trait::async_trait;
    use opera_data::{MemCache, Store};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source stub counting how often the chain is asked.
    struct CountingSource {
        calls: AtomicUsize,
        reply: Option<StakerInfo>,
        fail: bool,
    }

    impl CountingSource {
        fn new(reply: Option<StakerInfo>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(None)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StakerInfoSource for CountingSource {
        async fn staker_info(&self, _id: U256) -> Result<Option<StakerInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                eyre::bail!("connection refused");
            }
            Ok(self.reply.clone())
        }
    }

    fn validator() -> StakerInfo {
        StakerInfo {
            name: Some("Validator One".to_string()),
            website: Some("https://validator.one".to_string()),
            ..StakerInfo::default()
        }
    }

    fn repo_with(source: Arc<CountingSource>, cache: Arc<MemCache>) -> Repository {
        let store = Arc::new(Store::new(":memory:").expect("in-memory store should always open"));
        Repository::new(RepositoryConfig::default(), store, cache, source)
    }

    #[tokio::test]
    async fn second_retrieve_is_served_from_cache() {
        let source = Arc::new(CountingSource::new(Some(validator())));
        let repo = repo_with(source.clone(), Arc::new(MemCache::default()));

        assert_eq!(repo.retrieve_staker_info(U256::from(1)).await, Some(validator()));
        assert_eq!(repo.retrieve_staker_info(U256::from(1)).await, Some(validator()));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn unknown_staker_sentinel_absorbs_repeated_misses() {
        let source = Arc::new(CountingSource::new(None));
        let cache = Arc::new(MemCache::default());
        let repo = repo_with(source.clone(), cache.clone());

        assert_eq!(repo.retrieve_staker_info(U256::from(7)).await, None);
        assert_eq!(repo.retrieve_staker_info(U256::from(7)).await, None);
        assert_eq!(source.calls(), 1);
        assert_eq!(
            cache.pull_staker_info(U256::from(7)),
            Some(StakerInfo::default())
        );
    }

    #[tokio::test]
    async fn source_errors_are_not_surfaced_by_retrieve() {
        let source = Arc::new(CountingSource::failing());
        let cache = Arc::new(MemCache::default());
        let repo = repo_with(source.clone(), cache.clone());

        assert_eq!(repo.retrieve_staker_info(U256::from(3)).await, None);
        assert!(repo.pull_staker_info(U256::from(3)).await.is_err());
        assert!(cache.is_empty(), "errors are not cached");
    }

    #[tokio::test]
    async fn pull_bypasses_cache() {
        let source = Arc::new(CountingSource::new(Some(validator())));
        let repo = repo_with(source.clone(), Arc::new(MemCache::default()));

        repo.store_staker_info(U256::from(1), &StakerInfo::default())
            .unwrap();
        assert_eq!(repo.pull_staker_info(U256::from(1)).await.unwrap(), validator());
        assert_eq!(source.calls(), 1);
        assert_eq!(repo.retrieve_staker_info(U256::from(1)).await, Some(validator()));
    }

    #[tokio::test]
    async fn cache_failure_does_not_block_pull() {
        let source = Arc::new(CountingSource::new(Some(validator())));
        let repo = repo_with(
            source.clone(),
            Arc::new(MemCache::new(std::time::Duration::from_secs(60), 1)),
        );

        assert!(repo
            .store_staker_info(U256::from(1), &validator())
            .is_err());
        assert_eq!(repo.pull_staker_info(U256::from(1)).await.unwrap(), validator());
    }

    #[test]
    fn well_known_contracts_match_by_address() {
        let cfg = RepositoryConfig {
            sti_contract: address!("f6d2e4b6f3a6e0f4b5d0a0a0000000000000abcd"),
            ..RepositoryConfig::default()
        };
        let repo = Repository::new(
            cfg.clone(),
            Arc::new(Store::new(":memory:").unwrap()),
            Arc::new(MemCache::default()),
            Arc::new(CountingSource::new(None)),
        );

        assert!(repo.is_sfc_contract(&address!("fc00face00000000000000000000000000000000")));
        assert!(!repo.is_sfc_contract(&cfg.sti_contract));
        assert!(repo.is_sti_contract(&cfg.sti_contract));
    }
}
