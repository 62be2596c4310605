//! Runtime configuration of the repository layer.

use std::time::Duration;

use alloy::primitives::Address;
use opera_abi::sfc::SFC_CONTRACT;
use opera_data::cache::{DEFAULT_EVICTION, DEFAULT_MAX_BYTES};

/// How many contract calls can wait in the classification queue at once.
pub const CONTRACT_CALL_QUEUE_LENGTH: usize = 50_000;

/// Addresses and sizing used by the repository and its workers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Special Fee Contract address; gates the legacy ABI fallback.
    pub sfc_contract: Address,
    /// Staker info contract address.
    pub sti_contract: Address,
    /// Lifetime of in-memory cache entries.
    pub cache_eviction: Duration,
    /// In-memory cache payload budget in bytes.
    pub cache_max_bytes: usize,
    /// Capacity of the contract call queue channel.
    pub call_queue_length: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            sfc_contract: SFC_CONTRACT,
            sti_contract: Address::ZERO,
            cache_eviction: DEFAULT_EVICTION,
            cache_max_bytes: DEFAULT_MAX_BYTES,
            call_queue_length: CONTRACT_CALL_QUEUE_LENGTH,
        }
    }
}
