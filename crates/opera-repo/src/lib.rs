//! opera-repo crate
//!
//! Tiered repository facade over cache, persistent store and the chain,
//! plus the asynchronous contract call classification queue.

pub mod config;
pub mod queue;
pub mod repository;

pub use config::RepositoryConfig;
pub use queue::{
    is_likely_contract_call, CallOutcome, CallQueueContext, ContractCallQueue, QueueStats,
};
pub use repository::Repository;
