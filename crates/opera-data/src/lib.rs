//! opera-data crate
//!
//! Data model and the collaborators behind the repository facade:
//! SQLite persistent store, in-memory cache and the STI staker source.

pub mod cache;
pub mod source;
pub mod store;
pub mod traits;
pub mod types;

pub use cache::{CacheError, MemCache};
pub use source::RpcStakerSource;
pub use store::Store;
pub use traits::{DataStore, EntityCache, StakerInfoSource};
pub use types::{
    Account, AccountType, Contract, StakerInfo, Transaction, WithdrawFilter, WithdrawRequest,
    WithdrawRequestList,
};
