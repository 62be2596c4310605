//! opera-abi: contract call decoding by 4-byte function selector.
//!
//! Interfaces are parsed once into a selector table; matching never decodes
//! call arguments, it only labels which function a call targets.

pub mod interface;
pub mod matcher;
pub mod sfc;

pub use interface::{AbiError, ContractInterface, FunctionDescriptor};
pub use matcher::{match_call, match_function, raw_selector, CallMatch, MatchSource, MatchStrategy};
