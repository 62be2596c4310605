//! Type definitions for the off-chain enrichment data model.

use std::fmt;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Classification tag of an on-chain account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Externally owned account.
    Wallet,
    /// Generic smart contract.
    Contract,
    /// The special fee contract governing staking.
    Sfc,
    /// ERC-20 token contract.
    Erc20Token,
    /// ERC-721 NFT contract.
    Erc721Contract,
    /// ERC-1155 multi-token contract.
    Erc1155Contract,
}

impl AccountType {
    /// Tag used in the persistent store.
    pub const fn as_str(self) -> &'static str {
        match self {
            AccountType::Wallet => "wallet",
            AccountType::Contract => "contract",
            AccountType::Sfc => "sfc",
            AccountType::Erc20Token => "ERC20",
            AccountType::Erc721Contract => "ERC721",
            AccountType::Erc1155Contract => "ERC1155",
        }
    }

    /// Parses a stored tag; unknown tags are treated as generic contracts.
    pub fn from_tag(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "wallet" => Self::Wallet,
            "sfc" => Self::Sfc,
            "erc20" => Self::Erc20Token,
            "erc721" => Self::Erc721Contract,
            "erc1155" => Self::Erc1155Contract,
            _ => Self::Contract,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction record enriched with call classification details.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash.
    pub hash: B256,
    /// Block number (None if pending).
    pub block_number: Option<u64>,
    /// Sender address.
    pub from: Address,
    /// Recipient address (None for contract creation).
    pub to: Option<Address>,
    /// Raw call payload; the leading 4 bytes are the function selector.
    pub input: Bytes,
    /// Account type of the call recipient.
    pub target_contract_type: Option<AccountType>,
    /// Decoded function name, or the raw selector hex when undecodable.
    pub target_function_call: Option<String>,
    /// Set when an ERC-20 token contract function was matched.
    pub is_erc20_call: bool,
}

impl Transaction {
    /// Creates an unclassified transaction.
    pub fn new(hash: B256, from: Address, to: Option<Address>, input: Bytes) -> Self {
        Self {
            hash,
            block_number: None,
            from,
            to,
            input,
            target_contract_type: None,
            target_function_call: None,
            is_erc20_call: false,
        }
    }
}

/// Account record as owned by the persistent store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account address.
    pub address: Address,
    /// Authoritative type tag.
    pub account_type: AccountType,
}

/// Smart contract record as owned by the persistent store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Contract address.
    pub address: Address,
    /// Free-form contract type, e.g. `ERC20`.
    pub contract_type: String,
    /// JSON interface description, if the contract was validated.
    pub abi: Option<String>,
}

/// Off-chain validator metadata published through the STI contract.
///
/// The default value is the "empty" record the source reports for unknown stakers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakerInfo {
    /// Validator display name.
    pub name: Option<String>,
    /// Logo image URL.
    pub logo_url: Option<String>,
    /// Validator website.
    pub website: Option<String>,
    /// Contact address.
    pub contact: Option<String>,
}

impl StakerInfo {
    /// True for the empty sentinel record.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
    }
}

/// Partial withdrawal request of a delegation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    /// Request identifier assigned by the SFC.
    pub request_id: U256,
    /// Delegator address.
    pub address: Address,
    /// Validator the stake is withdrawn from.
    pub staker_id: U256,
    /// Amount in Wei.
    pub amount: U256,
    /// Creation time in unix seconds.
    pub created_time: u64,
    /// Finalization time in unix seconds, if already withdrawn.
    pub withdraw_time: Option<u64>,
}

/// Filter of a withdrawal list query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawFilter {
    /// Delegator address.
    pub address: Address,
    /// Restricts the list to one validator when set.
    pub staker_id: Option<U256>,
}

/// One page of withdrawal requests.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequestList {
    /// Requests on this page, newest first.
    pub items: Vec<WithdrawRequest>,
    /// Number of requests matching the filter.
    pub total: u64,
    /// Cursor of the first item on the page.
    pub first: Option<String>,
    /// Cursor of the last item on the page.
    pub last: Option<String>,
    /// No newer requests exist before this page.
    pub is_start: bool,
    /// No older requests exist after this page.
    pub is_end: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_type_tags_parse_case_insensitively() {
        assert_eq!(AccountType::from_tag("erc20"), AccountType::Erc20Token);
        assert_eq!(AccountType::from_tag("ERC20"), AccountType::Erc20Token);
        assert_eq!(AccountType::from_tag("SFC"), AccountType::Sfc);
        assert_eq!(AccountType::from_tag("something"), AccountType::Contract);
        assert_eq!(AccountType::Erc20Token.to_string(), "ERC20");
    }

    #[test]
    fn staker_info_default_is_empty() {
        assert!(StakerInfo::default().is_empty());
        let info = StakerInfo {
            name: Some("validator".to_string()),
            ..StakerInfo::default()
        };
        assert!(!info.is_empty());
    }
}
