//! Ordered selector matching with a raw-selector fallback.

use alloy::primitives::hex;

use crate::interface::ContractInterface;

/// Where a call label came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchSource {
    /// The interface stored with the target contract.
    ContractAbi,
    /// A bundled interface of an earlier contract version.
    LegacyAbi,
    /// No interface matched; the label is the raw selector hex.
    RawSelector,
}

/// One step of the matching chain.
#[derive(Clone, Copy, Debug)]
pub enum MatchStrategy<'a> {
    /// JSON ABI stored with the contract, parsed on use.
    ContractAbi(&'a str),
    /// Pre-parsed legacy interface.
    LegacyAbi(&'a ContractInterface),
}

impl MatchStrategy<'_> {
    fn source(&self) -> MatchSource {
        match self {
            MatchStrategy::ContractAbi(_) => MatchSource::ContractAbi,
            MatchStrategy::LegacyAbi(_) => MatchSource::LegacyAbi,
        }
    }

    fn try_match(&self, input: &[u8]) -> Option<String> {
        match self {
            MatchStrategy::ContractAbi(json) => match_function(json, input),
            MatchStrategy::LegacyAbi(iface) => iface.lookup(input).map(|f| f.name.clone()),
        }
    }
}

/// Result of labeling a contract call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallMatch {
    /// Function name, or the 8-character selector hex for raw matches.
    pub function: String,
    /// Strategy that produced the label.
    pub source: MatchSource,
}

/// Matches `input` against a JSON ABI.
///
/// Malformed descriptions are logged and treated as no match.
pub fn match_function(abi_json: &str, input: &[u8]) -> Option<String> {
    let iface = match ContractInterface::parse(abi_json) {
        Ok(iface) => iface,
        Err(err) => {
            tracing::debug!(error = %err, "failed to parse ABI");
            return None;
        }
    };
    iface.lookup(input).map(|f| f.name.clone())
}

/// Lowercase hex of the 4-byte selector, without `0x`.
pub fn raw_selector(input: &[u8]) -> Option<String> {
    input.get(..4).map(hex::encode)
}

/// Tries each strategy in order and falls back to the raw selector.
///
/// Returns `None` only when `input` is too short to carry a selector.
pub fn match_call(input: &[u8], strategies: &[MatchStrategy<'_>]) -> Option<CallMatch> {
    for strategy in strategies {
        if let Some(function) = strategy.try_match(input) {
            return Some(CallMatch {
                function,
                source: strategy.source(),
            });
        }
        tracing::trace!(source = ?strategy.source(), "selector not found");
    }

    raw_selector(input).map(|function| CallMatch {
        function,
        source: MatchSource::RawSelector,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfc::sfc_v1;
    use alloy::primitives::keccak256;

    const TOKEN_ABI: &str = r#"[
        {"type":"function","name":"transfer","stateMutability":"nonpayable",
         "inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],
         "outputs":[{"name":"","type":"bool"}]}
    ]"#;

    fn call(signature: &str) -> Vec<u8> {
        let mut input = keccak256(signature)[..4].to_vec();
        input.extend_from_slice(&[0u8; 32]);
        input
    }

    #[test]
    fn contract_abi_wins_first() {
        let input = call("transfer(address,uint256)");
        let found = match_call(&input, &[MatchStrategy::ContractAbi(TOKEN_ABI)]).unwrap();
        assert_eq!(found.function, "transfer");
        assert_eq!(found.source, MatchSource::ContractAbi);
    }

    #[test]
    fn legacy_abi_is_tried_after_contract_abi() {
        let input = call("withdrawDelegation()");
        let legacy = sfc_v1().unwrap();
        let found = match_call(
            &input,
            &[
                MatchStrategy::ContractAbi(TOKEN_ABI),
                MatchStrategy::LegacyAbi(legacy),
            ],
        )
        .unwrap();
        assert_eq!(found.function, "withdrawDelegation");
        assert_eq!(found.source, MatchSource::LegacyAbi);
    }

    #[test]
    fn malformed_abi_falls_through_to_raw_selector() {
        let input = hex::decode("deadbeef00").unwrap();
        let found = match_call(&input, &[MatchStrategy::ContractAbi("[{oops")]).unwrap();
        assert_eq!(found.function, "deadbeef");
        assert_eq!(found.source, MatchSource::RawSelector);
    }

    #[test]
    fn short_input_has_no_selector() {
        assert_eq!(raw_selector(&[0xde, 0xad, 0xbe]), None);
        assert_eq!(match_call(&[0xde], &[]), None);
    }
}
