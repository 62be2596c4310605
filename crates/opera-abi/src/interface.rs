//! Typed contract interfaces keyed by function selector.

use std::collections::HashMap;

use alloy::json_abi::JsonAbi;
use alloy::primitives::Selector;

/// Errors raised while parsing an interface description.
#[derive(Debug, thiserror::Error)]
pub enum AbiError {
    /// The description is blank.
    #[error("interface description is empty")]
    Empty,
    /// The description is not a valid JSON ABI.
    #[error("malformed interface description: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Callable function of a contract interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDescriptor {
    /// Function name, e.g. `transfer`.
    pub name: String,
    /// Canonical signature, e.g. `transfer(address,uint256)`.
    pub signature: String,
}

/// Selector table of a contract interface.
#[derive(Clone, Debug, Default)]
pub struct ContractInterface {
    functions: HashMap<Selector, FunctionDescriptor>,
}

impl ContractInterface {
    /// Parses a JSON ABI into a selector table.
    ///
    /// # Errors
    /// Returns [`AbiError`] if the description is blank or not a JSON ABI.
    pub fn parse(json: &str) -> Result<Self, AbiError> {
        if json.trim().is_empty() {
            return Err(AbiError::Empty);
        }
        let abi: JsonAbi = serde_json::from_str(json)?;
        Ok(Self::from_abi(&abi))
    }

    /// Builds the selector table of an already parsed ABI.
    pub fn from_abi(abi: &JsonAbi) -> Self {
        let functions = abi
            .functions()
            .map(|function| {
                (
                    function.selector(),
                    FunctionDescriptor {
                        name: function.name.clone(),
                        signature: function.signature(),
                    },
                )
            })
            .collect();
        Self { functions }
    }

    /// Finds the function whose selector equals the leading 4 bytes of `input`.
    pub fn lookup(&self, input: &[u8]) -> Option<&FunctionDescriptor> {
        if input.len() < 4 {
            return None;
        }
        self.functions.get(&Selector::from_slice(&input[..4]))
    }

    /// Number of callable functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True if the interface declares no functions.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
