//! Special Fee Contract (SFC) interface history.
//!
//! The staking contract was upgraded in place, so calls recorded before an
//! upgrade may target functions the current ABI no longer declares. The
//! first-generation interface is bundled here as a matching fallback.

use std::sync::OnceLock;

use alloy::primitives::{address, Address};

use crate::interface::ContractInterface;

/// Well-known address of the SFC on the Opera network.
pub const SFC_CONTRACT: Address = address!("FC00FACE00000000000000000000000000000000");

/// Callable part of the first-generation SFC interface.
pub const SFC_V1_ABI: &str = r#"[
  {"type":"function","name":"createStake","stateMutability":"payable",
   "inputs":[{"name":"metadata","type":"bytes"}],"outputs":[]},
  {"type":"function","name":"createStakeWithAddresses","stateMutability":"payable",
   "inputs":[{"name":"dagAdrress","type":"address"},{"name":"sfcAddress","type":"address"},{"name":"metadata","type":"bytes"}],"outputs":[]},
  {"type":"function","name":"increaseStake","stateMutability":"payable",
   "inputs":[],"outputs":[]},
  {"type":"function","name":"updateStakerMetadata","stateMutability":"nonpayable",
   "inputs":[{"name":"metadata","type":"bytes"}],"outputs":[]},
  {"type":"function","name":"updateStakerSfcAddress","stateMutability":"nonpayable",
   "inputs":[{"name":"newSfc","type":"address"}],"outputs":[]},
  {"type":"function","name":"createDelegation","stateMutability":"payable",
   "inputs":[{"name":"to","type":"uint256"}],"outputs":[]},
  {"type":"function","name":"claimDelegationRewards","stateMutability":"nonpayable",
   "inputs":[{"name":"maxEpochs","type":"uint256"}],"outputs":[]},
  {"type":"function","name":"claimValidatorRewards","stateMutability":"nonpayable",
   "inputs":[{"name":"maxEpochs","type":"uint256"}],"outputs":[]},
  {"type":"function","name":"prepareToWithdrawStake","stateMutability":"nonpayable",
   "inputs":[],"outputs":[]},
  {"type":"function","name":"prepareToWithdrawStakePartial","stateMutability":"nonpayable",
   "inputs":[{"name":"wrID","type":"uint256"},{"name":"amount","type":"uint256"}],"outputs":[]},
  {"type":"function","name":"withdrawStake","stateMutability":"nonpayable",
   "inputs":[],"outputs":[]},
  {"type":"function","name":"prepareToWithdrawDelegation","stateMutability":"nonpayable",
   "inputs":[],"outputs":[]},
  {"type":"function","name":"prepareToWithdrawDelegationPartial","stateMutability":"nonpayable",
   "inputs":[{"name":"wrID","type":"uint256"},{"name":"amount","type":"uint256"}],"outputs":[]},
  {"type":"function","name":"withdrawDelegation","stateMutability":"nonpayable",
   "inputs":[],"outputs":[]},
  {"type":"function","name":"partialWithdrawByRequest","stateMutability":"nonpayable",
   "inputs":[{"name":"wrID","type":"uint256"}],"outputs":[]},
  {"type":"function","name":"lockUpStake","stateMutability":"nonpayable",
   "inputs":[{"name":"lockDuration","type":"uint256"}],"outputs":[]},
  {"type":"function","name":"lockUpDelegation","stateMutability":"nonpayable",
   "inputs":[{"name":"lockDuration","type":"uint256"},{"name":"toStakerID","type":"uint256"}],"outputs":[]},
  {"type":"function","name":"stakersNum","stateMutability":"view",
   "inputs":[],"outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"stakersLastID","stateMutability":"view",
   "inputs":[],"outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"delegationsNum","stateMutability":"view",
   "inputs":[],"outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"currentEpoch","stateMutability":"view",
   "inputs":[],"outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"getStakerID","stateMutability":"view",
   "inputs":[{"name":"addr","type":"address"}],"outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"calcDelegationRewards","stateMutability":"view",
   "inputs":[{"name":"delegator","type":"address"},{"name":"_fromEpoch","type":"uint256"},{"name":"maxEpochs","type":"uint256"}],
   "outputs":[{"name":"","type":"uint256"},{"name":"","type":"uint256"},{"name":"","type":"uint256"}]},
  {"type":"function","name":"calcValidatorRewards","stateMutability":"view",
   "inputs":[{"name":"stakerID","type":"uint256"},{"name":"_fromEpoch","type":"uint256"},{"name":"maxEpochs","type":"uint256"}],
   "outputs":[{"name":"","type":"uint256"},{"name":"","type":"uint256"},{"name":"","type":"uint256"}]}
]"#;

static SFC_V1: OnceLock<Option<ContractInterface>> = OnceLock::new();

/// The first-generation SFC interface, parsed on first use.
pub fn sfc_v1() -> Option<&'static ContractInterface> {
    SFC_V1
        .get_or_init(|| match ContractInterface::parse(SFC_V1_ABI) {
            Ok(iface) => Some(iface),
            Err(err) => {
                tracing::error!(error = %err, "bundled SFC v1 interface is invalid");
                None
            }
        })
        .as_ref()
}
