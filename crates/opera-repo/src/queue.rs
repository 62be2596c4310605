//! Contract call classification queue.
//!
//! A single worker drains a bounded channel of transactions in delivery
//! order. For each call it resolves the target contract, labels the invoked
//! function and writes the enriched transaction back to the store. Nothing
//! here is fatal: every failure degrades to a log line and a skipped or
//! generically labeled transaction, so the worker stays alive until stopped.

use std::sync::Arc;

use alloy::primitives::Address;
use opera_abi::sfc::sfc_v1;
use opera_abi::{match_call, CallMatch, MatchSource, MatchStrategy};
use opera_data::{AccountType, Contract, Transaction};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::repository::Repository;

/// Contract type tag of fungible token contracts.
const TOKEN_STANDARD_TYPE: &str = AccountType::Erc20Token.as_str();

/// Everything the worker needs from its owner.
pub struct CallQueueContext {
    /// Receiving side of the bounded call channel.
    pub receiver: mpsc::Receiver<Transaction>,
    /// Broadcast stop signal.
    pub stop: CancellationToken,
    /// Shutdown coordination; the worker counts as one tracked task.
    pub tracker: TaskTracker,
}

/// Result of analyzing one transaction.
#[derive(Debug)]
pub enum CallOutcome {
    /// Not a plausible contract call; dropped untouched.
    Ineligible,
    /// Recipient is not a tracked contract; dropped untouched.
    UnknownContract,
    /// Classified and persisted.
    Classified(Transaction),
    /// Classified, but the store rejected the update.
    PersistFailed {
        /// The classified transaction that was not written.
        trx: Transaction,
        /// Store error.
        error: eyre::Report,
    },
}

/// Counters reported when the worker exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Transactions taken from the channel.
    pub received: u64,
    /// Transactions classified and persisted.
    pub classified: u64,
    /// Ineligible transactions and calls to unknown contracts.
    pub skipped: u64,
    /// Classified transactions the store failed to persist.
    pub failed: u64,
}

impl QueueStats {
    fn record(&mut self, outcome: &CallOutcome) {
        self.received += 1;
        match outcome {
            CallOutcome::Ineligible | CallOutcome::UnknownContract => self.skipped += 1,
            CallOutcome::Classified(_) => self.classified += 1,
            CallOutcome::PersistFailed { .. } => self.failed += 1,
        }
    }
}

/// Derived fields of a contract call, applied to the transaction in one step.
#[derive(Clone, Debug, PartialEq, Eq)]
struct CallClassification {
    contract_type: AccountType,
    call: CallMatch,
    is_erc20_call: bool,
}

impl CallClassification {
    fn apply_to(self, trx: &mut Transaction) {
        trx.target_contract_type = Some(self.contract_type);
        trx.target_function_call = Some(self.call.function);
        trx.is_erc20_call = self.is_erc20_call;
    }
}

/// True if the transaction can be a contract call: it has a recipient and
/// its input carries at least a 4-byte function selector.
pub fn is_likely_contract_call(trx: &Transaction) -> bool {
    trx.to.is_some() && trx.input.len() >= 4
}

/// Blockchain smart contract call analyzer.
pub struct ContractCallQueue {
    repo: Arc<Repository>,
}

impl ContractCallQueue {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Starts the worker on the context's tracker.
    ///
    /// The worker exits when the stop signal fires or every sender is dropped;
    /// an in-flight transaction is always finished first.
    pub fn spawn(self, ctx: CallQueueContext) -> JoinHandle<QueueStats> {
        let CallQueueContext {
            receiver,
            stop,
            tracker,
        } = ctx;
        tracker.spawn(self.run(receiver, stop))
    }

    async fn run(
        self,
        mut receiver: mpsc::Receiver<Transaction>,
        stop: CancellationToken,
    ) -> QueueStats {
        tracing::info!("contract calls queue processing is running");
        let mut stats = QueueStats::default();

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                received = receiver.recv() => match received {
                    Some(trx) => {
                        tracing::debug!(hash = %trx.hash, "analyzing transaction call");
                        let outcome = self.analyze_call(&trx);
                        stats.record(&outcome);
                    }
                    None => {
                        tracing::debug!("contract calls channel closed");
                        break;
                    }
                },
            }
        }

        tracing::info!(
            received = stats.received,
            classified = stats.classified,
            skipped = stats.skipped,
            failed = stats.failed,
            "contract calls queue processing is closing"
        );
        stats
    }

    /// Analyzes one transaction and persists the enriched copy.
    ///
    /// The input is never modified; all derived fields are computed first and
    /// written in a single store update.
    pub fn analyze_call(&self, trx: &Transaction) -> CallOutcome {
        let to = match trx.to {
            Some(to) if is_likely_contract_call(trx) => to,
            _ => {
                tracing::error!(hash = %trx.hash, "analyzer received a non-call transaction");
                return CallOutcome::Ineligible;
            }
        };

        let contract = match self.repo.contract(&to) {
            Ok(Some(contract)) => contract,
            Ok(None) => {
                tracing::debug!(
                    hash = %trx.hash,
                    "transaction recipient not known, probably not a contract call"
                );
                return CallOutcome::UnknownContract;
            }
            Err(err) => {
                tracing::error!(hash = %trx.hash, error = %err, "can not analyze call");
                return CallOutcome::UnknownContract;
            }
        };

        let Some(classification) = self.classify(trx, &to, &contract) else {
            return CallOutcome::Ineligible;
        };

        let mut updated = trx.clone();
        classification.apply_to(&mut updated);

        match self.repo.transaction_update(&updated) {
            Ok(()) => CallOutcome::Classified(updated),
            Err(error) => {
                tracing::error!(hash = %trx.hash, error = %error, "transaction not updated");
                CallOutcome::PersistFailed {
                    trx: updated,
                    error,
                }
            }
        }
    }

    fn classify(
        &self,
        trx: &Transaction,
        to: &Address,
        contract: &Contract,
    ) -> Option<CallClassification> {
        let contract_type = self.target_contract_type(trx, to);
        let call = self.target_function(trx, to, contract)?;
        let is_erc20_call = call.source == MatchSource::ContractAbi
            && contract.contract_type.eq_ignore_ascii_case(TOKEN_STANDARD_TYPE);

        Some(CallClassification {
            contract_type,
            call,
            is_erc20_call,
        })
    }

    /// Type of the recipient account.
    ///
    /// The account is expected to exist: calls are queued only after the
    /// account side of the transaction was processed. A missing account is
    /// reported as critical and labeled as a generic contract.
    fn target_contract_type(&self, trx: &Transaction, to: &Address) -> AccountType {
        match self.repo.account(to) {
            Ok(Some(account)) => account.account_type,
            Ok(None) => {
                tracing::error!(
                    severity = "critical",
                    contract = %to,
                    hash = %trx.hash,
                    "contract account not found"
                );
                AccountType::Contract
            }
            Err(err) => {
                tracing::error!(
                    severity = "critical",
                    contract = %to,
                    hash = %trx.hash,
                    error = %err,
                    "contract account not available"
                );
                AccountType::Contract
            }
        }
    }

    /// Contract ABI first, then the legacy SFC interface for SFC calls,
    /// then the raw selector.
    fn target_function(
        &self,
        trx: &Transaction,
        to: &Address,
        contract: &Contract,
    ) -> Option<CallMatch> {
        let mut strategies = Vec::with_capacity(2);
        if let Some(abi) = contract.abi.as_deref() {
            strategies.push(MatchStrategy::ContractAbi(abi));
        }
        if self.repo.is_sfc_contract(to) {
            if let Some(legacy) = sfc_v1() {
                strategies.push(MatchStrategy::LegacyAbi(legacy));
            }
        }

        let call = match_call(&trx.input, &strategies)?;
        if call.source == MatchSource::RawSelector {
            tracing::debug!(hash = %trx.hash, "transaction call undefined, generic signature used");
        }
        Some(call)
    }
}
