//! Graceful stop of the classification worker.

mod common;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use common::*;
use opera_data::{
    Account, AccountType, Contract, DataStore, MemCache, Store, Transaction, WithdrawFilter,
    WithdrawRequestList,
};
use opera_repo::{CallQueueContext, ContractCallQueue, Repository, RepositoryConfig};
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Store wrapper whose updates block for a while and announce themselves.
struct SlowStore {
    inner: Arc<Store>,
    update_started: Arc<Notify>,
    delay: Duration,
}

impl DataStore for SlowStore {
    fn account(&self, address: &Address) -> eyre::Result<Option<Account>> {
        self.inner.account(address)
    }

    fn contract(&self, address: &Address) -> eyre::Result<Option<Contract>> {
        self.inner.contract(address)
    }

    fn update_transaction(&self, trx: &Transaction) -> eyre::Result<()> {
        self.update_started.notify_one();
        std::thread::sleep(self.delay);
        self.inner.update_transaction(trx)
    }

    fn withdrawals(
        &self,
        filter: &WithdrawFilter,
        cursor: Option<&str>,
        count: i32,
    ) -> eyre::Result<WithdrawRequestList> {
        self.inner.withdrawals(filter, cursor, count)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_mid_run_finishes_in_flight_call_then_exits() {
    let store = test_store();
    register_contract(&store, TOKEN, AccountType::Erc20Token, Some(ERC20_ABI));
    let calls: Vec<_> = (1..=5)
        .map(|n| sample_call(n, Some(TOKEN), call_data("transfer(address,uint256)")))
        .collect();
    store.insert_transactions(&calls).unwrap();

    let update_started = Arc::new(Notify::new());
    let slow = SlowStore {
        inner: store.clone(),
        update_started: update_started.clone(),
        delay: Duration::from_millis(200),
    };
    let repo = Repository::new(
        RepositoryConfig::default(),
        Arc::new(slow),
        Arc::new(MemCache::default()),
        StubSource::new(None),
    );

    let (sender, receiver) = mpsc::channel(16);
    let stop = CancellationToken::new();
    let tracker = TaskTracker::new();
    let worker = ContractCallQueue::new(Arc::new(repo)).spawn(CallQueueContext {
        receiver,
        stop: stop.clone(),
        tracker: tracker.clone(),
    });
    assert_eq!(tracker.len(), 1);

    for call in &calls {
        sender.send(call.clone()).await.unwrap();
    }

    update_started.notified().await;
    stop.cancel();

    tracker.close();
    tracker.wait().await;
    assert!(tracker.is_empty());
    assert_eq!(tracker.len(), 0);

    let stats = worker.await.unwrap();
    assert_eq!(stats.received, 1);
    assert_eq!(stats.classified, 1);

    let first = store.transaction(&calls[0].hash).unwrap().unwrap();
    assert_eq!(first.target_function_call.as_deref(), Some("transfer"));
    assert!(first.is_erc20_call);

    for call in &calls[1..] {
        let stored = store.transaction(&call.hash).unwrap().unwrap();
        assert_eq!(&stored, call, "calls behind the stop stay untouched");
    }

    // the channel still holds the rest; the producer is free to drop them
    drop(sender);
}

#[tokio::test]
async fn stop_before_any_delivery_processes_nothing() {
    let store = test_store();
    let (sender, receiver) = mpsc::channel(4);
    let stop = CancellationToken::new();
    let tracker = TaskTracker::new();
    stop.cancel();

    let worker = ContractCallQueue::new(test_repository(store.clone())).spawn(CallQueueContext {
        receiver,
        stop,
        tracker: tracker.clone(),
    });
    // the worker may already be gone, closing the channel
    let _ = sender
        .send(sample_call(1, Some(TOKEN), call_data("transfer(address,uint256)")))
        .await;

    tracker.close();
    tracker.wait().await;
    assert_eq!(worker.await.unwrap().received, 0);
}
