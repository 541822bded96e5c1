use std::sync::Arc;
use std::time::Duration;

use simple_bank::ledger::{CreateAccountParams, Ledger, LedgerError, MemoryStore, TransferParams};

/// Helper to open a USD account with `balance`
async fn open(ledger: &Ledger, owner: &str, balance: i64) -> simple_bank::Account {
    ledger
        .create_account(CreateAccountParams {
            owner: owner.to_string(),
            balance,
            currency: "USD".to_string(),
        })
        .await
        .unwrap()
}

fn new_ledger() -> (Arc<Ledger>, MemoryStore) {
    let store = MemoryStore::new();
    (Arc::new(Ledger::with_backend(Arc::new(store.clone()))), store)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn qa_five_concurrent_transfers_of_ten() {
    let (ledger, store) = new_ledger();
    let x = open(&ledger, "x", 100).await;
    let y = open(&ledger, "y", 50).await;

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.transfer(TransferParams::new(x.id, y.id, 10)).await })
        })
        .collect();

    for h in handles {
        let result = h.await.unwrap().unwrap();
        result.check_invariants().unwrap();
    }

    assert_eq!(ledger.get_account(x.id).await.unwrap().balance, 50);
    assert_eq!(ledger.get_account(y.id).await.unwrap().balance, 100);
    assert_eq!(store.transfers().len(), 5);
    assert_eq!(store.entries().len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn qa_crossing_transfers_finish() {
    let (ledger, _) = new_ledger();
    let a = open(&ledger, "a", 500).await;
    let b = open(&ledger, "b", 500).await;

    // a→b and b→a interleaved; a circular wait would hang here.
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let ledger = ledger.clone();
            let params = if i % 2 == 0 {
                TransferParams::new(a.id, b.id, 25)
            } else {
                TransferParams::new(b.id, a.id, 25)
            };
            tokio::spawn(async move { ledger.transfer(params).await })
        })
        .collect();

    let all = futures::future::join_all(handles);
    let results = tokio::time::timeout(Duration::from_secs(10), all)
        .await
        .expect("crossing transfers deadlocked");
    assert!(results.into_iter().all(|r| r.unwrap().is_ok()));

    assert_eq!(ledger.get_account(a.id).await.unwrap().balance, 500);
    assert_eq!(ledger.get_account(b.id).await.unwrap().balance, 500);
}

#[tokio::test]
async fn qa_entries_mirror_the_transfer() {
    let (ledger, _) = new_ledger();
    let a = open(&ledger, "a", 80).await;
    let b = open(&ledger, "b", 0).await;

    let result = ledger
        .transfer(TransferParams::new(a.id, b.id, 30))
        .await
        .unwrap();

    let a_entries = ledger.list_entries(a.id, 10, 0).await.unwrap();
    let b_entries = ledger.list_entries(b.id, 10, 0).await.unwrap();
    assert_eq!(a_entries, vec![result.from_entry.clone()]);
    assert_eq!(b_entries, vec![result.to_entry.clone()]);
    assert_eq!(a_entries[0].amount + b_entries[0].amount, 0);

    assert_eq!(ledger.get_entry(result.from_entry.id).await.unwrap(), result.from_entry);
    let missing = ledger.get_entry(result.to_entry.id + 100).await.unwrap_err();
    assert_eq!(missing.http_status(), 404);

    let transfers = ledger.list_transfers(b.id, a.id, 10, 0).await.unwrap();
    assert_eq!(transfers, vec![result.transfer]);
}

#[tokio::test]
async fn qa_failed_transfer_changes_nothing() {
    let (ledger, store) = new_ledger();
    let a = open(&ledger, "a", 10).await;
    let b = open(&ledger, "b", 10).await;

    let err = ledger
        .transfer(TransferParams::new(a.id, b.id, 11))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    assert!(err.is_validation());

    assert_eq!(ledger.get_account(a.id).await.unwrap().balance, 10);
    assert_eq!(ledger.get_account(b.id).await.unwrap().balance, 10);
    assert!(store.transfers().is_empty());
    assert!(store.entries().is_empty());
}

#[tokio::test]
async fn qa_health_check_memory() {
    let (ledger, _) = new_ledger();
    ledger.health_check().await.unwrap();
}
