//! Concurrent transfer tests
//!
//! These tests drive the transfer engine from many threads at once and verify
//! that overlapping transfers never lose or create money.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

use ewallet_core::{AccountId, ErrorKind, RetryPolicy, WalletContext};

/// Number of concurrent threads for stress tests
const THREAD_COUNT: usize = 6;

/// Number of transfers per thread
const ITERATIONS_PER_THREAD: usize = 10;

fn retry_policy() -> RetryPolicy {
    RetryPolicy::new(12, Duration::from_millis(1))
}

fn create_test_context(temp_dir: &TempDir) -> Arc<WalletContext> {
    Arc::new(WalletContext::new(temp_dir.path()).expect("Failed to create context"))
}

/// Test: T1 moves 50 from A to B while T2 moves 30 from B to A.
///
/// Whatever the interleaving, both must land exactly once.
#[test]
fn test_opposing_transfers_both_apply() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let a = ctx.lifecycle.create_account().unwrap().id;
    let b = ctx.lifecycle.create_account().unwrap().id;

    let barrier = Arc::new(Barrier::new(2));
    let requests = [(a, b, dec!(50)), (b, a, dec!(30))];

    let handles: Vec<_> = requests
        .into_iter()
        .map(|(from, to, amount)| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                retry_policy().run(|| ctx.engine.transfer(&from, &to, amount))
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().expect("transfer should succeed after retries");
    }

    assert_eq!(ctx.query_service.get_account(&a).unwrap().balance, dec!(80));
    assert_eq!(ctx.query_service.get_account(&b).unwrap().balance, dec!(120));
    assert_eq!(ctx.query_service.transfer_count().unwrap(), 2);
    assert_eq!(ctx.query_service.history_for(&a).unwrap().len(), 2);
}

/// Test: Many threads draining the same account can never overdraw it.
#[test]
fn test_competing_debits_never_overdraw() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let source = ctx.lifecycle.create_account().unwrap().id;
    let sinks: Vec<AccountId> = (0..THREAD_COUNT)
        .map(|_| ctx.lifecycle.create_account().unwrap().id)
        .collect();

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let succeeded = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = sinks
        .iter()
        .map(|sink| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            let succeeded = Arc::clone(&succeeded);
            let sink = *sink;
            thread::spawn(move || {
                barrier.wait();
                // 6 x 30 exceeds the 100 available, so at most 3 can succeed
                match retry_policy().run(|| ctx.engine.transfer(&source, &sink, dec!(30))) {
                    Ok(_) => {
                        succeeded.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => assert!(
                        matches!(e.kind(), ErrorKind::InsufficientFunds | ErrorKind::Storage),
                        "unexpected error: {e}"
                    ),
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let succeeded = succeeded.load(Ordering::SeqCst);
    let remaining = ctx.query_service.get_account(&source).unwrap().balance;
    assert!(succeeded <= 3);
    assert!(remaining >= Decimal::ZERO);
    assert_eq!(remaining, dec!(100) - dec!(30) * Decimal::from(succeeded));
    assert_eq!(ctx.query_service.transfer_count().unwrap(), succeeded as u64);
}

/// Test: Random transfers across a small set of accounts from many threads,
/// with a reader checking that no snapshot shows a half-applied transfer.
#[test]
fn test_stress_conserves_total_supply() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let accounts: Arc<Vec<AccountId>> = Arc::new(
        (0..4)
            .map(|_| ctx.lifecycle.create_account().unwrap().id)
            .collect(),
    );
    let total_supply = dec!(400);

    let barrier = Arc::new(Barrier::new(THREAD_COUNT + 1));
    let committed = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            barrier.wait();
            let mut observations = 0;
            while !done.load(Ordering::SeqCst) {
                let accounts = ctx.query_service.list_accounts().unwrap();
                let total: Decimal = accounts.iter().map(|a| a.balance).sum();
                assert_eq!(total, dec!(400), "observed a half-applied transfer");
                assert!(accounts.iter().all(|a| a.balance >= Decimal::ZERO));
                observations += 1;
            }
            observations
        })
    };

    let writers: Vec<_> = (0..THREAD_COUNT)
        .map(|thread_id| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            let accounts = Arc::clone(&accounts);
            let committed = Arc::clone(&committed);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..ITERATIONS_PER_THREAD {
                    let from = accounts[(thread_id + i) % accounts.len()];
                    let to = accounts[(thread_id + i + 1 + i % 2) % accounts.len()];
                    let amount = Decimal::new(((thread_id * 7 + i * 13) % 40) as i64 + 1, 1);
                    match retry_policy().run(|| ctx.engine.transfer(&from, &to, amount)) {
                        Ok(_) => {
                            committed.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => eprintln!("Thread {}: transfer {} failed: {}", thread_id, i, e),
                    }
                }
            })
        })
        .collect();

    for handle in writers {
        handle.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    let observations = reader.join().unwrap();

    let committed = committed.load(Ordering::SeqCst);
    println!("committed {} transfers, reader took {} snapshots", committed, observations);

    let final_total: Decimal = ctx
        .query_service
        .list_accounts()
        .unwrap()
        .iter()
        .map(|a| a.balance)
        .sum();
    assert_eq!(final_total, total_supply);
    assert_eq!(ctx.query_service.transfer_count().unwrap(), committed as u64);

    let health = ctx.doctor_service.run_checks().unwrap();
    assert!(health.is_healthy(), "doctor found problems: {:?}", health.checks);
}

/// Test: Transfers on disjoint account pairs all land.
#[test]
fn test_disjoint_transfers_all_apply() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let pairs: Vec<(AccountId, AccountId)> = (0..THREAD_COUNT)
        .map(|_| {
            (
                ctx.lifecycle.create_account().unwrap().id,
                ctx.lifecycle.create_account().unwrap().id,
            )
        })
        .collect();

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let handles: Vec<_> = pairs
        .iter()
        .map(|&(from, to)| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..ITERATIONS_PER_THREAD {
                    retry_policy()
                        .run(|| ctx.engine.transfer(&from, &to, dec!(1)))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    for (from, to) in &pairs {
        assert_eq!(ctx.query_service.get_account(from).unwrap().balance, dec!(90));
        assert_eq!(ctx.query_service.get_account(to).unwrap().balance, dec!(110));
    }
}
