//! Integration tests for the thread-safe staking service: concurrent
//! callers, clock-driven lock expiry, and snapshot persistence.

use std::sync::Arc;
use std::thread;

use nauh_contracts::StakingService;
use nauh_protocol::config::StakingConfig;
use nauh_protocol::storage::StorageError;
use nauh_protocol::{Address, ManualClock, StakingError};

fn admin() -> Address {
    Address::derive("admin")
}

fn user(i: usize) -> Address {
    Address::derive(&format!("user-{i}"))
}

/// Helper: a wired service with `users` funded accounts of 1_000 each.
fn setup(clock: Arc<ManualClock>, users: usize) -> StakingService {
    let config = StakingConfig {
        initial_reward_rate: 1,
        lock_duration: 60,
        initial_supply: 10_000_000,
        initial_reward_funding: 5_000_000,
    };
    let svc = StakingService::deploy(config, admin(), clock).unwrap();
    let vault = svc.read(|l| l.vault().address());
    svc.set_token_vault(admin(), vault).unwrap();
    for i in 0..users {
        svc.transfer(admin(), user(i), 1_000).unwrap();
        svc.approve(user(i), vault, 1_000).unwrap();
    }
    svc
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_stakers_keep_ledger_consistent() {
    let clock = Arc::new(ManualClock::new(0));
    let svc = setup(clock, 8);

    thread::scope(|s| {
        for i in 0..8 {
            let svc = svc.clone();
            s.spawn(move || {
                for _ in 0..10 {
                    svc.deposit(user(i), 10).unwrap();
                    svc.stake(user(i), 5).unwrap();
                }
            });
        }
    });

    svc.read(|l| {
        assert!(l.check_invariants().is_empty());
        assert_eq!(l.rewards().total_staked(), 8 * 50);
        for i in 0..8 {
            assert_eq!(l.vault().balances(&user(i)), 100);
            assert_eq!(l.vault().staked_balances(&user(i)), 50);
        }
    });
}

#[test]
fn concurrent_overdraw_never_exceeds_deposit() {
    let clock = Arc::new(ManualClock::new(0));
    let svc = setup(clock, 1);
    svc.deposit(user(0), 100).unwrap();

    let successes: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let svc = svc.clone();
                s.spawn(move || usize::from(svc.withdraw(user(0), 40).is_ok()))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(successes, 2);
    assert_eq!(svc.read(|l| l.vault().balances(&user(0))), 20);
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

#[test]
fn lock_expires_with_clock() {
    let clock = Arc::new(ManualClock::new(1_000));
    let svc = setup(clock.clone(), 1);
    svc.deposit(user(0), 100).unwrap();
    svc.stake(user(0), 100).unwrap();

    clock.advance(59);
    assert!(matches!(
        svc.unstake(user(0), 100),
        Err(StakingError::StakeLocked { unlocks_at: 1_060, now: 1_059 })
    ));
    clock.advance(1);
    svc.unstake(user(0), 100).unwrap();
    assert_eq!(svc.claim_rewards(user(0)).unwrap(), 60 * 100);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn snapshot_survives_restart() {
    let clock = Arc::new(ManualClock::new(0));
    let svc = setup(clock.clone(), 2);
    svc.deposit(user(0), 500).unwrap();
    svc.stake(user(0), 200).unwrap();
    clock.advance(30);
    svc.update_reward_rate(admin(), 3).unwrap();
    clock.advance(10);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("staking.snap");
    svc.save_snapshot(&path).unwrap();
    let expected = svc.view_rewards(&user(0)).unwrap();
    assert_eq!(expected, 30 * 200 + 3 * 10 * 200);

    let restored = StakingService::restore_snapshot(&path, clock.clone()).unwrap();
    assert_eq!(restored.view_rewards(&user(0)).unwrap(), expected);
    assert_eq!(restored.read(|l| l.rewards().checkpoints().len()), 2);

    // The restored ledger keeps working.
    restored.stake(user(0), 100).unwrap();
    assert_eq!(restored.read(|l| l.vault().staked_balances(&user(0))), 300);
}

#[test]
fn corrupted_snapshot_is_rejected() {
    let clock = Arc::new(ManualClock::new(0));
    let svc = setup(clock.clone(), 1);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("staking.snap");
    svc.save_snapshot(&path).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    let err = StakingService::restore_snapshot(&path, clock).err().unwrap();
    assert!(matches!(
        err,
        nauh_contracts::ServiceError::Storage(StorageError::DigestMismatch { .. })
    ));
}
