//! Property-style tests for the accrual walk over longer rate histories.
//!
//! No randomness: each test sweeps a deterministic grid of settlement
//! points so failures reproduce exactly.

use nauh_protocol::rewards::{CheckpointLog, SettlementCursor};
use nauh_protocol::{Amount, StakingError, Timestamp};

/// Reference: integrate the step function second by second.
fn brute_force(steps: &[(Timestamp, Amount)], staked: Amount, from: Timestamp, to: Timestamp) -> Amount {
    (from..to)
        .map(|t| {
            let rate = steps
                .iter()
                .rev()
                .find(|(at, _)| *at <= t)
                .map(|(_, r)| *r)
                .unwrap_or(0);
            rate * staked
        })
        .sum()
}

/// `(timestamp, rate)` steps, genesis first.
const STEPS: &[(Timestamp, Amount)] = &[(0, 3), (40, 0), (55, 11), (90, 2), (130, 7)];

// ---------------------------------------------------------------------------
// Agreement with the reference integral
// ---------------------------------------------------------------------------

#[test]
fn walk_matches_brute_force_for_every_window_start() {
    let steps = STEPS;
    let mut log = CheckpointLog::genesis(steps[0].1, steps[0].0);
    for (at, rate) in &steps[1..] {
        log.append(*rate, *at).unwrap();
    }

    let now = 200;
    for from in (0..=now).step_by(7) {
        let checkpoint = log.as_slice().partition_point(|cp| cp.timestamp <= from) - 1;
        let cursor = SettlementCursor {
            checkpoint,
            timestamp: from,
        };
        let accrual = log.accrue(9, cursor, now).unwrap();
        assert_eq!(
            accrual.reward,
            brute_force(steps, 9, from, now),
            "window [{from}, {now})"
        );
        assert_eq!(accrual.cursor.checkpoint, log.len() - 1);
    }
}

// ---------------------------------------------------------------------------
// Additivity
// ---------------------------------------------------------------------------

#[test]
fn periodic_settlements_sum_to_one_walk() {
    // Build the log while settling, the way the reward manager does.
    let staked = 4;
    let mut log = CheckpointLog::genesis(STEPS[0].1, STEPS[0].0);
    let mut cursor = log.cursor_at(0);
    let mut pending: Amount = 0;
    let mut next_step = 1;

    for now in 1..=200 {
        if next_step < STEPS.len() && STEPS[next_step].0 == now {
            // A rate change settles nobody; the walk picks it up later.
            log.append(STEPS[next_step].1, now).unwrap();
            next_step += 1;
        }
        if now % 13 == 0 {
            let accrual = log.accrue(staked, cursor, now).unwrap();
            pending += accrual.reward;
            cursor = accrual.cursor;
        }
    }
    pending += log.accrue(staked, cursor, 200).unwrap().reward;

    assert_eq!(pending, brute_force(STEPS, staked, 0, 200));
}

#[test]
fn second_settlement_at_same_instant_is_zero() {
    let mut log = CheckpointLog::genesis(5, 0);
    log.append(6, 10).unwrap();
    let first = log.accrue(100, SettlementCursor::default(), 25).unwrap();
    let second = log.accrue(100, first.cursor, 25).unwrap();
    assert_eq!(first.reward, 5 * 10 * 100 + 6 * 15 * 100);
    assert_eq!(second.reward, 0);
    assert_eq!(second.cursor, first.cursor);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn settlement_behind_cursor_is_rejected() {
    let log = CheckpointLog::genesis(1, 0);
    let cursor = log.cursor_at(50);
    assert!(matches!(
        log.accrue(1, cursor, 49),
        Err(StakingError::InvalidTimestamp { now: 49, latest: 50 })
    ));
}

#[test]
fn huge_rate_overflows_instead_of_wrapping() {
    let log = CheckpointLog::genesis(Amount::MAX / 2, 0);
    assert!(matches!(
        log.accrue(3, SettlementCursor::default(), 1),
        Err(StakingError::ArithmeticOverflow { .. })
    ));
}
