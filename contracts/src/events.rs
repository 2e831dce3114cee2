//! # Ledger Events
//!
//! Every committed state transition appends one [`LedgerEvent`] to the
//! [`EventLog`]. Events are the audit trail an external indexer consumes:
//! each carries the account, the amount and the ledger time, plus a
//! monotonically increasing sequence number so consumers can detect gaps.
//!
//! Events are appended inside the ledger's transaction boundary, so an
//! operation that fails leaves no event behind.

use serde::{Deserialize, Serialize};

use nauh_protocol::{Address, Amount, Timestamp};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Funds moved from the user into vault custody.
    Deposited,
    /// Unstaked funds returned to the user.
    Withdrawn,
    /// Deposited funds locked as stake.
    Staked,
    /// Stake released back to the deposited balance.
    Unstaked,
    /// Pending reward paid out.
    RewardClaimed,
    /// A new reward-rate checkpoint was appended.
    RewardRateUpdated {
        /// Index of the new checkpoint.
        checkpoint: usize,
    },
    /// The token vault address was wired.
    TokenVaultSet,
}

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the log, starting at 0.
    pub sequence: u64,
    /// The event type.
    pub kind: EventKind,
    /// The account the event concerns. For admin events, the new vault
    /// address or the admin who changed the rate.
    pub user: Address,
    /// Amount moved, staked, or claimed. For rate updates, the new rate.
    pub amount: Amount,
    /// Ledger time of the operation.
    pub timestamp: Timestamp,
}

/// Append-only event history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and returns its sequence number.
    pub fn record(
        &mut self,
        kind: EventKind,
        user: Address,
        amount: Amount,
        timestamp: Timestamp,
    ) -> u64 {
        let sequence = self.events.len() as u64;
        self.events.push(LedgerEvent {
            sequence,
            kind,
            user,
            amount,
            timestamp,
        });
        sequence
    }

    /// All events, oldest first.
    pub fn all(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Events with `sequence >= from`, for incremental indexing.
    pub fn since(&self, from: u64) -> &[LedgerEvent] {
        let start = usize::try_from(from)
            .unwrap_or(usize::MAX)
            .min(self.events.len());
        &self.events[start..]
    }

    /// Events concerning `user`.
    pub fn for_user<'a>(&'a self, user: &'a Address) -> impl Iterator<Item = &'a LedgerEvent> + 'a {
        self.events.iter().filter(move |e| &e.user == user)
    }

    /// The newest event.
    pub fn last(&self) -> Option<&LedgerEvent> {
        self.events.last()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
