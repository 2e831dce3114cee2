//! # Staking Service
//!
//! A thread-safe handle around a [`StakingLedger`]. Mutations take the write
//! lock for the entire operation, asset transfers included, and read the
//! clock while holding it, so operations are totally ordered and their
//! timestamps never run backwards. Views take the read lock and see a
//! consistent state.
//!
//! Each mutation runs inside a `staking_op` tracing span tagged with a fresh
//! UUID, which ties the contract-level log lines of one call together.

use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use nauh_protocol::auth::Role;
use nauh_protocol::config::StakingConfig;
use nauh_protocol::error::StakingResult;
use nauh_protocol::rewards::RewardCheckpoint;
use nauh_protocol::storage::{Snapshot, StorageError};
use nauh_protocol::{Address, Amount, Clock, Timestamp};

use crate::ledger::{DeployError, StakingLedger};
use crate::metrics::VaultMetrics;

/// Errors from service setup and persistence.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Ledger deployment failed.
    #[error(transparent)]
    Deploy(#[from] DeployError),

    /// Snapshot save or restore failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Metrics registration failed.
    #[error("metrics setup failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Shared, lock-guarded staking ledger.
#[derive(Clone)]
pub struct StakingService {
    ledger: Arc<RwLock<StakingLedger>>,
    clock: Arc<dyn Clock>,
    metrics: VaultMetrics,
}

impl StakingService {
    /// Wraps an existing ledger.
    pub fn new(ledger: StakingLedger, clock: Arc<dyn Clock>) -> Result<Self, ServiceError> {
        let metrics = VaultMetrics::new()?;
        metrics.observe_state(
            ledger.rewards().total_staked(),
            ledger.rewards().checkpoints().len(),
        );
        Ok(Self {
            ledger: Arc::new(RwLock::new(ledger)),
            clock,
            metrics,
        })
    }

    /// Deploys a fresh ledger at the clock's current time.
    pub fn deploy(
        config: StakingConfig,
        admin: Address,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServiceError> {
        let ledger = StakingLedger::deploy(config, admin, clock.now())?;
        Self::new(ledger, clock)
    }

    /// Metric handles.
    pub fn metrics(&self) -> &VaultMetrics {
        &self.metrics
    }

    /// Current clock reading.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Runs `f` against the ledger under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&StakingLedger) -> R) -> R {
        f(&*self.ledger.read())
    }

    fn mutate<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut StakingLedger, Timestamp) -> StakingResult<T>,
    ) -> StakingResult<T> {
        let op_id = Uuid::new_v4();
        let span = tracing::info_span!("staking_op", %op_id, op);
        let _enter = span.enter();

        let mut ledger = self.ledger.write();
        let timer = self.metrics.operation_seconds.start_timer();
        let now = self.clock.now();
        let result = f(&mut *ledger, now);

        match &result {
            Ok(_) => self.metrics.record_ok(op),
            Err(err) => self.metrics.record_rejected(op, err.kind()),
        }
        self.metrics.observe_state(
            ledger.rewards().total_staked(),
            ledger.rewards().checkpoints().len(),
        );
        drop(ledger);
        timer.observe_duration();
        result
    }

    // -- operations ----------------------------------------------------------

    /// See [`StakingLedger::deposit`].
    pub fn deposit(&self, user: Address, amount: Amount) -> StakingResult<()> {
        self.mutate("deposit", |l, now| l.deposit(user, amount, now))
    }

    /// See [`StakingLedger::withdraw`].
    pub fn withdraw(&self, user: Address, amount: Amount) -> StakingResult<()> {
        self.mutate("withdraw", |l, now| l.withdraw(user, amount, now))
    }

    /// See [`StakingLedger::stake`].
    pub fn stake(&self, user: Address, amount: Amount) -> StakingResult<()> {
        self.mutate("stake", |l, now| l.stake(user, amount, now))
    }

    /// See [`StakingLedger::unstake`].
    pub fn unstake(&self, user: Address, amount: Amount) -> StakingResult<()> {
        self.mutate("unstake", |l, now| l.unstake(user, amount, now))
    }

    /// See [`StakingLedger::claim_rewards`].
    pub fn claim_rewards(&self, user: Address) -> StakingResult<Amount> {
        self.mutate("claim_rewards", |l, now| l.claim_rewards(user, now))
    }

    /// Reward `user` could claim right now.
    pub fn view_rewards(&self, user: &Address) -> StakingResult<Amount> {
        let ledger = self.ledger.read();
        ledger.view_rewards(user, self.clock.now())
    }

    /// See [`StakingLedger::approve`].
    pub fn approve(&self, owner: Address, spender: Address, amount: Amount) -> StakingResult<()> {
        self.mutate("approve", |l, _| l.approve(owner, spender, amount))
    }

    /// See [`StakingLedger::transfer`].
    pub fn transfer(&self, from: Address, to: Address, amount: Amount) -> StakingResult<()> {
        self.mutate("transfer", |l, _| l.transfer(from, to, amount))
    }

    /// See [`StakingLedger::update_reward_rate`].
    pub fn update_reward_rate(
        &self,
        caller: Address,
        new_rate: Amount,
    ) -> StakingResult<RewardCheckpoint> {
        self.mutate("update_reward_rate", |l, now| {
            l.update_reward_rate(caller, new_rate, now)
        })
    }

    /// See [`StakingLedger::set_token_vault`].
    pub fn set_token_vault(&self, caller: Address, vault: Address) -> StakingResult<()> {
        self.mutate("set_token_vault", |l, now| {
            l.set_token_vault(caller, vault, now)
        })
    }

    /// See [`StakingLedger::grant_role`].
    pub fn grant_role(&self, caller: Address, role: Role, account: Address) -> StakingResult<bool> {
        self.mutate("grant_role", |l, now| l.grant_role(caller, role, account, now))
    }

    /// See [`StakingLedger::revoke_role`].
    pub fn revoke_role(&self, caller: Address, role: Role, account: Address) -> StakingResult<bool> {
        self.mutate("revoke_role", |l, now| l.revoke_role(caller, role, account, now))
    }

    // -- persistence ---------------------------------------------------------

    /// Captures the current state.
    pub fn snapshot(&self) -> Result<Snapshot<StakingLedger>, StorageError> {
        Snapshot::capture(&*self.ledger.read())
    }

    /// Writes the current state to `path`. Returns the state digest.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<String, StorageError> {
        let snapshot = self.snapshot()?;
        snapshot.save(path.as_ref())?;
        tracing::info!(
            path = %path.as_ref().display(),
            digest = %snapshot.digest_hex(),
            "ledger snapshot saved"
        );
        Ok(snapshot.digest_hex())
    }

    /// Rebuilds a service from a snapshot file.
    pub fn restore_snapshot(
        path: impl AsRef<Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServiceError> {
        let snapshot: Snapshot<StakingLedger> = Snapshot::load(path.as_ref())?;
        let ledger = snapshot.restore()?;
        tracing::info!(
            path = %path.as_ref().display(),
            digest = %snapshot.digest_hex(),
            taken_at = %snapshot.taken_at(),
            "ledger snapshot restored"
        );
        Self::new(ledger, clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nauh_protocol::ManualClock;

    fn admin() -> Address {
        Address::derive("admin")
    }

    fn service(clock: Arc<ManualClock>) -> StakingService {
        let config = StakingConfig {
            initial_reward_rate: 1,
            lock_duration: 10,
            initial_supply: 1_000_000,
            initial_reward_funding: 100_000,
        };
        let svc = StakingService::deploy(config, admin(), clock).unwrap();
        let vault = svc.read(|l| l.vault().address());
        svc.set_token_vault(admin(), vault).unwrap();
        svc
    }

    #[test]
    fn operations_use_clock_time() {
        let clock = Arc::new(ManualClock::new(1_000));
        let svc = service(clock.clone());
        let vault = svc.read(|l| l.vault().address());

        svc.approve(admin(), vault, 500).unwrap();
        svc.deposit(admin(), 500).unwrap();
        svc.stake(admin(), 100).unwrap();
        clock.advance(20);

        assert_eq!(svc.view_rewards(&admin()).unwrap(), 2_000);
        assert_eq!(
            svc.read(|l| l.vault().position(&admin()).stake_timestamp),
            1_000
        );
    }

    #[test]
    fn rejected_ops_are_counted() {
        let clock = Arc::new(ManualClock::new(0));
        let svc = service(clock);
        assert!(svc.withdraw(admin(), 1).is_err());
        let text = svc.metrics().render().unwrap();
        assert!(text.contains("kind=\"insufficient_balance\""));
    }

    #[test]
    fn each_mutation_observes_one_lock_hold() {
        let clock = Arc::new(ManualClock::new(0));
        let svc = service(clock);
        let before = svc.metrics().operation_seconds.get_sample_count();
        svc.transfer(admin(), Address::derive("carol"), 5).unwrap();
        assert!(svc.withdraw(admin(), 1).is_err());
        assert_eq!(
            svc.metrics().operation_seconds.get_sample_count(),
            before + 2
        );
    }

    #[test]
    fn revoke_role_passes_through() {
        let clock = Arc::new(ManualClock::new(0));
        let svc = service(clock);
        let carol = Address::derive("carol");
        assert!(svc.grant_role(admin(), Role::Admin, carol).unwrap());
        assert!(svc.revoke_role(admin(), Role::Admin, carol).unwrap());
        assert!(!svc.read(|l| l.access().has_role(Role::Admin, &carol)));
        assert!(!svc.revoke_role(admin(), Role::Admin, carol).unwrap());
        assert!(matches!(
            svc.revoke_role(carol, Role::Vault, admin()),
            Err(nauh_protocol::StakingError::Unauthorized { .. })
        ));
    }

    #[test]
    fn snapshot_restores_identical_state() {
        let clock = Arc::new(ManualClock::new(0));
        let svc = service(clock.clone());
        let vault = svc.read(|l| l.vault().address());
        svc.approve(admin(), vault, 50).unwrap();
        svc.deposit(admin(), 50).unwrap();
        svc.stake(admin(), 50).unwrap();
        clock.advance(7);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.snap");
        let digest = svc.save_snapshot(&path).unwrap();

        let restored = StakingService::restore_snapshot(&path, clock).unwrap();
        assert_eq!(restored.snapshot().unwrap().digest_hex(), digest);
        assert_eq!(restored.view_rewards(&admin()).unwrap(), 350);
        assert_eq!(restored.read(|l| l.events().len()), 3);
    }
}
