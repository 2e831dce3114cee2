//! Walk-through of a staking lifecycle against the Nauh staking ledger.
//!
//! Deploys a ledger, wires the vault, funds the reward pool, then has a user
//! deposit, stake, sit through a rate change and the lock window, claim and
//! withdraw. Ends by saving a snapshot and printing the metrics exposition.
//!
//! Run with:
//!   cargo run -p nauh-contracts --example lifecycle
//!   RUST_LOG=nauh_contracts=debug cargo run -p nauh-contracts --example lifecycle

use std::sync::Arc;

use anyhow::{ensure, Context, Result};

use nauh_contracts::StakingService;
use nauh_protocol::config::{StakingConfig, ONE_TOKEN};
use nauh_protocol::logging::{init_logging, LogFormat};
use nauh_protocol::time::{to_datetime, DAY, HOUR};
use nauh_protocol::{Address, Amount, ManualClock};

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

fn step(n: u32, title: &str) {
    println!("\n{BOLD}[{n}] {title}{RESET}");
}

// Each staked unit earns `rate` units per second, so whole-token stakes
// would drain the pool in seconds. The demo works in raw units.
const DEPOSIT: Amount = 1_000_000;
const STAKE: Amount = 600_000;

fn main() -> Result<()> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_default();
    init_logging("warn", LogFormat::from_str_lossy(&format));

    let clock = Arc::new(ManualClock::new(1_767_225_600));
    let admin = Address::derive("admin");
    let alice = Address::derive("alice");

    let config = StakingConfig {
        initial_reward_rate: 1,
        initial_reward_funding: 100_000 * ONE_TOKEN,
        ..StakingConfig::default()
    };

    step(1, "Deploy");
    let svc = StakingService::deploy(config, admin, clock.clone()).context("deploying ledger")?;
    let vault = svc.read(|l| l.vault().address());
    svc.set_token_vault(admin, vault).context("wiring vault")?;
    println!("  vault          {vault}");
    println!("  genesis        {}", to_datetime(svc.now()));

    step(2, "Alice deposits and stakes");
    svc.transfer(admin, alice, DEPOSIT)?;
    svc.approve(alice, vault, DEPOSIT)?;
    svc.deposit(alice, DEPOSIT)?;
    svc.stake(alice, STAKE)?;
    println!("  deposited      {DEPOSIT} units, staked {STAKE}");
    let unlock = svc.read(|l| l.vault().unlock_time(&alice))?;
    println!("  unlocks at     {}", to_datetime(unlock));

    step(3, "Twelve hours pass, admin doubles the rate");
    clock.advance(12 * HOUR);
    let cp = svc.update_reward_rate(admin, 2)?;
    println!("  checkpoint     #{} rate {}", cp.index, cp.reward_rate);
    println!("  accrued        {} units", svc.view_rewards(&alice)?);

    step(4, "Unstake too early");
    match svc.unstake(alice, STAKE) {
        Err(e) => println!("  {DIM}rejected: {e}{RESET}"),
        Ok(()) => anyhow::bail!("unstake should still be locked"),
    }

    step(5, "Lock elapses; unstake, claim, withdraw");
    clock.advance(DAY);
    svc.unstake(alice, STAKE)?;
    let claimed = svc.claim_rewards(alice)?;
    svc.withdraw(alice, DEPOSIT)?;
    println!("  claimed        {GREEN}{claimed} units{RESET}");

    svc.read(|l| -> Result<()> {
        let violations = l.check_invariants();
        ensure!(violations.is_empty(), "invariants broken: {violations:?}");
        for event in l.events().all() {
            println!("  {DIM}{}{RESET}", serde_json::to_string(event)?);
        }
        Ok(())
    })?;

    step(6, "Snapshot and metrics");
    let path = std::env::temp_dir().join("nauh-lifecycle.snap");
    let digest = svc.save_snapshot(&path).context("saving snapshot")?;
    println!("  snapshot       {} ({digest})", path.display());
    print!("{}", svc.metrics().render()?);

    Ok(())
}
