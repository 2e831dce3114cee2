//! # Prometheus Metrics
//!
//! Operational metrics for a running staking service. Everything lives in a
//! dedicated [`prometheus::Registry`] under the `nauh` namespace, so an
//! embedding process can expose it next to its own metrics without name
//! collisions.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use nauh_protocol::Amount;

/// Metric handles for the staking service. Cheap to clone.
#[derive(Clone)]
pub struct VaultMetrics {
    registry: Registry,
    /// Committed operations, by operation name.
    pub operations_total: IntCounterVec,
    /// Rejected operations, by operation name and error kind.
    pub rejected_total: IntCounterVec,
    /// Sum of all staked balances, saturated at `i64::MAX`.
    pub total_staked: IntGauge,
    /// Number of reward-rate checkpoints.
    pub checkpoint_count: IntGauge,
    /// Wall time spent holding the ledger lock per mutating operation.
    pub operation_seconds: Histogram,
}

impl VaultMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("nauh".into()), None)?;

        let operations_total = IntCounterVec::new(
            Opts::new("operations_total", "Committed staking operations"),
            &["op"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let rejected_total = IntCounterVec::new(
            Opts::new("rejected_total", "Staking operations rejected with an error"),
            &["op", "kind"],
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let total_staked = IntGauge::new("total_staked", "Sum of all staked balances")?;
        registry.register(Box::new(total_staked.clone()))?;

        let checkpoint_count =
            IntGauge::new("checkpoint_count", "Number of reward-rate checkpoints")?;
        registry.register(Box::new(checkpoint_count.clone()))?;

        let operation_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_seconds",
                "Time spent under the ledger write lock per operation",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.01, 0.1, 1.0]),
        )?;
        registry.register(Box::new(operation_seconds.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            rejected_total,
            total_staked,
            checkpoint_count,
            operation_seconds,
        })
    }

    /// Counts a committed operation.
    pub fn record_ok(&self, op: &str) {
        self.operations_total.with_label_values(&[op]).inc();
    }

    /// Counts a rejected operation.
    pub fn record_rejected(&self, op: &str, kind: &str) {
        self.rejected_total.with_label_values(&[op, kind]).inc();
    }

    /// Refreshes the state gauges.
    pub fn observe_state(&self, total_staked: Amount, checkpoints: usize) {
        self.total_staked
            .set(i64::try_from(total_staked).unwrap_or(i64::MAX));
        self.checkpoint_count
            .set(i64::try_from(checkpoints).unwrap_or(i64::MAX));
    }

    /// Encodes all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        let metrics = VaultMetrics::new().unwrap();
        metrics.record_ok("stake");
        metrics.record_ok("stake");
        metrics.record_rejected("unstake", "stake_locked");
        metrics.observe_state(1_500, 2);

        let text = metrics.render().unwrap();
        assert!(text.contains("nauh_operations_total{op=\"stake\"} 2"));
        assert!(text.contains("nauh_rejected_total{kind=\"stake_locked\",op=\"unstake\"} 1"));
        assert!(text.contains("nauh_total_staked 1500"));
        assert!(text.contains("nauh_checkpoint_count 2"));
    }

    #[test]
    fn huge_stake_saturates_gauge() {
        let metrics = VaultMetrics::new().unwrap();
        metrics.observe_state(Amount::MAX, 1);
        assert_eq!(metrics.total_staked.get(), i64::MAX);
    }
}
