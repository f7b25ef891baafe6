//! Database pool metrics sampling.
//!
//! Provides a background task that periodically samples the reader and writer pools and
//! records gauges for observability. Each tick also resyncs the reader's [`IdleCeiling`] with
//! the pool's real idle count.

use std::time::Duration;

use metrics::gauge;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::IdleCeiling;

/// Configuration for pool metrics sampling
#[derive(Debug, Clone)]
pub struct PoolMetricsConfig {
    /// How often to sample pool metrics
    pub sample_interval: Duration,
}

impl Default for PoolMetricsConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(5),
        }
    }
}

/// A named pool for metrics labeling
#[derive(Debug, Clone)]
pub struct LabeledPool {
    pub name: &'static str,
    pub pool: SqlitePool,
    /// Set for pools whose idle set is capped through release/acquire hooks
    pub idle_ceiling: Option<IdleCeiling>,
}

/// Run the pool metrics sampler until `shutdown` fires.
///
/// Recorded gauges, all labeled with `pool` (`reader` / `writer`):
/// - `tally_db_pool_connections_total`
/// - `tally_db_pool_connections_idle`
/// - `tally_db_pool_connections_in_use`
/// - `tally_db_pool_connections_max`
/// - `tally_db_pool_idle_ceiling` (reader only)
/// - `tally_db_pool_idle_ceiling_drift` (reader only): idle slots the hook counter had lost since
///   the previous tick
///
/// The writer pool holds one connection, so its `in_use` gauge reads 1 while a write is running
/// or queued behind another.
pub async fn run_pool_metrics_sampler(pools: Vec<LabeledPool>, config: PoolMetricsConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    info!(
        "Starting pool metrics sampler for {} pools with {:?} interval",
        pools.len(),
        config.sample_interval
    );

    for labeled in &pools {
        let max = labeled.pool.options().get_max_connections();
        gauge!("tally_db_pool_connections_max", "pool" => labeled.name).set(max as f64);
        if let Some(ceiling) = &labeled.idle_ceiling {
            gauge!("tally_db_pool_idle_ceiling", "pool" => labeled.name).set(ceiling.max_idle() as f64);
        }
    }

    let mut interval = tokio::time::interval(config.sample_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Pool metrics sampler shutting down");
                break;
            }
            _ = interval.tick() => {
                for labeled in &pools {
                    let size = labeled.pool.size();
                    let idle = labeled.pool.num_idle();
                    let in_use = (size as usize).saturating_sub(idle);

                    gauge!("tally_db_pool_connections_total", "pool" => labeled.name).set(size as f64);
                    gauge!("tally_db_pool_connections_idle", "pool" => labeled.name).set(idle as f64);
                    gauge!("tally_db_pool_connections_in_use", "pool" => labeled.name).set(in_use as f64);

                    if let Some(ceiling) = &labeled.idle_ceiling {
                        let counted = ceiling.resync(idle);
                        let drift = counted.saturating_sub(idle);
                        gauge!("tally_db_pool_idle_ceiling_drift", "pool" => labeled.name).set(drift as f64);
                        if drift > 0 {
                            warn!(pool = labeled.name, counted, idle, "Idle ceiling counter drifted, resynced");
                        }
                    }

                    debug!(pool = labeled.name, size, idle, in_use, "Sampled pool metrics");
                }
            }
        }
    }

    Ok(())
}
