//! Idle-connection ceiling for the reader pool.
//!
//! sqlx pools cap the number of open connections but not the number kept idle. The ceiling is
//! enforced through the pool's release/acquire hooks: [`IdleCeiling::admit`] runs when a
//! connection is returned and decides whether it may wait in the idle set,
//! [`IdleCeiling::take`] runs when an idle connection is handed out again.
//!
//! The counter only stays exact while every exit from the idle set goes through `take`, so the
//! reader pool runs without sqlx's own idle reaper, max lifetime, and pre-acquire ping. One exit
//! remains: after `after_release` admits a connection sqlx pings it, and a connection failing
//! that ping is closed without ever becoming idle. The counter then overstates the idle set and
//! the effective ceiling shrinks. [`IdleCeiling::resync`] resets it from the pool's own idle
//! count; the pool metrics sampler calls it on every tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct IdleCeiling {
    idle: Arc<AtomicUsize>,
    max_idle: usize,
    idle_timeout: Duration,
}

impl IdleCeiling {
    pub fn new(max_idle: u32, idle_timeout: Duration) -> Self {
        Self {
            idle: Arc::new(AtomicUsize::new(0)),
            max_idle: max_idle as usize,
            idle_timeout,
        }
    }

    /// A connection is being released. Returns false when the idle set is full and the
    /// connection should be closed instead.
    pub fn admit(&self) -> bool {
        self.idle
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |idle| (idle < self.max_idle).then_some(idle + 1))
            .is_ok()
    }

    /// An idle connection is leaving the idle set. Returns false when it sat idle longer than
    /// the idle timeout and should be recycled.
    pub fn take(&self, idle_for: Duration) -> bool {
        let _ = self
            .idle
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |idle| idle.checked_sub(1));
        idle_for <= self.idle_timeout
    }

    /// Overwrite the counter with the pool's observed idle count, returning the previous value.
    ///
    /// Releases in flight while sampling make the result off by at most their number until the
    /// next resync.
    pub fn resync(&self, observed_idle: usize) -> usize {
        self.idle.swap(observed_idle, Ordering::AcqRel)
    }

    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    pub fn idle(&self) -> usize {
        self.idle.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_ceiling() {
        let ceiling = IdleCeiling::new(2, Duration::from_secs(60));
        assert!(ceiling.admit());
        assert!(ceiling.admit());
        assert!(!ceiling.admit(), "third connection should be closed");
        assert_eq!(ceiling.idle(), 2);

        assert!(ceiling.take(Duration::ZERO));
        assert_eq!(ceiling.idle(), 1);
        assert!(ceiling.admit());
        assert_eq!(ceiling.idle(), 2);
    }

    #[test]
    fn test_zero_ceiling_never_keeps_idle() {
        let ceiling = IdleCeiling::new(0, Duration::from_secs(60));
        assert!(!ceiling.admit());
        assert_eq!(ceiling.idle(), 0);
    }

    #[test]
    fn test_stale_connections_are_recycled() {
        let ceiling = IdleCeiling::new(1, Duration::from_secs(180));
        assert!(ceiling.admit());
        assert!(!ceiling.take(Duration::from_secs(181)));
        // the slot is freed even when the connection is discarded
        assert_eq!(ceiling.idle(), 0);
    }

    #[test]
    fn test_take_never_underflows() {
        let ceiling = IdleCeiling::new(1, Duration::from_secs(1));
        assert!(ceiling.take(Duration::ZERO));
        assert_eq!(ceiling.idle(), 0);
    }

    #[test]
    fn test_clones_share_the_counter() {
        let ceiling = IdleCeiling::new(1, Duration::from_secs(1));
        let hook = ceiling.clone();
        assert!(hook.admit());
        assert!(!ceiling.admit());
    }

    #[test]
    fn test_resync_recovers_slots_lost_to_failed_pings() {
        let ceiling = IdleCeiling::new(2, Duration::from_secs(60));
        // both admitted, then closed by the pool without passing through `take`
        assert!(ceiling.admit());
        assert!(ceiling.admit());
        assert!(!ceiling.admit());

        assert_eq!(ceiling.resync(0), 2);
        assert_eq!(ceiling.idle(), 0);
        assert!(ceiling.admit());
    }
}
