//! Heartbeat for the emotion engine
//!
//! One cycle per tick. Cycles never overlap: each tick runs to completion
//! before the next one is awaited, and shutdown is only observed between
//! cycles.

use std::future::Future;
use std::time::Duration;

/// Configuration for the cycle heartbeat
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Time between cycles (default: 30 minutes)
    pub interval: Duration,
    /// Stop after this many cycles (None = run until shutdown)
    pub max_cycles: Option<u64>,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1800),
            max_cycles: None,
        }
    }
}

impl HeartbeatConfig {
    pub fn from_secs(secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(secs.max(1)),
            ..Self::default()
        }
    }

    /// Very fast heartbeat for testing
    pub fn testing() -> Self {
        Self {
            interval: Duration::from_millis(10),
            max_cycles: None,
        }
    }

    pub fn with_max_cycles(mut self, n: u64) -> Self {
        self.max_cycles = Some(n);
        self
    }
}

/// Drive `cycle` on every tick until `shutdown` resolves or `max_cycles` is
/// reached. Returns the number of cycles run.
///
/// A failing cycle is logged and the loop continues: the next tick starts
/// again from whatever state was last persisted.
pub async fn run_heartbeat<F, S>(config: &HeartbeatConfig, mut cycle: F, shutdown: S) -> u64
where
    F: FnMut(u64) -> anyhow::Result<()>,
    S: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut ran = 0u64;
    loop {
        if config.max_cycles.is_some_and(|max| ran >= max) {
            break;
        }
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = cycle(ran) {
                    tracing::error!("Cycle {} failed: {:#}", ran, e);
                }
                ran += 1;
            }
            _ = &mut shutdown => {
                tracing::info!("Heartbeat shutdown requested after {} cycles", ran);
                break;
            }
        }
    }
    ran
}
