use std::time::Duration;

use esbtx_transport::DEFAULT_BAUD;

/// What to do when a bounded outbound queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFull {
    /// Block the producer until the writer drains a slot.
    Block,
    /// Drop the oldest queued message to admit the newest.
    DropOldest,
}

/// Outbound queue sizing and backpressure policy for a session.
///
/// The field tool this replaces used unbounded queues throughout, so a
/// stalled port grew its queue without limit. That remains the default, but
/// the bound and full-queue behavior are an explicit choice here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueuePolicy {
    /// No bound. Producers never block; memory growth is unchecked under a
    /// transport stall.
    #[default]
    Unbounded,
    /// Fixed capacity (at least 1) with an explicit full-queue policy.
    Bounded { capacity: usize, on_full: OnFull },
}

/// Startup configuration for a flood run.
#[derive(Debug, Clone)]
pub struct FloodConfig {
    /// Ordered list of ports to open. A port that fails to open is skipped.
    pub ports: Vec<String>,
    /// Serial line rate.
    pub baud: u32,
    /// Pacing between sequenced payload ticks.
    pub payload_interval: Duration,
    /// Sequenced payload ticks before the run ends; `None` runs unbounded.
    pub max_ticks: Option<u64>,
    /// Period between channel-map broadcast rounds.
    pub map_interval: Duration,
    /// Inter-session delay within one channel-map round.
    pub map_stagger: Duration,
    /// Outbound queue policy applied to every session.
    pub queue: QueuePolicy,
    /// Reader idle poll interval.
    pub read_poll: Duration,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            baud: DEFAULT_BAUD,
            payload_interval: Duration::from_micros(10),
            max_ticks: Some(100_000),
            map_interval: Duration::from_secs(2),
            map_stagger: Duration::from_millis(200),
            queue: QueuePolicy::Unbounded,
            read_poll: Duration::from_millis(20),
        }
    }
}
