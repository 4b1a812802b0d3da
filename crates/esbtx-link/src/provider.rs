use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

/// One signal-strength sample for a radio channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RssiSample {
    /// Channel index the sample was taken on.
    pub channel: u8,
    /// Received signal strength in dBm.
    pub rssi_dbm: i8,
}

/// Source of the current channel map.
///
/// The map is an ordered set of channel indices a device should hop across.
/// How the map is derived (typically from RSSI sweeps) is outside this
/// crate; the broadcaster only ever asks for the current answer.
pub trait ChannelMapProvider: Send + Sync {
    fn current_map(&self) -> Vec<u8>;
}

/// Accepts batches of signal-strength samples harvested from the air.
///
/// Submitting a batch triggers the provider's internal map recomputation.
/// The derivation algorithm, like the harvester feeding this sink, lives
/// outside this crate.
pub trait RssiSink: Send + Sync {
    fn submit_batch(&self, samples: &[RssiSample]);
}

/// Serves a fixed, preconfigured channel map.
///
/// Stands in when no live RSSI harvester is attached: sample batches are
/// counted for diagnostics and the map never changes.
#[derive(Debug)]
pub struct FixedMapProvider {
    map: Vec<u8>,
    batches_seen: AtomicU64,
}

impl FixedMapProvider {
    pub fn new(map: Vec<u8>) -> Self {
        Self {
            map,
            batches_seen: AtomicU64::new(0),
        }
    }

    /// Number of sample batches submitted so far.
    pub fn batches_seen(&self) -> u64 {
        self.batches_seen.load(Ordering::Relaxed)
    }
}

impl ChannelMapProvider for FixedMapProvider {
    fn current_map(&self) -> Vec<u8> {
        self.map.clone()
    }
}

impl RssiSink for FixedMapProvider {
    fn submit_batch(&self, samples: &[RssiSample]) {
        self.batches_seen.fetch_add(1, Ordering::Relaxed);
        trace!(samples = samples.len(), "rssi batch recorded, map unchanged");
    }
}
