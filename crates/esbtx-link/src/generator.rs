//! The three traffic producers feeding the registry.
//!
//! Each generator runs on its own thread, owned by the caller, and checks a
//! shared shutdown flag at every loop boundary. None of them waits on
//! another generator's progress; the per-session queues absorb whatever
//! interleaving the scheduler produces.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use esbtx_frame::{Message, SyncKind};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::provider::ChannelMapProvider;
use crate::registry::SessionRegistry;

/// Granularity at which sleeping generators notice shutdown.
const SHUTDOWN_SLICE: Duration = Duration::from_millis(50);

/// Deterministic synthetic payload for a sequence number.
///
/// 32 lowercase-hex ASCII bytes derived from the decimal sequence number, so
/// a receiver (or a test) can recompute the expected content for any `seq`.
/// The content itself is opaque test data.
pub fn synthetic_payload(seq: u32) -> Bytes {
    let digest = Sha256::digest(seq.to_string().as_bytes());
    let mut hex = String::with_capacity(32);
    for byte in &digest[..16] {
        let _ = write!(hex, "{byte:02x}");
    }
    Bytes::from(hex.into_bytes())
}

/// Broadcast sequenced payloads until `max_ticks` or shutdown.
///
/// Each tick derives the payload from a counter starting at 0, broadcasts a
/// data message carrying that counter as its sequence number, then sleeps
/// `interval`. Returns the number of ticks completed.
pub fn run_sequenced_payloads(
    registry: &SessionRegistry,
    interval: Duration,
    max_ticks: Option<u64>,
    shutdown: &AtomicBool,
) -> u64 {
    let mut seq: u32 = 0;
    let mut ticks: u64 = 0;

    while !shutdown.load(Ordering::Acquire) {
        if let Some(max) = max_ticks {
            if ticks >= max {
                break;
            }
        }

        let payload = synthetic_payload(seq);
        match registry.broadcast(|| Message::Data {
            seq,
            payload: payload.clone(),
        }) {
            Ok(reached) => debug!(seq, reached, "sequenced payload broadcast"),
            Err(err) => {
                error!(seq, error = %err, "sequenced payload rejected");
                break;
            }
        }

        seq = seq.wrapping_add(1);
        ticks += 1;
        sleep_interruptible(interval, shutdown);
    }

    info!(ticks, "sequenced payload generator finished");
    ticks
}

/// Broadcast the provider's current channel map every `interval`.
///
/// Each round fetches the map once and delivers it to the sessions one at a
/// time with `stagger` between deliveries. The first round fires
/// immediately on start. Returns the number of completed rounds.
pub fn run_channel_map_updates(
    registry: &SessionRegistry,
    provider: &dyn ChannelMapProvider,
    interval: Duration,
    stagger: Duration,
    shutdown: &AtomicBool,
) -> u64 {
    let mut rounds: u64 = 0;

    while !shutdown.load(Ordering::Acquire) {
        let channels = provider.current_map();
        match registry.broadcast_staggered(
            || Message::ChannelMap {
                channels: channels.clone(),
            },
            stagger,
        ) {
            Ok(reached) => {
                debug!(?channels, reached, "channel map broadcast");
                rounds += 1;
            }
            Err(err) => {
                error!(error = %err, "channel map rejected");
                break;
            }
        }

        sleep_interruptible(interval, shutdown);
    }

    info!(rounds, "channel map broadcaster finished");
    rounds
}

/// Broadcast a sync marker to every active session, on explicit trigger.
///
/// Marks a synchronization point in the transmitted stream, typically
/// bracketing a test window. Returns the number of sessions reached.
pub fn issue_sync(registry: &SessionRegistry, kind: SyncKind) -> usize {
    match registry.broadcast(|| Message::Sync { kind }) {
        Ok(reached) => {
            info!(?kind, reached, "sync marker issued");
            reached
        }
        // Sync frames have an empty body; no precondition can fail.
        Err(err) => {
            error!(?kind, error = %err, "sync marker rejected");
            0
        }
    }
}

fn sleep_interruptible(total: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + total;
    while !shutdown.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(SHUTDOWN_SLICE));
    }
}

#[cfg(test)]
mod tests {
    use esbtx_frame::{TYPE_CHANNEL_MAP, TYPE_DATA, TYPE_SYNC_A, TYPE_SYNC_B};
    use esbtx_transport::MemoryTransport;

    use crate::config::QueuePolicy;
    use crate::provider::FixedMapProvider;
    use crate::session::PortSession;

    use super::*;

    fn registry_with_memory_ports(names: &[&str]) -> (SessionRegistry, Vec<MemoryTransport>) {
        let registry = SessionRegistry::new();
        let mut handles = Vec::new();
        for name in names {
            let transport = MemoryTransport::new(*name);
            handles.push(transport.clone());
            let session = PortSession::spawn(
                Box::new(transport),
                QueuePolicy::Unbounded,
                Duration::from_millis(1),
            )
            .expect("memory session should spawn");
            registry.register(session).expect("unique port names");
        }
        (registry, handles)
    }

    fn parse_frames(wire: &[u8]) -> Vec<(u8, Vec<u8>)> {
        let mut frames = Vec::new();
        let mut rest = wire;
        while !rest.is_empty() {
            assert!(rest.len() >= 2, "truncated header in capture");
            let (frame_type, len) = (rest[0], rest[1] as usize);
            assert!(rest.len() >= 2 + len, "truncated body in capture");
            frames.push((frame_type, rest[2..2 + len].to_vec()));
            rest = &rest[2 + len..];
        }
        frames
    }

    #[test]
    fn synthetic_payload_is_deterministic_hex() {
        let p0 = synthetic_payload(0);
        assert_eq!(p0.len(), 32);
        assert!(p0.iter().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(p0, synthetic_payload(0));
        assert_ne!(p0, synthetic_payload(1));
    }

    #[test]
    fn every_port_gets_the_same_sequence() {
        // Scenario: two ports, three ticks, seqs 0..3 on each in order.
        let (registry, handles) = registry_with_memory_ports(&["portX", "portY"]);
        let shutdown = AtomicBool::new(false);

        let ticks = run_sequenced_payloads(
            &registry,
            Duration::from_micros(100),
            Some(3),
            &shutdown,
        );
        assert_eq!(ticks, 3);

        registry.shutdown();

        for handle in &handles {
            let frames = parse_frames(&handle.written());
            assert_eq!(frames.len(), 3);
            for (i, (frame_type, body)) in frames.iter().enumerate() {
                assert_eq!(*frame_type, TYPE_DATA);
                let seq = u32::from_le_bytes(body[..4].try_into().unwrap());
                assert_eq!(seq, i as u32);
                assert_eq!(&body[4..], synthetic_payload(seq).as_ref());
            }
        }
    }

    #[test]
    fn sequenced_generator_honors_shutdown() {
        let (registry, _handles) = registry_with_memory_ports(&["portX"]);
        let shutdown = AtomicBool::new(true);

        let ticks = run_sequenced_payloads(&registry, Duration::from_secs(60), None, &shutdown);
        assert_eq!(ticks, 0);
        registry.shutdown();
    }

    #[test]
    fn channel_map_round_reaches_every_session() {
        // Scenario: map [3, 7, 11] delivered to both ports, staggered.
        let (registry, handles) = registry_with_memory_ports(&["portX", "portY"]);
        let provider = FixedMapProvider::new(vec![3, 7, 11]);
        let shutdown = AtomicBool::new(false);

        let rounds = thread::scope(|scope| {
            let broadcaster = scope.spawn(|| {
                run_channel_map_updates(
                    &registry,
                    &provider,
                    Duration::from_secs(60),
                    Duration::from_millis(5),
                    &shutdown,
                )
            });

            // The first round fires immediately; give it time to land.
            thread::sleep(Duration::from_millis(100));
            shutdown.store(true, Ordering::Release);
            broadcaster.join().expect("broadcaster thread")
        });
        assert_eq!(rounds, 1);

        registry.shutdown();

        for handle in &handles {
            let frames = parse_frames(&handle.written());
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0], (TYPE_CHANNEL_MAP, vec![3, 7, 11]));
        }
    }

    #[test]
    fn sync_markers_bracket_a_window() {
        let (registry, handles) = registry_with_memory_ports(&["portX"]);

        assert_eq!(issue_sync(&registry, SyncKind::A), 1);
        assert_eq!(issue_sync(&registry, SyncKind::B), 1);

        registry.shutdown();

        let frames = parse_frames(&handles[0].written());
        let types: Vec<u8> = frames.iter().map(|(t, _)| *t).collect();
        assert_eq!(types, [TYPE_SYNC_A, TYPE_SYNC_B]);
        assert!(frames.iter().all(|(_, body)| body.is_empty()));
    }
}
