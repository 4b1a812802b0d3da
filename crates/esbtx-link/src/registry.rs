use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use esbtx_frame::Message;
use esbtx_transport::Transport;
use tracing::{info, warn};

use crate::config::QueuePolicy;
use crate::error::{LinkError, Result};
use crate::session::{PortSession, SessionState};

/// Tracks every session by port identifier and fans messages out to them.
///
/// One mutex guards registration and broadcast enumeration, and nothing
/// else; each session's queue does its own synchronization. The registry is
/// populated at startup and never shrinks: a session that hits a fatal
/// transport error stays registered in its closed state and broadcasts skip
/// it.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<Vec<PortSession>>,
}

/// Point-in-time view of one session, for end-of-run reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub port: String,
    pub state: SessionState,
    pub frames_tx: u64,
    pub bytes_tx: u64,
    pub bytes_rx: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PortSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a session. The port name must be unique.
    pub fn register(&self, session: PortSession) -> Result<()> {
        let mut sessions = self.lock();
        if sessions.iter().any(|s| s.port() == session.port()) {
            return Err(LinkError::DuplicatePort {
                port: session.port().to_string(),
            });
        }
        sessions.push(session);
        Ok(())
    }

    /// Number of registered sessions, closed ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Enqueue one factory-produced message per active session.
    ///
    /// The session set is a consistent snapshot relative to concurrent
    /// registration, and no session active at call time is skipped. Each
    /// session's writer still paces its own transmission; nothing here
    /// makes the sends simultaneous.
    ///
    /// Returns the number of sessions reached.
    pub fn broadcast(&self, factory: impl FnMut() -> Message) -> Result<usize> {
        self.broadcast_inner(factory, None)
    }

    /// [`broadcast`](Self::broadcast), sleeping `stagger` after each session.
    ///
    /// Spreads one round of deliveries over time so all transports do not
    /// burst at the same instant. The registry lock is held across the
    /// sleeps, so the round still sees one consistent session set.
    pub fn broadcast_staggered(
        &self,
        factory: impl FnMut() -> Message,
        stagger: Duration,
    ) -> Result<usize> {
        self.broadcast_inner(factory, Some(stagger))
    }

    fn broadcast_inner(
        &self,
        mut factory: impl FnMut() -> Message,
        stagger: Option<Duration>,
    ) -> Result<usize> {
        let sessions = self.lock();
        let mut reached = 0usize;

        for session in sessions.iter() {
            if session.state() != SessionState::Active {
                continue;
            }
            match session.enqueue(factory()) {
                Ok(()) => reached += 1,
                // Lost the race with a fatal transport error; the session
                // closed between the state check and the enqueue.
                Err(LinkError::SessionClosed { port }) => {
                    warn!(port = %port, "session closed mid-broadcast");
                }
                Err(err) => return Err(err),
            }
            if let Some(delay) = stagger {
                thread::sleep(delay);
            }
        }

        Ok(reached)
    }

    /// Snapshot every session's state and counters.
    pub fn reports(&self) -> Vec<SessionReport> {
        self.lock()
            .iter()
            .map(|session| {
                let stats = session.stats();
                SessionReport {
                    port: session.port().to_string(),
                    state: session.state(),
                    frames_tx: stats.frames_tx(),
                    bytes_tx: stats.bytes_tx(),
                    bytes_rx: stats.bytes_rx(),
                }
            })
            .collect()
    }

    /// Close every session and wait for its backlog to drain.
    pub fn shutdown(&self) {
        let mut sessions = self.lock();
        for session in sessions.iter_mut() {
            session.close_and_join();
        }
        info!(sessions = sessions.len(), "all sessions closed");
    }
}

/// Open every configured port and register a session for it.
///
/// A port that fails to open is logged and skipped; the remaining ports
/// proceed unaffected. Returns the number of sessions registered.
pub fn open_all<F>(
    registry: &SessionRegistry,
    ports: &[String],
    policy: QueuePolicy,
    read_poll: Duration,
    mut open: F,
) -> usize
where
    F: FnMut(&str) -> esbtx_transport::Result<Box<dyn Transport>>,
{
    let mut opened = 0usize;

    for port in ports {
        let transport = match open(port) {
            Ok(transport) => transport,
            Err(err) => {
                warn!(port = %port, error = %err, "skipping port");
                continue;
            }
        };

        let session = match PortSession::spawn(transport, policy, read_poll) {
            Ok(session) => session,
            Err(err) => {
                warn!(port = %port, error = %err, "skipping port");
                continue;
            }
        };

        match registry.register(session) {
            Ok(()) => {
                info!(port = %port, "session active");
                opened += 1;
            }
            Err(err) => warn!(port = %port, error = %err, "skipping port"),
        }
    }

    opened
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use bytes::Bytes;
    use esbtx_frame::{SyncKind, TYPE_CHANNEL_MAP};
    use esbtx_transport::{MemoryTransport, TransportError};

    use super::*;

    fn memory_session(name: &str) -> (PortSession, MemoryTransport) {
        let transport = MemoryTransport::new(name);
        let handle = transport.clone();
        let session = PortSession::spawn(
            Box::new(transport),
            QueuePolicy::Unbounded,
            Duration::from_millis(1),
        )
        .expect("memory session should spawn");
        (session, handle)
    }

    #[test]
    fn duplicate_port_rejected() {
        let registry = SessionRegistry::new();
        let (first, _h1) = memory_session("mem0");
        let (second, _h2) = memory_session("mem0");

        registry.register(first).expect("first registration");
        let err = registry.register(second).unwrap_err();
        assert!(matches!(err, LinkError::DuplicatePort { port } if port == "mem0"));
        assert_eq!(registry.len(), 1);

        registry.shutdown();
    }

    #[test]
    fn broadcast_reaches_every_active_session_once() {
        let registry = SessionRegistry::new();
        let (s0, h0) = memory_session("mem0");
        let (s1, h1) = memory_session("mem1");
        registry.register(s0).unwrap();
        registry.register(s1).unwrap();

        let reached = registry
            .broadcast(|| Message::Sync { kind: SyncKind::A })
            .unwrap();
        assert_eq!(reached, 2);

        registry.shutdown();
        assert_eq!(h0.written(), vec![11, 0]);
        assert_eq!(h1.written(), vec![11, 0]);
    }

    #[test]
    fn broadcast_skips_closed_sessions() {
        let registry = SessionRegistry::new();
        let (s0, h0) = memory_session("mem0");
        let (s1, h1) = memory_session("mem1");
        registry.register(s0).unwrap();
        registry.register(s1).unwrap();

        // Fatal write error on mem1 only.
        h1.break_writes();
        registry
            .broadcast(|| Message::Sync { kind: SyncKind::A })
            .unwrap();

        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            let reports = registry.reports();
            if reports[1].state == SessionState::Closed {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }

        let reached = registry
            .broadcast(|| Message::Sync { kind: SyncKind::B })
            .unwrap();
        assert_eq!(reached, 1);

        registry.shutdown();
        assert_eq!(h0.written(), vec![11, 0, 12, 0]);
        assert!(h1.written().is_empty());
    }

    #[test]
    fn broadcast_propagates_precondition_failures() {
        let registry = SessionRegistry::new();
        let (s0, _h0) = memory_session("mem0");
        registry.register(s0).unwrap();

        let err = registry
            .broadcast(|| Message::ChannelMap {
                channels: vec![0u8; 300],
            })
            .unwrap_err();
        assert!(matches!(err, LinkError::Frame(_)));

        registry.shutdown();
    }

    #[test]
    fn staggered_broadcast_spreads_deliveries() {
        let registry = SessionRegistry::new();
        let (s0, h0) = memory_session("mem0");
        let (s1, h1) = memory_session("mem1");
        registry.register(s0).unwrap();
        registry.register(s1).unwrap();

        let stagger = Duration::from_millis(30);
        let start = Instant::now();
        let reached = registry
            .broadcast_staggered(
                || Message::ChannelMap {
                    channels: vec![3, 7, 11],
                },
                stagger,
            )
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(reached, 2);
        assert!(elapsed >= stagger * 2, "round finished in {elapsed:?}");

        registry.shutdown();
        assert_eq!(h0.written(), vec![TYPE_CHANNEL_MAP, 3, 3, 7, 11]);
        assert_eq!(h1.written(), vec![TYPE_CHANNEL_MAP, 3, 3, 7, 11]);
    }

    #[test]
    fn open_all_skips_unavailable_port() {
        let registry = SessionRegistry::new();
        let handle_x = MemoryTransport::new("portX");
        let opener_x = handle_x.clone();

        let ports = vec!["portX".to_string(), "portY".to_string()];
        let opened = open_all(
            &registry,
            &ports,
            QueuePolicy::Unbounded,
            Duration::from_millis(1),
            |port| {
                if port == "portY" {
                    Err(TransportError::Open {
                        port: port.to_string(),
                        source: serial_open_failure(),
                    })
                } else {
                    Ok(Box::new(opener_x.clone()) as Box<dyn Transport>)
                }
            },
        );

        assert_eq!(opened, 1);
        assert_eq!(registry.len(), 1);

        // The surviving session is fully operative.
        let reached = registry
            .broadcast(|| Message::Data {
                seq: 0,
                payload: Bytes::from_static(b"still here"),
            })
            .unwrap();
        assert_eq!(reached, 1);

        registry.shutdown();
        assert!(!handle_x.written().is_empty());
    }

    fn serial_open_failure() -> serialport::Error {
        serialport::Error::new(serialport::ErrorKind::NoDevice, "no such device")
    }
}
