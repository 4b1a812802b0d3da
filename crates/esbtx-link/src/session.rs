use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use esbtx_frame::{encode_message, type_name, Message};
use esbtx_transport::Transport;
use tracing::{debug, error, trace};

use crate::config::{OnFull, QueuePolicy};
use crate::error::{LinkError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 512;

/// How often the writer wakes from an empty queue to check the active flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Observable lifecycle state of a session.
///
/// A session is constructed from an already-open transport, so the only
/// transition is `Active` → `Closed`. `Closed` is terminal: it is reached on
/// a fatal transport error or an explicit close, and the session stays
/// registered but inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Closed,
}

/// Transmit/receive counters for one session.
#[derive(Debug, Default)]
pub struct SessionStats {
    frames_tx: AtomicU64,
    bytes_tx: AtomicU64,
    bytes_rx: AtomicU64,
}

impl SessionStats {
    /// Frames handed to the transport so far.
    pub fn frames_tx(&self) -> u64 {
        self.frames_tx.load(Ordering::Relaxed)
    }

    /// Wire bytes (headers included) handed to the transport so far.
    pub fn bytes_tx(&self) -> u64 {
        self.bytes_tx.load(Ordering::Relaxed)
    }

    /// Inbound bytes drained for monitoring so far.
    pub fn bytes_rx(&self) -> u64 {
        self.bytes_rx.load(Ordering::Relaxed)
    }

    fn record_tx(&self, wire_bytes: usize) {
        self.frames_tx.fetch_add(1, Ordering::Relaxed);
        self.bytes_tx.fetch_add(wire_bytes as u64, Ordering::Relaxed);
    }

    fn record_rx(&self, bytes: usize) {
        self.bytes_rx.fetch_add(bytes as u64, Ordering::Relaxed);
    }
}

/// One open transport paired with its exclusive outbound queue and its
/// writer/reader threads.
///
/// The queue is multi-producer, single-consumer: any generator may enqueue
/// concurrently, and only the session's own writer dequeues. Messages are
/// transmitted in exact enqueue order regardless of producer. A transport
/// failure on either thread closes this session and no other.
pub struct PortSession {
    port: String,
    tx: Option<Sender<Message>>,
    drain: Receiver<Message>,
    policy: QueuePolicy,
    active: Arc<AtomicBool>,
    stats: Arc<SessionStats>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl PortSession {
    /// Take ownership of an open transport and start both loops.
    pub fn spawn(
        transport: Box<dyn Transport>,
        policy: QueuePolicy,
        read_poll: Duration,
    ) -> Result<Self> {
        let port = transport.port_name().to_string();
        let reader_transport = transport.try_clone()?;

        let (tx, rx) = match policy {
            QueuePolicy::Unbounded => channel::unbounded(),
            QueuePolicy::Bounded { capacity, .. } => channel::bounded(capacity.max(1)),
        };
        let active = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(SessionStats::default());

        let writer = {
            let port = port.clone();
            let active = Arc::clone(&active);
            let stats = Arc::clone(&stats);
            let rx = rx.clone();
            thread::spawn(move || writer_loop(&port, transport, &rx, &active, &stats))
        };

        let reader = {
            let port = port.clone();
            let active = Arc::clone(&active);
            let stats = Arc::clone(&stats);
            thread::spawn(move || reader_loop(&port, reader_transport, &active, read_poll, &stats))
        };

        Ok(Self {
            port,
            tx: Some(tx),
            drain: rx,
            policy,
            active,
            stats,
            writer: Some(writer),
            reader: Some(reader),
        })
    }

    /// The port identifier this session serves.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.tx.is_some() && self.active.load(Ordering::Acquire) {
            SessionState::Active
        } else {
            SessionState::Closed
        }
    }

    /// Shared counters for this session.
    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }

    /// Append one message to the outbound queue.
    ///
    /// The framing precondition is checked here so an oversized message
    /// fails at the producer, visibly, instead of inside the writer.
    pub fn enqueue(&self, msg: Message) -> Result<()> {
        msg.validate()?;

        if self.state() != SessionState::Active {
            return Err(self.closed_err());
        }
        let tx = match &self.tx {
            Some(tx) => tx,
            None => return Err(self.closed_err()),
        };

        enqueue_with_policy(tx, &self.drain, self.policy, msg).map_err(|_| self.closed_err())
    }

    fn closed_err(&self) -> LinkError {
        LinkError::SessionClosed {
            port: self.port.clone(),
        }
    }

    /// Close the queue and wait for both loops to finish.
    ///
    /// The writer drains every message already enqueued before exiting, so a
    /// clean shutdown transmits the whole backlog.
    pub fn close_and_join(&mut self) {
        // Dropping the sender disconnects the queue once it is empty.
        self.tx.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
        self.active.store(false, Ordering::Release);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl Drop for PortSession {
    fn drop(&mut self) {
        // Detached threads must not outlive the session unnoticed.
        self.active.store(false, Ordering::Release);
        self.tx.take();
    }
}

impl std::fmt::Debug for PortSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortSession")
            .field("port", &self.port)
            .field("state", &self.state())
            .finish()
    }
}

fn enqueue_with_policy(
    tx: &Sender<Message>,
    drain: &Receiver<Message>,
    policy: QueuePolicy,
    msg: Message,
) -> std::result::Result<(), ()> {
    match policy {
        QueuePolicy::Unbounded
        | QueuePolicy::Bounded {
            on_full: OnFull::Block,
            ..
        } => tx.send(msg).map_err(|_| ()),
        QueuePolicy::Bounded {
            on_full: OnFull::DropOldest,
            ..
        } => {
            let mut msg = msg;
            loop {
                match tx.try_send(msg) {
                    Ok(()) => return Ok(()),
                    Err(TrySendError::Full(returned)) => {
                        // Steal one queued slot; the newest traffic wins.
                        if drain.try_recv().is_ok() {
                            trace!("queue full, dropped oldest message");
                        }
                        msg = returned;
                    }
                    Err(TrySendError::Disconnected(_)) => return Err(()),
                }
            }
        }
    }
}

fn writer_loop(
    port: &str,
    mut transport: Box<dyn Transport>,
    rx: &Receiver<Message>,
    active: &AtomicBool,
    stats: &SessionStats,
) {
    let mut buf = BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY);
    let mut last_tx: Option<Instant> = None;

    loop {
        if !active.load(Ordering::Acquire) {
            break;
        }

        let msg = match rx.recv_timeout(SHUTDOWN_POLL) {
            Ok(msg) => msg,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let frame = match encode_message(&msg) {
            Ok(frame) => frame,
            Err(err) => {
                // Enqueue validates, so this only fires on a logic bug.
                error!(port, error = %err, "dropping unencodable message");
                continue;
            }
        };

        buf.clear();
        frame.encode_into(&mut buf);

        if let Err(err) = transport.write_all(&buf) {
            error!(port, error = %err, "transport write failed, closing session");
            break;
        }

        stats.record_tx(buf.len());
        let gap_us = last_tx.map(|t| t.elapsed().as_micros() as u64);
        debug!(
            port,
            frame_type = type_name(frame.frame_type()),
            wire_bytes = buf.len(),
            gap_us,
            "tx"
        );
        last_tx = Some(Instant::now());
    }

    active.store(false, Ordering::Release);
}

fn reader_loop(
    port: &str,
    mut transport: Box<dyn Transport>,
    active: &AtomicBool,
    poll: Duration,
    stats: &SessionStats,
) {
    while active.load(Ordering::Acquire) {
        let available = match transport.bytes_to_read() {
            Ok(n) => n,
            Err(err) => {
                error!(port, error = %err, "transport read failed, closing session");
                break;
            }
        };

        if available == 0 {
            thread::sleep(poll);
            continue;
        }

        match transport.read_available() {
            Ok(data) => {
                if !data.is_empty() {
                    stats.record_rx(data.len());
                    trace!(port, len = data.len(), "rx");
                }
            }
            Err(err) => {
                error!(port, error = %err, "transport read failed, closing session");
                break;
            }
        }
    }

    active.store(false, Ordering::Release);
}
