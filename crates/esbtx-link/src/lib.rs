//! Per-port sessions, the broadcast registry, and the traffic generators.
//!
//! This is the dispatcher layer. Each configured port gets one
//! [`PortSession`] — an exclusive outbound queue plus a writer thread and a
//! reader thread over its transport. The [`SessionRegistry`] fans messages
//! out to every active session under one mutex, and the generators
//! (sequenced payloads, channel-map updates, sync markers) feed the registry
//! on their own pacing.
//!
//! Data flow: generator → [`SessionRegistry::broadcast`] → session queue →
//! writer thread → codec → transport.

pub mod config;
pub mod error;
pub mod generator;
pub mod provider;
pub mod registry;
pub mod session;

pub use config::{FloodConfig, OnFull, QueuePolicy};
pub use error::{LinkError, Result};
pub use generator::{
    issue_sync, run_channel_map_updates, run_sequenced_payloads, synthetic_payload,
};
pub use provider::{ChannelMapProvider, FixedMapProvider, RssiSample, RssiSink};
pub use registry::{open_all, SessionRegistry, SessionReport};
pub use session::{PortSession, SessionState, SessionStats};
