use clap::{Args, Subcommand, ValueEnum};
use esbtx_frame::SyncKind;
use esbtx_transport::DEFAULT_BAUD;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod ports;
pub mod run;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Flood the configured ports with framed test traffic.
    Run(RunArgs),
    /// Send a single frame to one port.
    Send(SendArgs),
    /// List serial ports visible to the host.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn dispatch(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Port to open; repeat for multiple targets, order is kept.
    #[arg(short = 'p', long = "port", value_name = "PORT", required = true)]
    pub ports: Vec<String>,
    /// Serial line rate.
    #[arg(long, default_value_t = DEFAULT_BAUD)]
    pub baud: u32,
    /// Pacing between sequenced payloads (e.g. 10us, 5ms, 1s).
    #[arg(long, default_value = "10us")]
    pub interval: String,
    /// Sequenced payload ticks before the run ends.
    #[arg(long, default_value_t = 100_000, conflicts_with = "unbounded")]
    pub count: u64,
    /// Run until interrupted instead of stopping at --count.
    #[arg(long)]
    pub unbounded: bool,
    /// Channel map to broadcast (comma-separated channel indices).
    #[arg(long, value_delimiter = ',', default_value = "4,25,42,63,77")]
    pub map: Vec<u8>,
    /// Period between channel-map broadcast rounds.
    #[arg(long, default_value = "2s")]
    pub map_interval: String,
    /// Inter-session delay within one channel-map round.
    #[arg(long, default_value = "200ms")]
    pub stagger: String,
    /// Bound each session's outbound queue (unbounded when omitted).
    #[arg(long, value_name = "N")]
    pub queue_bound: Option<usize>,
    /// With --queue-bound, drop the oldest queued message instead of
    /// blocking the producer when a queue is full.
    #[arg(long, requires = "queue_bound")]
    pub drop_oldest: bool,
    /// Use in-memory loopback transports instead of serial ports.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Port to open.
    pub port: String,
    /// Serial line rate.
    #[arg(long, default_value_t = DEFAULT_BAUD)]
    pub baud: u32,
    /// Sync marker to send.
    #[arg(long, conflicts_with_all = ["data", "map"])]
    pub sync: Option<SyncArg>,
    /// Payload for a sequenced data frame.
    #[arg(long, conflicts_with_all = ["sync", "map"])]
    pub data: Option<String>,
    /// Sequence number carried by --data.
    #[arg(long, default_value_t = 0)]
    pub seq: u32,
    /// Channel map to send (comma-separated channel indices).
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["sync", "data"])]
    pub map: Option<Vec<u8>>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum SyncArg {
    A,
    B,
}

impl SyncArg {
    pub fn kind(self) -> SyncKind {
        match self {
            SyncArg::A => SyncKind::A,
            SyncArg::B => SyncKind::B,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
