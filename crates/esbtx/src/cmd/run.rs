use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use esbtx_frame::{SyncKind, MAX_BODY};
use esbtx_link::{
    issue_sync, open_all, run_channel_map_updates, run_sequenced_payloads, FixedMapProvider,
    FloodConfig, OnFull, QueuePolicy, SessionRegistry,
};
use esbtx_transport::{MemoryTransport, SerialLink, Transport, DEFAULT_TIMEOUT};
use tracing::info;

use crate::cmd::RunArgs;
use crate::exit::{CliError, CliResult, SUCCESS, TRANSPORT_ERROR, USAGE};
use crate::output::{print_reports, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let cfg = flood_config(&args)?;
    let registry = SessionRegistry::new();

    let opened = if args.dry_run {
        open_all(&registry, &cfg.ports, cfg.queue, cfg.read_poll, |port| {
            Ok(Box::new(MemoryTransport::new(port)) as Box<dyn Transport>)
        })
    } else {
        open_all(&registry, &cfg.ports, cfg.queue, cfg.read_poll, |port| {
            SerialLink::open(port, cfg.baud, DEFAULT_TIMEOUT)
                .map(|link| Box::new(link) as Box<dyn Transport>)
        })
    };

    if opened == 0 {
        return Err(CliError::new(TRANSPORT_ERROR, "no ports could be opened"));
    }
    info!(
        opened,
        configured = cfg.ports.len(),
        "flood starting"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(Arc::clone(&shutdown))?;

    // Sync A opens the test window before any traffic flows.
    issue_sync(&registry, SyncKind::A);

    let provider = FixedMapProvider::new(args.map.clone());
    let ticks = thread::scope(|scope| {
        let broadcaster = scope.spawn(|| {
            run_channel_map_updates(
                &registry,
                &provider,
                cfg.map_interval,
                cfg.map_stagger,
                &shutdown,
            )
        });

        let ticks =
            run_sequenced_payloads(&registry, cfg.payload_interval, cfg.max_ticks, &shutdown);

        // The payload generator finishing (or ctrl-c) ends the run for the
        // broadcaster too.
        shutdown.store(true, Ordering::Release);
        let rounds = broadcaster.join().unwrap_or(0);
        info!(ticks, rounds, "generators stopped");
        ticks
    });

    // Sync B closes the window; it is the last frame each queue receives.
    issue_sync(&registry, SyncKind::B);
    registry.shutdown();

    info!(ticks, "flood finished");
    print_reports(&registry.reports(), format);
    Ok(SUCCESS)
}

fn flood_config(args: &RunArgs) -> CliResult<FloodConfig> {
    if args.map.len() > MAX_BODY {
        return Err(CliError::new(
            USAGE,
            format!("--map has {} entries, max {MAX_BODY}", args.map.len()),
        ));
    }

    let queue = match args.queue_bound {
        None => QueuePolicy::Unbounded,
        Some(0) => {
            return Err(CliError::new(USAGE, "--queue-bound must be at least 1"));
        }
        Some(capacity) => QueuePolicy::Bounded {
            capacity,
            on_full: if args.drop_oldest {
                OnFull::DropOldest
            } else {
                OnFull::Block
            },
        },
    };

    Ok(FloodConfig {
        ports: args.ports.clone(),
        baud: args.baud,
        payload_interval: parse_duration(&args.interval)?,
        max_ticks: if args.unbounded {
            None
        } else {
            Some(args.count)
        },
        map_interval: parse_duration(&args.map_interval)?,
        map_stagger: parse_duration(&args.stagger)?,
        queue,
        ..FloodConfig::default()
    })
}

/// Parse `10us` / `5ms` / `2s` / bare seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("us") {
        (num, "us")
    } else if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "us" => Ok(Duration::from_micros(value)),
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

fn install_ctrlc_handler(shutdown: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
