use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use esbtx_link::{SessionReport, SessionState};
use esbtx_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

fn state_name(state: SessionState) -> &'static str {
    match state {
        SessionState::Active => "active",
        SessionState::Closed => "closed",
    }
}

#[derive(Serialize)]
struct ReportOutput<'a> {
    port: &'a str,
    state: &'a str,
    frames_tx: u64,
    bytes_tx: u64,
    bytes_rx: u64,
}

/// Print the end-of-run per-session summary.
pub fn print_reports(reports: &[SessionReport], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for report in reports {
                let out = ReportOutput {
                    port: &report.port,
                    state: state_name(report.state),
                    frames_tx: report.frames_tx,
                    bytes_tx: report.bytes_tx,
                    bytes_rx: report.bytes_rx,
                };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "STATE", "FRAMES TX", "BYTES TX", "BYTES RX"]);
            for report in reports {
                table.add_row(vec![
                    report.port.clone(),
                    state_name(report.state).to_string(),
                    report.frames_tx.to_string(),
                    report.bytes_tx.to_string(),
                    report.bytes_rx.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for report in reports {
                println!(
                    "port={} state={} frames_tx={} bytes_tx={} bytes_rx={}",
                    report.port,
                    state_name(report.state),
                    report.frames_tx,
                    report.bytes_tx,
                    report.bytes_rx
                );
            }
        }
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    port: &'a str,
    kind: &'a str,
}

/// Print the host's visible serial ports.
pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for port in ports {
                let out = PortOutput {
                    port: &port.name,
                    kind: &port.kind,
                };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "KIND"]);
            for port in ports {
                table.add_row(vec![port.name.clone(), port.kind.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for port in ports {
                println!("port={} kind={}", port.name, port.kind);
            }
        }
    }
}

#[derive(Serialize)]
struct SentOutput<'a> {
    port: &'a str,
    frame_type: &'a str,
    wire_bytes: usize,
}

/// Confirm a single-frame send.
pub fn print_sent(port: &str, frame_type: &'static str, wire_bytes: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SentOutput {
                port,
                frame_type,
                wire_bytes,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("sent {frame_type} frame ({wire_bytes} bytes) to {port}");
        }
    }
}
