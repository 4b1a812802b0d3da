use std::collections::BTreeSet;
use std::process::Command;

fn esbtx() -> Command {
    Command::new(env!("CARGO_BIN_EXE_esbtx"))
}

#[test]
fn dry_run_transmits_bracketed_frame_count() {
    let output = esbtx()
        .args([
            "--format",
            "json",
            "--log-level",
            "error",
            "run",
            "--dry-run",
            "-p",
            "memX",
            "-p",
            "memY",
            "--count",
            "3",
            "--interval",
            "1ms",
            "--map",
            "3,7,11",
            "--map-interval",
            "30s",
            "--stagger",
            "0ms",
        ])
        .output()
        .expect("esbtx run should execute");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf-8");
    let mut ports = BTreeSet::new();

    for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
        let report: serde_json::Value =
            serde_json::from_str(line).expect("each stdout line is a json report");

        ports.insert(report["port"].as_str().expect("port name").to_string());
        assert_eq!(report["state"], "closed");

        // Per port: sync A + 3 data ticks + 1 map round + sync B.
        assert_eq!(report["frames_tx"], 6, "unexpected report: {report}");
        // 2 sync frames (2B each) + 3 data frames (38B each) + map [3,7,11] (5B).
        assert_eq!(report["bytes_tx"], 123, "unexpected report: {report}");
    }

    assert_eq!(
        ports,
        BTreeSet::from(["memX".to_string(), "memY".to_string()])
    );
}

#[test]
fn run_fails_when_no_port_opens() {
    let output = esbtx()
        .args([
            "--log-level",
            "error",
            "run",
            "-p",
            "/dev/esbtx-no-such-port",
            "--count",
            "1",
        ])
        .output()
        .expect("esbtx run should execute");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("no ports could be opened"),
        "stderr: {stderr}"
    );
}

#[test]
fn send_without_payload_is_a_usage_error() {
    // Resolution fails before any open attempt, so even a bogus port name
    // reports usage, not a transport failure.
    let output = esbtx()
        .args(["--log-level", "error", "send", "/dev/esbtx-no-such-port"])
        .output()
        .expect("esbtx send should execute");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_package_version() {
    let output = esbtx()
        .args(["version"])
        .output()
        .expect("esbtx version should execute");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("esbtx "));
}
