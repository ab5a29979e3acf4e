use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "lsdai-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_lsdai-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(&output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("clear-mid-download"));
    let _ = std::fs::remove_file(output_path);
}

#[test]
fn cli_logic_run_writes_markdown_report() {
    let exe = env!("CARGO_BIN_EXE_lsdai-tester");
    let output_path = temp_path("logic");
    let output = Command::new(exe)
        .args([
            "--report",
            "markdown",
            "--scenarios",
            "selection-totals,sequential-queue",
            "--iterations",
            "2",
            "--seeds",
            "1,0x2",
            "--tick-ms",
            "1",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success(), "{output:?}");
    let report = std::fs::read_to_string(&output_path).expect("read report");
    assert!(report.contains("- **Total scenarios**: 4"));
    assert!(report.contains("- **Failed**: 0"));
    let _ = std::fs::remove_file(output_path);
}

#[test]
fn cli_prefs_file_persists_between_runs() {
    let exe = env!("CARGO_BIN_EXE_lsdai-tester");
    let prefs_path = temp_path("prefs");
    for _ in 0..2 {
        let status = Command::new(exe)
            .args(["--scenarios", "favorites-persist", "--iterations", "1", "--prefs-file"])
            .arg(&prefs_path)
            .status()
            .expect("run cli");
        assert!(status.success());
    }
    let stored = std::fs::read_to_string(&prefs_path).expect("read prefs");
    assert!(stored.contains("favorites"));
    let _ = std::fs::remove_file(prefs_path);
}

#[test]
fn cli_runs_with_unknown_browser_and_json_report() {
    let exe = env!("CARGO_BIN_EXE_lsdai-tester");
    let output_path = temp_path("run");
    let output = Command::new(exe)
        .args([
            "--mode",
            "browser",
            "--browsers",
            "unknown",
            "--report",
            "json",
            "--scenarios",
            "smoke",
            "--seeds",
            "1",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("LSDAI Automated Tester"));
    assert!(stderr.contains("Unknown browser"));
    let report = std::fs::read_to_string(&output_path).expect("read report");
    assert!(report.starts_with("[]"));
    let _ = std::fs::remove_file(output_path);
}

#[test]
fn cli_rejects_out_of_range_failure_rate() {
    let exe = env!("CARGO_BIN_EXE_lsdai-tester");
    let output = Command::new(exe)
        .args(["--failure-rate", "2"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
}
