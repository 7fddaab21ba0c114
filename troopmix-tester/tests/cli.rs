use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "troopmix-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_troopmix-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("thread-stress"));
}

#[test]
fn cli_runs_scenarios_with_json_report() {
    let exe = env!("CARGO_BIN_EXE_troopmix-tester");
    let output_path = temp_path("run");
    let output = Command::new(exe)
        .args([
            "--report",
            "json",
            "--scenarios",
            "smoke,civilian-exempt,guard-unwind",
            "--iterations",
            "2",
            "--seeds",
            "1,village_elder_07",
            "--threads",
            "2",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Troopmix Override Tester"));

    let content = std::fs::read_to_string(output_path).expect("read output");
    let results: serde_json::Value = serde_json::from_str(&content).expect("json report");
    let runs = results.as_array().expect("array of results");
    assert_eq!(runs.len(), 6);
    assert!(runs.iter().all(|r| r["passed"] == true));
}

#[test]
fn cli_reads_config_file_and_reports_missing_hooks() {
    let exe = env!("CARGO_BIN_EXE_troopmix-tester");
    let config_path = temp_path("config.json");
    std::fs::write(&config_path, r#"{ "female_percentage": 0 }"#).expect("write config");
    let output_path = temp_path("console");
    let output = Command::new(exe)
        .args([
            "--scenarios",
            "smoke",
            "--iterations",
            "1",
            "--missing-hooks",
            "encyclopedia",
            "--config",
        ])
        .arg(&config_path)
        .arg("--output")
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("encyclopedia"));
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Hooks installed: 4/5"));
    assert!(content.contains("Female share: 0.0%"));
}

#[test]
fn cli_rejects_invalid_config() {
    let exe = env!("CARGO_BIN_EXE_troopmix-tester");
    let config_path = temp_path("bad-config.json");
    std::fs::write(&config_path, r#"{ "female_percentage": 250 }"#).expect("write config");
    let output = Command::new(exe)
        .args(["--config"])
        .arg(&config_path)
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load override config"));
}
