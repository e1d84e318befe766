#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/pinebridge-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn pinebridge(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pinebridge"));
    cmd.arg("--log-level")
        .arg("error")
        .arg("--runtime-dir")
        .arg(dir)
        .arg("--format")
        .arg("json")
        .env_remove("PINEBRIDGE_LOG_LEVEL");
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.stdin(Stdio::null())
        .output()
        .expect("pinebridge should run")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let text = String::from_utf8_lossy(&output.stdout);
    let line = text.lines().last().expect("command should print a line");
    serde_json::from_str(line).expect("stdout should be json")
}

struct Mock {
    child: Child,
}

impl Mock {
    fn spawn(dir: &Path, target: &str, extra: &[&str]) -> Self {
        let child = pinebridge(dir)
            .arg("mock")
            .arg(target)
            .args(extra)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("mock command should start");
        Mock { child }
    }

    fn wait_for_socket(&self, path: &Path, timeout: Duration) {
        let start = Instant::now();
        while !path.exists() {
            assert!(
                start.elapsed() < timeout,
                "mock socket {} did not appear",
                path.display()
            );
            thread::sleep(Duration::from_millis(25));
        }
    }
}

impl Drop for Mock {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn resolve_substitutes_default_slot() {
    let dir = unique_temp_dir("resolve");
    let output = run(pinebridge(&dir).arg("resolve").arg("pcsx2"));
    assert!(output.status.success(), "resolve should succeed");

    let json = stdout_json(&output);
    assert_eq!(json["target"], "pcsx2");
    assert_eq!(json["slot"], 28011);
    assert_eq!(
        json["primary"].as_str(),
        Some(dir.join("pcsx2.sock.28011").to_str().expect("utf-8 path"))
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn resolve_rejects_unknown_target_without_slot() {
    let dir = unique_temp_dir("resolve-unknown");
    let output = run(pinebridge(&dir).arg("resolve").arg("dolphin"));
    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pcsx2"), "error should list known targets");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn targets_lists_probe_order() {
    let dir = unique_temp_dir("targets");
    let output = run(pinebridge(&dir).arg("targets"));
    assert!(output.status.success());

    let json = stdout_json(&output);
    let names: Vec<&str> = json
        .as_array()
        .expect("targets should be an array")
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(names, vec!["pcsx2", "rpcs3"]);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn request_reads_through_mock_emulator() {
    let dir = unique_temp_dir("request");
    let mock = Mock::spawn(&dir, "pcsx2", &[]);
    mock.wait_for_socket(&dir.join("pcsx2.sock.28011"), Duration::from_secs(5));

    let output = run(pinebridge(&dir)
        .arg("request")
        .arg("write32")
        .arg("-p")
        .arg("address=0x35459C")
        .arg("-p")
        .arg("data=0x69637845"));
    assert!(output.status.success(), "write32 should succeed");

    let output = run(pinebridge(&dir)
        .arg("request")
        .arg("read32")
        .arg("-p")
        .arg("Woody-Address=0x35459C"));
    assert!(output.status.success(), "read32 should succeed");
    let json = stdout_json(&output);
    assert_eq!(json["target"], "pcsx2");
    assert_eq!(json["operation"], "read32");
    assert_eq!(json["resultCode"], 0);
    assert_eq!(json["memoryValue"], 0x6963_7845u32);

    let output = run(pinebridge(&dir).arg("request").arg("gameversion"));
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["gameVersion"], "1.00");

    drop(mock);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn emulator_failure_and_unsupported_result_codes() {
    let dir = unique_temp_dir("result-codes");

    let failing = Mock::spawn(&dir, "pcsx2", &["--result-code", "255"]);
    failing.wait_for_socket(&dir.join("pcsx2.sock.28011"), Duration::from_secs(5));
    let output = run(pinebridge(&dir).arg("request").arg("status"));
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout_json(&output)["resultCode"], 255);
    drop(failing);

    let odd = Mock::spawn(&dir, "rpcs3", &["--result-code", "7"]);
    odd.wait_for_socket(&dir.join("rpcs3.sock.28012"), Duration::from_secs(5));
    let output = run(pinebridge(&dir)
        .arg("request")
        .arg("status")
        .arg("--target")
        .arg("rpcs3"));
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stdout_json(&output)["resultCode"], 7);
    drop(odd);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn request_without_emulator_is_transport_error() {
    let dir = unique_temp_dir("offline");
    let output = run(pinebridge(&dir).arg("request").arg("version"));
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no emulator reachable"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn request_parameter_errors_are_usage() {
    let dir = unique_temp_dir("usage");
    let output = run(pinebridge(&dir).arg("request").arg("read8"));
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("address"));

    let output = run(pinebridge(&dir)
        .arg("request")
        .arg("write8")
        .arg("-p")
        .arg("address=1")
        .arg("-p")
        .arg("data=256"));
    assert_eq!(output.status.code(), Some(64));

    let output = run(pinebridge(&dir).arg("request").arg("reset"));
    assert_eq!(output.status.code(), Some(64));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn probe_reports_reachable_targets() {
    let dir = unique_temp_dir("probe");
    let output = run(pinebridge(&dir).arg("probe"));
    assert_eq!(output.status.code(), Some(3));

    let mock = Mock::spawn(&dir, "rpcs3", &[]);
    mock.wait_for_socket(&dir.join("rpcs3.sock.28012"), Duration::from_secs(5));
    let output = run(pinebridge(&dir).arg("probe"));
    assert!(output.status.success());

    let json = stdout_json(&output);
    let rows = json.as_array().expect("probe output should be an array");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["target"], "pcsx2");
    assert_eq!(rows[0]["reachable"], false);
    assert_eq!(rows[1]["target"], "rpcs3");
    assert_eq!(rows[1]["reachable"], true);

    drop(mock);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn watch_reports_status_from_supervised_session() {
    let dir = unique_temp_dir("watch");
    let mock = Mock::spawn(&dir, "pcsx2", &[]);
    mock.wait_for_socket(&dir.join("pcsx2.sock.28011"), Duration::from_secs(5));

    let output = run(pinebridge(&dir)
        .arg("watch")
        .arg("--interval")
        .arg("50ms")
        .arg("--retry-interval")
        .arg("50ms")
        .arg("--count")
        .arg("2"));
    assert!(output.status.success(), "watch should exit after two reports");

    let text = String::from_utf8_lossy(&output.stdout);
    let reports: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("each report should be json"))
        .collect();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["state"], "connected");
    assert_eq!(reports[0]["target"], "pcsx2");
    assert_eq!(reports[0]["statusName"], "running");

    drop(mock);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = run(Command::new(env!("CARGO_BIN_EXE_pinebridge")).arg("version"));
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert_eq!(text.trim(), format!("pinebridge {}", env!("CARGO_PKG_VERSION")));
}
