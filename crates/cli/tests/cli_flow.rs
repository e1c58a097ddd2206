use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::{tempdir, TempDir};

const DEADLINE: Duration = Duration::from_secs(10);

#[allow(deprecated)]
fn cli() -> Command {
    let mut cmd = Command::cargo_bin("fixture-store").expect("binary");
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[allow(deprecated)]
fn binary() -> PathBuf {
    assert_cmd::cargo::cargo_bin("fixture-store")
}

/// A `watch` process whose stderr lines are forwarded over a channel.
struct Watcher {
    child: Child,
    lines: Receiver<String>,
    seen: Vec<String>,
}

impl Watcher {
    fn spawn(dir: &Path, extra: &[&str]) -> Self {
        let mut child = std::process::Command::new(binary())
            .env("RUST_LOG", "info")
            .args(["watch", "--interval-ms", "50"])
            .args(extra)
            .arg("--dir")
            .arg(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn watch");
        let stderr = child.stderr.take().expect("stderr");
        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self {
            child,
            lines,
            seen: Vec::new(),
        }
    }

    fn wait_for_line(&mut self, needle: &str) {
        let start = Instant::now();
        while !self.seen.iter().any(|line| line.contains(needle)) {
            let left = DEADLINE.saturating_sub(start.elapsed());
            match self.lines.recv_timeout(left) {
                Ok(line) => self.seen.push(line),
                Err(_) => {
                    let _ = self.child.kill();
                    panic!("no {needle:?} on stderr, got {:#?}", self.seen);
                }
            }
        }
    }

    /// Wait for exit and return the status with the full stderr.
    fn finish(mut self) -> (ExitStatus, String) {
        let start = Instant::now();
        let status = loop {
            if let Some(status) = self.child.try_wait().expect("poll watch") {
                break status;
            }
            if start.elapsed() > DEADLINE {
                let _ = self.child.kill();
                panic!("watch did not exit, stderr so far {:#?}", self.seen);
            }
            thread::sleep(Duration::from_millis(20));
        };
        // the reader thread hangs up at EOF once the process is gone
        while let Ok(line) = self.lines.recv_timeout(DEADLINE) {
            self.seen.push(line);
        }
        (status, self.seen.join("\n"))
    }
}

fn setup_fixtures() -> TempDir {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("a.jpg"), [0xFF, 0xD8, 0xFF]).unwrap();
    fs::write(temp.path().join("b.png"), b"\x89PNG").unwrap();
    fs::write(temp.path().join("notes.txt"), b"hello").unwrap();
    fs::create_dir(temp.path().join("thumbs")).unwrap();
    temp
}

#[test]
fn list_prints_catalog_as_json() {
    let temp = setup_fixtures();
    let output = cli()
        .arg("list")
        .arg("--dir")
        .arg(temp.path())
        .output()
        .expect("run list");
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(
        body,
        json!([
            {"name": "a.jpg", "format": "jpeg", "bytes": 3},
            {"name": "b.png", "format": "png", "bytes": 4},
            {"name": "notes.txt", "format": "", "bytes": 5},
        ])
    );
}

#[test]
fn get_writes_raw_bytes_to_stdout() {
    let temp = setup_fixtures();
    cli()
        .args(["get", "a.jpg", "--dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::eq(&[0xFF_u8, 0xD8, 0xFF][..]));
}

#[test]
fn get_writes_to_out_file() {
    let temp = setup_fixtures();
    let out_dir = tempdir().unwrap();
    let out = out_dir.path().join("copy.png");

    cli()
        .args(["get", "b.png", "--dir"])
        .arg(temp.path())
        .arg("--out")
        .arg(&out)
        .assert()
        .success();
    assert_eq!(fs::read(&out).unwrap(), b"\x89PNG".to_vec());
}

#[test]
fn get_unknown_name_reports_source_param() {
    let temp = setup_fixtures();
    cli()
        .args(["get", "c.gif", "--dir"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "invalid parameter \"source\": unknown image \"c.gif\"",
        ));
}

#[test]
fn config_file_supplies_directory() {
    let temp = setup_fixtures();
    let config_dir = tempdir().unwrap();
    let config = config_dir.path().join("store.toml");
    fs::write(
        &config,
        format!(
            "dir = {:?}\n\n[refresh]\ninterval_ms = 1000\n",
            temp.path().display().to_string()
        ),
    )
    .unwrap();

    cli()
        .args(["get", "b.png", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::eq(&b"\x89PNG"[..]));
}

#[test]
fn directory_is_required() {
    cli()
        .args(["list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("either --dir or --config is required"));
}

#[test]
fn missing_directory_fails_startup() {
    let temp = tempdir().unwrap();
    let missing = temp.path().join("missing");

    cli()
        .arg("list")
        .arg("--dir")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("list directory"));

    cli()
        .args(["watch", "--interval-ms", "50", "--dir"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to start fixture store"));
}

#[test]
fn watch_rejects_zero_interval() {
    let temp = setup_fixtures();
    cli()
        .args(["watch", "--interval-ms", "0", "--dir"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("interval"));
}

#[test]
fn watch_exits_non_zero_when_refresh_aborts() {
    let temp = tempdir().unwrap();
    let dir = temp.path().join("images");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("a.jpg"), [0xFF, 0xD8, 0xFF]).unwrap();

    let mut watcher = Watcher::spawn(&dir, &["--on-error", "abort"]);
    watcher.wait_for_line("Starting refresh loop");
    fs::remove_dir_all(&dir).unwrap();

    let (status, stderr) = watcher.finish();
    assert!(!status.success(), "{stderr}");
    assert!(stderr.contains("Refresh loop failed"), "{stderr}");
    assert!(stderr.contains("list directory"), "{stderr}");
}

#[cfg(unix)]
#[test]
fn watch_stops_cleanly_on_interrupt() {
    let temp = setup_fixtures();
    let mut watcher = Watcher::spawn(temp.path(), &[]);
    watcher.wait_for_line("Starting refresh loop");

    // let a few ticks pass so the interrupt lands mid-loop
    thread::sleep(Duration::from_millis(200));
    let killed = std::process::Command::new("kill")
        .args(["-INT", &watcher.child.id().to_string()])
        .status()
        .expect("run kill");
    assert!(killed.success());

    let (status, stderr) = watcher.finish();
    assert!(status.success(), "{stderr}");
    assert!(stderr.contains("Interrupted, stopping refresh loop"), "{stderr}");
}
