//! End-to-end pipeline tests over a scripted shell opener.
//!
//! These drive the orchestrator through the public API: fake devices answer
//! the two fetch commands with canned configurations, and the assertions
//! check the on-disk snapshot tree, the diff reports, and the run-level
//! summary gating.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;

use cfgdrift::device::{ConfigKind, Device, Vendor};
use cfgdrift::error::{SessionError, TransportError};
use cfgdrift::orchestrator::{DeviceStatus, Orchestrator};
use cfgdrift::session::{SessionDriver, SessionSettings};
use cfgdrift::store::SnapshotStore;
use cfgdrift::transport::{ShellChannel, ShellOpener};

/// Shell that answers the two fetch commands with canned text, terminated
/// by a prompt line so the driver's completion detection fires.
struct ScriptedShell {
    running: String,
    startup: String,
    pending: VecDeque<Bytes>,
    fail_startup: bool,
}

#[async_trait]
impl ShellChannel for ScriptedShell {
    async fn read_chunk(&mut self, _wait: Duration) -> Result<Option<Bytes>, SessionError> {
        Ok(self.pending.pop_front())
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let text = String::from_utf8_lossy(data);
        if text.starts_with(ConfigKind::Running.fetch_command()) {
            let reply = format!("{}\nsw#", self.running);
            self.pending.push_back(Bytes::from(reply));
        } else if text.starts_with(ConfigKind::Startup.fetch_command()) {
            if self.fail_startup {
                return Err(SessionError::Closed);
            }
            let reply = format!("{}\nsw#", self.startup);
            self.pending.push_back(Bytes::from(reply));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Opener producing scripted shells per hostname. Hostnames starting with
/// "down-" refuse to connect; "nostartup-" devices fail the startup fetch.
struct ScriptedOpener {
    configs: HashMap<String, (String, String)>,
}

impl ScriptedOpener {
    fn new(configs: &[(&str, &str, &str)]) -> Self {
        Self {
            configs: configs
                .iter()
                .map(|(host, running, startup)| {
                    (host.to_string(), (running.to_string(), startup.to_string()))
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ShellOpener for ScriptedOpener {
    async fn open_shell(
        &self,
        device: &Device,
    ) -> Result<Box<dyn ShellChannel>, TransportError> {
        if device.hostname.starts_with("down-") {
            return Err(TransportError::Disconnected);
        }

        let (running, startup) = self
            .configs
            .get(&device.hostname)
            .cloned()
            .unwrap_or_default();

        Ok(Box::new(ScriptedShell {
            running,
            startup,
            pending: VecDeque::new(),
            fail_startup: device.hostname.starts_with("nostartup-"),
        }))
    }
}

fn fast_settings() -> SessionSettings {
    SessionSettings {
        command_timeout: Duration::from_secs(5),
        read_window: Duration::from_millis(5),
        max_read_window: Duration::from_millis(5),
        settle_delay: Duration::ZERO,
        page_delay: Duration::ZERO,
        probe_delay: Duration::ZERO,
        ..SessionSettings::default()
    }
}

fn device(hostname: &str, name: &str) -> Device {
    Device {
        hostname: hostname.to_string(),
        username: "admin".to_string(),
        password: "secret".to_string().into(),
        port: 22,
        device_type: Vendor::Huawei,
        device_name: name.to_string(),
    }
}

fn orchestrator(
    opener: ScriptedOpener,
    root: &std::path::Path,
) -> Arc<Orchestrator<ScriptedOpener>> {
    Arc::new(Orchestrator::new(
        opener,
        SessionDriver::new(fast_settings()),
        SnapshotStore::new(root),
    ))
}

#[tokio::test]
async fn test_first_run_persists_snapshots_and_diff_report() {
    let tmp = TempDir::new().unwrap();
    let opener = ScriptedOpener::new(&[(
        "10.0.0.1",
        "sysname a\nntp server 10.1.1.1",
        "sysname a",
    )]);

    let summary = orchestrator(opener, tmp.path())
        .run(vec![device("10.0.0.1", "core-sw1")])
        .await
        .unwrap();

    assert_eq!(summary.outcomes.len(), 1);
    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.status, DeviceStatus::Success);
    assert!(outcome.has_diff);
    // No previous startup snapshot existed, so the baseline "changed".
    assert!(outcome.startup_changed);

    // Snapshot tree layout
    let running_path = outcome.running_path.as_ref().unwrap();
    assert!(running_path.starts_with(tmp.path().join("core-sw1/running")));
    assert!(running_path.ends_with("10.0.0.1_running.txt"));
    assert!(outcome
        .startup_path
        .as_ref()
        .unwrap()
        .starts_with(tmp.path().join("core-sw1/startup")));

    // Diff report written, with the running addition listed
    let diff_path = outcome.diff_path.as_ref().unwrap();
    let diff_text = std::fs::read_to_string(diff_path).unwrap();
    assert!(diff_text.contains("运行配置中新增的行:\n+ ntp server 10.1.1.1\n"));
    assert!(diff_text.contains("没有删除的行。"));

    // Run-level summary written and mentions the device
    let report_path = summary.report_path.as_ref().unwrap();
    let report_text = std::fs::read_to_string(report_path).unwrap();
    assert!(report_text.contains("设备: core-sw1(10.0.0.1)"));
    assert!(report_text.contains("状态: success"));
}

#[tokio::test]
async fn test_second_identical_run_dedupes_and_suppresses_reports() {
    let tmp = TempDir::new().unwrap();
    let configs: &[(&str, &str, &str)] = &[(
        "10.0.0.1",
        "sysname a\nntp server 10.1.1.1",
        "sysname a",
    )];

    let first = orchestrator(ScriptedOpener::new(configs), tmp.path())
        .run(vec![device("10.0.0.1", "core-sw1")])
        .await
        .unwrap();
    assert!(first.outcomes[0].startup_changed);
    assert!(first.report_path.is_some());

    let second = orchestrator(ScriptedOpener::new(configs), tmp.path())
        .run(vec![device("10.0.0.1", "core-sw1")])
        .await
        .unwrap();
    let outcome = &second.outcomes[0];

    // Identical content: baseline did not move, nothing new written.
    assert_eq!(outcome.status, DeviceStatus::Success);
    assert!(outcome.has_diff);
    assert!(!outcome.startup_changed);
    assert!(outcome.diff_path.is_none());
    assert!(second.report_path.is_none());

    // The startup path points at the run-1 snapshot (deduplicated).
    assert_eq!(outcome.startup_path, first.outcomes[0].startup_path);

    // Exactly one version directory per kind.
    for kind in ["running", "startup"] {
        let versions = std::fs::read_dir(tmp.path().join("core-sw1").join(kind))
            .unwrap()
            .count();
        assert_eq!(versions, 1, "{} should have one version", kind);
    }
}

#[tokio::test]
async fn test_cross_device_summary_gating() {
    let tmp = TempDir::new().unwrap();

    // Device A: running differs from startup, but its startup baseline is
    // pre-seeded identical to what it will report (no baseline movement).
    // Device B: running matches startup, first capture (baseline moves).
    let device_a = device("10.0.0.1", "alpha");
    let device_b = device("10.0.0.2", "beta");

    let store = SnapshotStore::new(tmp.path());
    store
        .store(&device_a, ConfigKind::Startup, "sysname a\nsw#")
        .unwrap();

    let opener = ScriptedOpener::new(&[
        ("10.0.0.1", "sysname a\nntp server 10.1.1.1", "sysname a"),
        ("10.0.0.2", "sysname b", "sysname b"),
    ]);

    let summary = orchestrator(opener, tmp.path())
        .run(vec![device_a, device_b])
        .await
        .unwrap();

    let a = &summary.outcomes[0];
    let b = &summary.outcomes[1];

    assert!(a.has_diff && !a.startup_changed);
    assert!(a.diff_path.is_none(), "noise without baseline movement");

    assert!(!b.has_diff && b.startup_changed);
    let b_diff = std::fs::read_to_string(b.diff_path.as_ref().unwrap()).unwrap();
    assert!(b_diff.contains("运行配置与启动配置无差异。"));
    assert!(b_diff.contains("启动配置变化:"));

    // OR'd across devices: A supplies has_diff, B supplies startup_changed.
    assert!(summary.report_path.is_some());
}

#[tokio::test]
async fn test_partial_and_failed_statuses() {
    let tmp = TempDir::new().unwrap();
    let opener = ScriptedOpener::new(&[
        ("nostartup-10.0.0.3", "sysname c", "unused"),
        ("down-10.0.0.4", "", ""),
    ]);

    let summary = orchestrator(opener, tmp.path())
        .run(vec![
            device("nostartup-10.0.0.3", "gamma"),
            device("down-10.0.0.4", "delta"),
        ])
        .await
        .unwrap();

    let partial = &summary.outcomes[0];
    assert_eq!(partial.status, DeviceStatus::Partial);
    assert!(partial.running_path.is_some(), "running snapshot retained");
    assert!(partial.startup_path.is_none());
    assert!(partial.error.is_some());

    let failed = &summary.outcomes[1];
    assert_eq!(failed.status, DeviceStatus::Failed);
    assert!(failed.running_path.is_none());
    assert!(failed.error.is_some());
    assert!(!tmp.path().join("delta").exists());

    // Failures never warrant a run summary on their own.
    assert!(summary.report_path.is_none());
}

#[tokio::test]
async fn test_bounded_concurrency_preserves_inventory_order() {
    let tmp = TempDir::new().unwrap();
    let opener = ScriptedOpener::new(&[
        ("10.0.0.1", "sysname a", "sysname a"),
        ("10.0.0.2", "sysname b", "sysname b"),
        ("10.0.0.3", "sysname c", "sysname c"),
    ]);

    let summary = Arc::new(
        Orchestrator::new(
            opener,
            SessionDriver::new(fast_settings()),
            SnapshotStore::new(tmp.path()),
        )
        .with_max_concurrency(3),
    )
    .run(vec![
        device("10.0.0.1", "a"),
        device("10.0.0.2", "b"),
        device("10.0.0.3", "c"),
    ])
    .await
    .unwrap();

    let hostnames: Vec<&str> = summary
        .outcomes
        .iter()
        .map(|o| o.hostname.as_str())
        .collect();
    assert_eq!(hostnames, vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
}
