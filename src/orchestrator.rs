//! Per-device backup pipeline and run-level aggregation.
//!
//! For each device: fetch the running config, fetch the startup config,
//! persist both (deduplicated), diff running-vs-startup and
//! startup-vs-previous-startup, and decide whether a difference report is
//! warranted. Devices are independent; a bounded worker pool processes them
//! concurrently while each device's own pipeline stays strictly ordered.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use log::{info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::device::{ConfigKind, Device};
use crate::diff::{self, LineDiff};
use crate::error::{Error, Result};
use crate::report::{self, DiffReport};
use crate::session::SessionDriver;
use crate::store::SnapshotStore;
use crate::transport::ShellOpener;

/// Outcome status for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Both configurations fetched and processed.
    Success,
    /// Running fetched, startup fetch or later processing failed.
    Partial,
    /// Running fetch failed; nothing persisted this run.
    Failed,
}

impl DeviceStatus {
    /// The literal status string used in the run summary.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Success => "success",
            DeviceStatus::Partial => "partial",
            DeviceStatus::Failed => "failed",
        }
    }
}

/// One device's result for a run.
#[derive(Debug, Clone)]
pub struct DeviceOutcome {
    /// Hostname of the device.
    pub hostname: String,

    /// `name(hostname)` label.
    pub label: String,

    /// Pipeline status.
    pub status: DeviceStatus,

    /// Path of this run's running snapshot (new or deduplicated).
    pub running_path: Option<PathBuf>,

    /// Path of this run's startup snapshot (new or deduplicated).
    pub startup_path: Option<PathBuf>,

    /// Path of the persisted diff report, when one was warranted.
    pub diff_path: Option<PathBuf>,

    /// Whether running and startup configs differ.
    pub has_diff: bool,

    /// Whether the startup config changed since the last capture.
    pub startup_changed: bool,

    /// Failure cause for partial/failed outcomes.
    pub error: Option<String>,
}

impl DeviceOutcome {
    fn failed(device: &Device, error: String) -> Self {
        Self {
            hostname: device.hostname.clone(),
            label: device.label(),
            status: DeviceStatus::Failed,
            running_path: None,
            startup_path: None,
            diff_path: None,
            has_diff: false,
            startup_changed: false,
            error: Some(error),
        }
    }
}

/// Aggregated result of one run over the whole inventory.
#[derive(Debug)]
pub struct RunSummary {
    /// Per-device outcomes in inventory order.
    pub outcomes: Vec<DeviceOutcome>,

    /// Path of the appended run summary, when the gating rule fired.
    pub report_path: Option<PathBuf>,
}

impl RunSummary {
    /// Run-level gating rule: a summary is written only when at least one
    /// device had a running/startup difference AND at least one device
    /// (not necessarily the same one) had a startup change.
    pub fn warrants_report(&self) -> bool {
        let any_diff = self
            .outcomes
            .iter()
            .any(|o| o.status == DeviceStatus::Success && o.has_diff);
        let any_startup_change = self
            .outcomes
            .iter()
            .any(|o| o.status == DeviceStatus::Success && o.startup_changed);
        any_diff && any_startup_change
    }
}

/// Drives the full backup-and-compare run.
pub struct Orchestrator<O> {
    opener: O,
    driver: SessionDriver,
    store: SnapshotStore,
    max_concurrency: usize,
}

impl<O: ShellOpener + 'static> Orchestrator<O> {
    /// Create an orchestrator over a shell opener, session driver, and
    /// snapshot store.
    pub fn new(opener: O, driver: SessionDriver, store: SnapshotStore) -> Self {
        Self {
            opener,
            driver,
            store,
            max_concurrency: 1,
        }
    }

    /// Bound the number of devices processed concurrently (default 1).
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    /// Process every device, then write the run summary if warranted.
    pub async fn run(self: Arc<Self>, devices: Vec<Device>) -> Result<RunSummary> {
        info!("starting run over {} devices", devices.len());

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, device) in devices.into_iter().enumerate() {
            let this = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, this.process_device(&device).await)
            });
        }

        let mut slots: Vec<Option<DeviceOutcome>> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    if slots.len() <= index {
                        slots.resize(index + 1, None);
                    }
                    slots[index] = Some(outcome);
                }
                Err(e) => warn!("device task aborted: {}", e),
            }
        }
        let outcomes: Vec<DeviceOutcome> = slots.into_iter().flatten().collect();

        let mut summary = RunSummary {
            outcomes,
            report_path: None,
        };

        if summary.warrants_report() {
            let text = report::render_run_summary(Local::now(), &summary.outcomes);
            let path = self.store.append_run_summary(&text)?;
            info!("run summary appended to {}", path.display());
            summary.report_path = Some(path);
        } else {
            info!("no summary warranted for this run");
        }

        Ok(summary)
    }

    /// The three-stage pipeline for one device. Never returns an error: all
    /// failures are folded into the outcome so other devices keep going.
    pub async fn process_device(&self, device: &Device) -> DeviceOutcome {
        let label = device.label();
        info!("processing device {} (type: {})", label, device.device_type);

        // Stage 1: running config. Failure here is fatal for the device.
        let running = match self.fetch_config(device, ConfigKind::Running).await {
            Ok(text) => text,
            Err(e) => {
                warn!("device {} - running config fetch failed: {}", label, e);
                return DeviceOutcome::failed(device, e.to_string());
            }
        };
        let running_stored = match self.store.store(device, ConfigKind::Running, &running) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("device {} - storing running config failed: {}", label, e);
                return DeviceOutcome::failed(device, e.to_string());
            }
        };

        // Stage 2: startup config. Failure here degrades to partial; the
        // running snapshot is retained.
        let startup = match self.fetch_config(device, ConfigKind::Startup).await {
            Ok(text) => text,
            Err(e) => {
                warn!("device {} - startup config fetch failed: {}", label, e);
                return DeviceOutcome {
                    hostname: device.hostname.clone(),
                    label,
                    status: DeviceStatus::Partial,
                    running_path: Some(running_stored.path),
                    startup_path: None,
                    diff_path: None,
                    has_diff: false,
                    startup_changed: false,
                    error: Some(e.to_string()),
                };
            }
        };

        // Stage 3: diff and persist.
        match self.compare_and_persist(device, &running, &startup) {
            Ok((startup_path, diff_path, has_diff, startup_changed)) => DeviceOutcome {
                hostname: device.hostname.clone(),
                label,
                status: DeviceStatus::Success,
                running_path: Some(running_stored.path),
                startup_path: Some(startup_path),
                diff_path,
                has_diff,
                startup_changed,
                error: None,
            },
            Err(e) => {
                warn!("device {} - comparison failed: {}", label, e);
                DeviceOutcome {
                    hostname: device.hostname.clone(),
                    label,
                    status: DeviceStatus::Partial,
                    running_path: Some(running_stored.path),
                    startup_path: None,
                    diff_path: None,
                    has_diff: false,
                    startup_changed: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Open a fresh shell and run one fetch command on it.
    async fn fetch_config(&self, device: &Device, kind: ConfigKind) -> Result<String> {
        info!("device {} - fetching {} configuration", device.label(), kind);
        let shell = self.opener.open_shell(device).await?;
        let text = self
            .driver
            .fetch_closing(shell, kind.fetch_command(), device.device_type)
            .await?;
        info!(
            "device {} - received {} configuration, {} bytes",
            device.label(),
            kind,
            text.len()
        );
        Ok(text)
    }

    /// Evaluate `startup_changed` against the latest stored startup snapshot,
    /// persist the new startup if it changed, compute both diffs, and write
    /// the per-device diff report when warranted.
    ///
    /// The latest-snapshot read happens before any write of the new startup
    /// snapshot; this ordering is what makes `startup_changed` correct.
    fn compare_and_persist(
        &self,
        device: &Device,
        running: &str,
        startup: &str,
    ) -> std::result::Result<(PathBuf, Option<PathBuf>, bool, bool), Error> {
        let label = device.label();

        let previous = self.store.latest(device, ConfigKind::Startup)?;
        let startup_changed = previous
            .as_ref()
            .map(|prev| prev.content != startup)
            .unwrap_or(true);

        let startup_diff: Option<LineDiff> = if startup_changed {
            previous
                .as_ref()
                .map(|prev| diff::diff(&prev.content, startup))
        } else {
            None
        };

        let startup_path = if startup_changed {
            self.store.store(device, ConfigKind::Startup, startup)?.path
        } else {
            // Reuse the previous snapshot's path; no write happens.
            previous
                .as_ref()
                .map(|prev| prev.path.clone())
                .unwrap_or_default()
        };

        let running_diff = diff::diff(startup, running);

        let report = DiffReport::new(
            label.clone(),
            Local::now(),
            running_diff,
            startup_diff,
            startup_changed,
        );

        let diff_path = if report.should_persist() {
            let path = self.store.write_diff_report(device, &report.render())?;
            info!("device {} - diff report saved to {}", label, path.display());
            Some(path)
        } else {
            if report.has_diff {
                info!(
                    "device {} - running differs from startup but baseline unchanged, skipping report",
                    label
                );
            } else {
                info!("device {} - no configuration difference", label);
            }
            None
        };

        Ok((startup_path, diff_path, report.has_diff, report.startup_changed))
    }
}
