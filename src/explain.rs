//! Explanation pipeline for recent diff reports.
//!
//! Walks the snapshot tree for diff reports written within a time window,
//! extracts their change sections, asks the explainer for a human-readable
//! interpretation, persists the result under `<root>/diff_ai/`, and forwards
//! the combined text to the notifier when one is configured.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local, NaiveDateTime};
use log::{info, warn};

use crate::error::{Result, StoreError};
use crate::notify::{ChatExplainer, Notifier};
use crate::report;

/// A diff report found within the lookback window.
#[derive(Debug, Clone)]
pub struct RecentReport {
    /// Device directory name the report belongs to.
    pub device_name: String,

    /// Path of the `*_diff.txt` file.
    pub path: PathBuf,

    /// Timestamp parsed from the version directory name.
    pub timestamp: DateTime<Local>,
}

/// Find all `<root>/<device>/diff/<YYYYMMDDHHMM>/*_diff.txt` files whose
/// stamp falls within the last `within` duration.
pub fn recent_diff_reports(
    root: &Path,
    within: Duration,
) -> std::result::Result<Vec<RecentReport>, StoreError> {
    let threshold = Local::now() - within;
    let mut reports = Vec::new();

    if !root.exists() {
        return Ok(reports);
    }

    for device_entry in fs::read_dir(root).map_err(|e| StoreError::io(root, e))? {
        let device_entry = device_entry.map_err(|e| StoreError::io(root, e))?;
        let device_dir = device_entry.path();
        if !device_dir.is_dir() {
            continue;
        }
        let device_name = device_entry.file_name().to_string_lossy().into_owned();
        if device_name == "reports" || device_name == "diff_ai" {
            continue;
        }

        let diff_dir = device_dir.join("diff");
        if !diff_dir.exists() {
            continue;
        }

        for stamp_entry in fs::read_dir(&diff_dir).map_err(|e| StoreError::io(&diff_dir, e))? {
            let stamp_entry = stamp_entry.map_err(|e| StoreError::io(&diff_dir, e))?;
            let stamp_dir = stamp_entry.path();
            if !stamp_dir.is_dir() {
                continue;
            }

            let stamp = stamp_entry.file_name().to_string_lossy().into_owned();
            let Some(timestamp) = parse_version_stamp(&stamp) else {
                continue;
            };
            if timestamp < threshold {
                continue;
            }

            for file_entry in fs::read_dir(&stamp_dir).map_err(|e| StoreError::io(&stamp_dir, e))? {
                let file_entry = file_entry.map_err(|e| StoreError::io(&stamp_dir, e))?;
                let path = file_entry.path();
                let is_diff_file = path
                    .file_name()
                    .map(|n| n.to_string_lossy().ends_with("_diff.txt"))
                    .unwrap_or(false);
                if is_diff_file {
                    reports.push(RecentReport {
                        device_name: device_name.clone(),
                        path,
                        timestamp,
                    });
                }
            }
        }
    }

    Ok(reports)
}

/// Parse a 12-digit `%Y%m%d%H%M` version directory name.
fn parse_version_stamp(stamp: &str) -> Option<DateTime<Local>> {
    if stamp.len() != 12 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M")
        .ok()?
        .and_local_timezone(Local)
        .single()
}

/// Persist a report and its explanation under
/// `<root>/diff_ai/<device>/<YYYYMMDDHHMM>/`, returning the combined file.
pub fn save_explained(
    root: &Path,
    report: &RecentReport,
    diff_content: &str,
    explanation: &str,
) -> std::result::Result<PathBuf, StoreError> {
    let dir = root
        .join("diff_ai")
        .join(&report.device_name)
        .join(report.timestamp.format("%Y%m%d%H%M").to_string());
    fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

    let diff_path = dir.join(format!("{}_diff.txt", report.device_name));
    fs::write(&diff_path, diff_content).map_err(|e| StoreError::io(&diff_path, e))?;

    let explanation_path = dir.join(format!("{}_explanation.txt", report.device_name));
    fs::write(&explanation_path, explanation).map_err(|e| StoreError::io(&explanation_path, e))?;

    let rule = "=".repeat(50);
    let combined = format!(
        "原始配置变化:\n{}\n\n{}\n\nAI解释:\n{}\n\n{}",
        rule, diff_content, rule, explanation
    );
    let combined_path = dir.join(format!("{}_combined.txt", report.device_name));
    fs::write(&combined_path, combined).map_err(|e| StoreError::io(&combined_path, e))?;

    Ok(combined_path)
}

/// Render the chat message for one explained report. The message carries a
/// device/time header so recipients can tell reports apart; its section
/// rules are narrower than the combined file's.
fn render_notification(report: &RecentReport, diff_content: &str, explanation: &str) -> String {
    let rule = "=".repeat(30);
    format!(
        "设备 {} 配置变化解释\n时间: {}\n\n原始配置变化:\n{}\n{}\n\nAI解释:\n{}\n{}",
        report.device_name,
        report.timestamp.format("%Y-%m-%d %H:%M:%S"),
        rule,
        diff_content,
        rule,
        explanation
    )
}

/// Explain every diff report written in the last `lookback` and forward the
/// results. Returns the number of reports processed.
pub async fn explain_recent(
    root: &Path,
    lookback: Duration,
    explainer: &ChatExplainer,
    notifier: Option<&dyn Notifier>,
) -> Result<usize> {
    let reports = recent_diff_reports(root, lookback)?;
    if reports.is_empty() {
        info!("no diff reports within the lookback window");
        return Ok(0);
    }
    info!("found {} recent diff reports", reports.len());

    let mut processed = 0;
    for report_entry in &reports {
        let content = fs::read_to_string(&report_entry.path)
            .map_err(|e| StoreError::io(&report_entry.path, e))?;

        let changes = report::extract_changes(&content);
        if changes.is_empty() {
            warn!(
                "report {} has no recognizable change sections, skipping",
                report_entry.path.display()
            );
            continue;
        }

        let explanation = match explainer.explain(&changes).await {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "explanation failed for {}: {}",
                    report_entry.path.display(),
                    e
                );
                continue;
            }
        };

        let combined_path = save_explained(root, report_entry, &content, &explanation)?;
        info!("explanation saved to {}", combined_path.display());

        if let Some(notifier) = notifier {
            let message = render_notification(report_entry, &content, &explanation);
            if let Err(e) = notifier.notify(&message).await {
                warn!("notification failed for {}: {}", report_entry.device_name, e);
            }
        }

        processed += 1;
    }

    Ok(processed)
}
