//! Diff report and run summary rendering.
//!
//! The section headers and sentinel lines below are a text contract: a
//! downstream extraction step pattern-matches on these exact strings, so
//! they must never change. See [`extract_changes`] for the consumer side.

use chrono::{DateTime, Local};

use crate::diff::LineDiff;

/// Header for lines only present in the running config.
pub const RUNNING_ADDED_HEADER: &str = "运行配置中新增的行:";
/// Header for lines only present in the startup config.
pub const RUNNING_REMOVED_HEADER: &str = "运行配置中删除的行:";
/// Header introducing the startup-baseline change section.
pub const STARTUP_SECTION_HEADER: &str = "启动配置变化:";
/// Header for lines added to the startup config since the last capture.
pub const STARTUP_ADDED_HEADER: &str = "启动配置中新增的行:";
/// Header for lines removed from the startup config since the last capture.
pub const STARTUP_REMOVED_HEADER: &str = "启动配置中删除的行:";

/// Sentinel when the running config added no lines.
pub const NO_ADDED_SENTINEL: &str = "没有新增的行。";
/// Sentinel when the running config removed no lines.
pub const NO_REMOVED_SENTINEL: &str = "没有删除的行。";
/// Sentinel when the startup config added no lines.
pub const STARTUP_NO_ADDED_SENTINEL: &str = "启动配置中没有新增的行。";
/// Sentinel when the startup config removed no lines.
pub const STARTUP_NO_REMOVED_SENTINEL: &str = "启动配置中没有删除的行。";
/// Line stating running and startup configs match.
pub const NO_RUNNING_DIFF_LINE: &str = "运行配置与启动配置无差异。";

/// One device's difference report for a run. Created once per device when
/// warranted, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct DiffReport {
    /// `name(hostname)` label of the device.
    pub device_label: String,

    /// When the comparison ran.
    pub generated_at: DateTime<Local>,

    /// running-vs-startup difference of this run.
    pub running: LineDiff,

    /// this-run's-startup vs previous-startup difference. `None` when no
    /// previous startup snapshot existed to compare against.
    pub startup: Option<LineDiff>,

    /// Whether the running config differs from the startup config.
    pub has_diff: bool,

    /// Whether the startup config changed since the last capture.
    pub startup_changed: bool,
}

impl DiffReport {
    /// Build a report; `has_diff` is derived from the running diff.
    pub fn new(
        device_label: impl Into<String>,
        generated_at: DateTime<Local>,
        running: LineDiff,
        startup: Option<LineDiff>,
        startup_changed: bool,
    ) -> Self {
        let has_diff = !running.is_empty();
        Self {
            device_label: device_label.into(),
            generated_at,
            running,
            startup,
            has_diff,
            startup_changed,
        }
    }

    /// Per-device persistence gate: a report is only written when the
    /// startup baseline itself moved. A running-vs-startup difference alone
    /// is treated as noise.
    pub fn should_persist(&self) -> bool {
        self.startup_changed
    }

    /// Render the report in the fixed text format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("设备: {}\n", self.device_label));
        out.push_str(&format!(
            "比较时间: {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));

        if self.has_diff {
            out.push_str(RUNNING_ADDED_HEADER);
            out.push('\n');
            if self.running.added.is_empty() {
                out.push_str(NO_ADDED_SENTINEL);
                out.push('\n');
            } else {
                for line in &self.running.added {
                    out.push_str(&format!("+ {}\n", line));
                }
            }

            out.push('\n');
            out.push_str(RUNNING_REMOVED_HEADER);
            out.push('\n');
            if self.running.removed.is_empty() {
                out.push_str(NO_REMOVED_SENTINEL);
                out.push('\n');
            } else {
                for line in &self.running.removed {
                    out.push_str(&format!("- {}\n", line));
                }
            }

            // The startup section only renders when there is a previous
            // baseline and it actually differed.
            if self.startup_changed {
                if let Some(startup) = &self.startup {
                    if !startup.is_empty() {
                        out.push('\n');
                        render_startup_section(&mut out, startup);
                    }
                }
            }
        } else {
            out.push_str(NO_RUNNING_DIFF_LINE);
            out.push_str("\n\n");
            let startup = self.startup.clone().unwrap_or_default();
            render_startup_section(&mut out, &startup);
        }

        out
    }
}

fn render_startup_section(out: &mut String, startup: &LineDiff) {
    out.push_str(STARTUP_SECTION_HEADER);
    out.push('\n');

    if startup.added.is_empty() {
        out.push_str(STARTUP_NO_ADDED_SENTINEL);
        out.push('\n');
    } else {
        out.push_str(STARTUP_ADDED_HEADER);
        out.push('\n');
        for line in &startup.added {
            out.push_str(&format!("+ {}\n", line));
        }
    }

    out.push('\n');

    if startup.removed.is_empty() {
        out.push_str(STARTUP_NO_REMOVED_SENTINEL);
        out.push('\n');
    } else {
        out.push_str(STARTUP_REMOVED_HEADER);
        out.push('\n');
        for line in &startup.removed {
            out.push_str(&format!("- {}\n", line));
        }
    }
}

/// The running/startup change sections extracted from a rendered report,
/// ready to hand to the explanation service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigChanges {
    /// Blank-line-delimited sections mentioning the running-config headers.
    pub running_changes: String,

    /// Blank-line-delimited sections mentioning the startup-config headers.
    pub startup_changes: String,
}

impl ConfigChanges {
    /// True when neither section was found.
    pub fn is_empty(&self) -> bool {
        self.running_changes.is_empty() && self.startup_changes.is_empty()
    }
}

/// Extract the change sections from a rendered diff report by matching the
/// fixed headers. Sections are the blank-line-separated blocks of the text.
pub fn extract_changes(report_text: &str) -> ConfigChanges {
    let sections: Vec<&str> = report_text.split("\n\n").collect();

    let mut running_changes = String::new();
    let mut startup_changes = String::new();

    for section in &sections {
        if section.contains(RUNNING_ADDED_HEADER) || section.contains(RUNNING_REMOVED_HEADER) {
            running_changes.push_str(section);
            running_changes.push_str("\n\n");
        }
    }

    for section in &sections {
        if section.contains(STARTUP_SECTION_HEADER)
            || section.contains(STARTUP_ADDED_HEADER)
            || section.contains(STARTUP_REMOVED_HEADER)
        {
            startup_changes.push_str(section);
            startup_changes.push_str("\n\n");
        }
    }

    ConfigChanges {
        running_changes: running_changes.trim().to_string(),
        startup_changes: startup_changes.trim().to_string(),
    }
}

/// Render the run-level summary block appended to
/// `<root>/reports/<YYYYMMDD>.txt`. Multiple runs per day append multiple
/// blocks.
pub fn render_run_summary(
    at: DateTime<Local>,
    outcomes: &[crate::orchestrator::DeviceOutcome],
) -> String {
    use crate::orchestrator::DeviceStatus;

    let mut out = String::new();
    out.push_str(&format!(
        "===== {} 配置备份和比较汇总报告 =====\n\n",
        at.format("%Y-%m-%d %H:%M:%S")
    ));

    for outcome in outcomes {
        out.push_str(&format!("设备: {}\n", outcome.label));
        out.push_str(&format!("状态: {}\n", outcome.status.as_str()));

        match outcome.status {
            DeviceStatus::Success => {
                if let Some(path) = &outcome.running_path {
                    out.push_str(&format!("运行配置文件: {}\n", path.display()));
                }
                if let Some(path) = &outcome.startup_path {
                    out.push_str(&format!("启动配置文件: {}\n", path.display()));
                }
                if let Some(path) = &outcome.diff_path {
                    out.push_str(&format!("差异文件: {}\n", path.display()));
                }
                out.push_str(&format!(
                    "配置差异: {}\n",
                    if outcome.has_diff { "有" } else { "无" }
                ));
                out.push_str(&format!(
                    "启动配置变化: {}\n",
                    if outcome.startup_changed { "有" } else { "无" }
                ));
            }
            DeviceStatus::Partial => {
                if let Some(path) = &outcome.running_path {
                    out.push_str(&format!("运行配置文件: {}\n", path.display()));
                }
                out.push_str(&format!(
                    "错误: {}\n",
                    outcome.error.as_deref().unwrap_or("未知错误")
                ));
            }
            DeviceStatus::Failed => {
                out.push_str(&format!(
                    "错误: {}\n",
                    outcome.error.as_deref().unwrap_or("未知错误")
                ));
            }
        }

        out.push('\n');
    }

    out.push_str(&"=".repeat(50));
    out.push_str("\n\n");
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;

    use super::*;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 23, 10, 30, 0).unwrap()
    }

    fn lines(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_full_report() {
        let report = DiffReport::new(
            "core-sw1(10.0.0.1)",
            at(),
            LineDiff {
                added: lines(&["ntp server 10.1.1.1"]),
                removed: lines(&["ntp server 10.9.9.9"]),
            },
            Some(LineDiff {
                added: lines(&["snmp-agent"]),
                removed: BTreeSet::new(),
            }),
            true,
        );

        let text = report.render();
        assert!(text.starts_with("设备: core-sw1(10.0.0.1)\n比较时间: 2026-08-23 10:30:00\n\n"));
        assert!(text.contains("运行配置中新增的行:\n+ ntp server 10.1.1.1\n"));
        assert!(text.contains("运行配置中删除的行:\n- ntp server 10.9.9.9\n"));
        assert!(text.contains("启动配置变化:\n启动配置中新增的行:\n+ snmp-agent\n"));
        assert!(text.contains("启动配置中没有删除的行。\n"));
    }

    #[test]
    fn test_render_empty_added_uses_sentinel_exactly() {
        let report = DiffReport::new(
            "sw",
            at(),
            LineDiff {
                added: BTreeSet::new(),
                removed: lines(&["acl 2000"]),
            },
            None,
            true,
        );

        let text = report.render();
        assert!(text.contains("运行配置中新增的行:\n没有新增的行。\n"));
        assert!(text.contains("运行配置中删除的行:\n- acl 2000\n"));
        // No previous startup baseline, so no startup section in this form.
        assert!(!text.contains(STARTUP_SECTION_HEADER));
    }

    #[test]
    fn test_render_no_running_diff_form() {
        let report = DiffReport::new(
            "sw",
            at(),
            LineDiff::default(),
            Some(LineDiff {
                added: lines(&["info-center enable"]),
                removed: BTreeSet::new(),
            }),
            true,
        );

        assert!(!report.has_diff);
        let text = report.render();
        assert!(text.contains("运行配置与启动配置无差异。\n\n"));
        assert!(text.contains("启动配置变化:\n启动配置中新增的行:\n+ info-center enable\n"));
        assert!(text.contains("启动配置中没有删除的行。\n"));
    }

    #[test]
    fn test_extract_changes_roundtrip() {
        let report = DiffReport::new(
            "sw",
            at(),
            LineDiff {
                added: lines(&["x"]),
                removed: BTreeSet::new(),
            },
            Some(LineDiff {
                added: lines(&["y"]),
                removed: BTreeSet::new(),
            }),
            true,
        );

        let changes = extract_changes(&report.render());
        assert!(changes.running_changes.contains("+ x"));
        assert!(changes.startup_changes.contains("+ y"));
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_extract_changes_on_unrelated_text() {
        let changes = extract_changes("nothing to see here\n\njust text");
        assert!(changes.is_empty());
    }

    #[test]
    fn test_render_run_summary_blocks() {
        use crate::orchestrator::{DeviceOutcome, DeviceStatus};

        let outcomes = vec![
            DeviceOutcome {
                hostname: "10.0.0.1".to_string(),
                label: "core-sw1(10.0.0.1)".to_string(),
                status: DeviceStatus::Success,
                running_path: Some("backups/core-sw1/running/202608231030/10.0.0.1_running.txt".into()),
                startup_path: Some("backups/core-sw1/startup/202608231030/10.0.0.1_startup.txt".into()),
                diff_path: None,
                has_diff: true,
                startup_changed: false,
                error: None,
            },
            DeviceOutcome {
                hostname: "10.0.0.2".to_string(),
                label: "10.0.0.2".to_string(),
                status: DeviceStatus::Failed,
                running_path: None,
                startup_path: None,
                diff_path: None,
                has_diff: false,
                startup_changed: false,
                error: Some("Connection disconnected".to_string()),
            },
        ];

        let text = render_run_summary(at(), &outcomes);
        assert!(text.starts_with("===== 2026-08-23 10:30:00 配置备份和比较汇总报告 =====\n\n"));
        assert!(text.contains("设备: core-sw1(10.0.0.1)\n状态: success\n"));
        assert!(text.contains("配置差异: 有\n启动配置变化: 无\n"));
        assert!(text.contains("设备: 10.0.0.2\n状态: failed\n错误: Connection disconnected\n"));
        assert!(text.ends_with(&format!("{}\n\n", "=".repeat(50))));
    }
}
