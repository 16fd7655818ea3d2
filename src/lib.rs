//! # cfgdrift
//!
//! Scheduled configuration backup and drift detection for network devices
//! over interactive SSH.
//!
//! cfgdrift periodically pulls the running and startup configurations from
//! Huawei/H3C-style devices over an interactive shell, stores timestamped
//! deduplicated snapshots, and reports line-level differences — both
//! running-vs-startup and against the previous startup baseline.
//!
//! ## Layers
//!
//! - [`transport`] — SSH connection management ([`ShellChannel`] is the seam
//!   the rest of the crate talks to)
//! - [`session`] — drives one command over a raw, pagination-interrupted
//!   shell and returns clean output
//! - [`diff`] / [`store`] / [`report`] — snapshot/diff engine and the fixed
//!   report text formats
//! - [`orchestrator`] — the per-device pipeline and run-level aggregation
//! - [`notify`] / [`explain`] — outbound webhook and LLM-explanation
//!   adapters
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use cfgdrift::orchestrator::Orchestrator;
//! use cfgdrift::session::SessionDriver;
//! use cfgdrift::store::SnapshotStore;
//! use cfgdrift::transport::{ConnectSettings, SshConnector};
//!
//! # async fn example(devices: Vec<cfgdrift::device::Device>) -> cfgdrift::Result<()> {
//! let orchestrator = Arc::new(Orchestrator::new(
//!     SshConnector::new(ConnectSettings::default()),
//!     SessionDriver::default(),
//!     SnapshotStore::new("backups"),
//! ));
//!
//! let summary = orchestrator.run(devices).await?;
//! for outcome in &summary.outcomes {
//!     println!("{}: {}", outcome.label, outcome.status.as_str());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod device;
pub mod diff;
pub mod error;
pub mod explain;
pub mod notify;
pub mod orchestrator;
pub mod report;
pub mod session;
pub mod store;
pub mod transport;

// Re-export main types for convenience
pub use device::{ConfigKind, Device, Vendor};
pub use diff::LineDiff;
pub use error::{Error, Result};
pub use orchestrator::{DeviceOutcome, DeviceStatus, Orchestrator, RunSummary};
pub use report::DiffReport;
pub use session::{SessionDriver, SessionSettings};
pub use store::SnapshotStore;
pub use transport::{ShellChannel, ShellOpener};
