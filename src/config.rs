//! Run configuration loaded from a TOML file.
//!
//! Everything that used to be ambient state lives here: the backup root,
//! session timing, the device inventory, and the optional webhook /
//! explainer endpoints with their keys. A config is loaded once per run and
//! injected into the collaborators that need it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::device::Device;
use crate::error::ConfigError;
use crate::session::{EchoDetection, SessionSettings};

/// Top-level configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Root directory of the snapshot tree.
    #[serde(default = "default_backup_root")]
    pub backup_root: PathBuf,

    /// How many devices are processed concurrently.
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,

    /// Session timing overrides.
    #[serde(default)]
    pub session: SessionConfig,

    /// Optional webhook notifier.
    pub feishu: Option<FeishuConfig>,

    /// Optional diff explanation service.
    pub explainer: Option<ExplainerConfig>,

    /// Ordered device inventory.
    #[serde(default, rename = "device")]
    pub devices: Vec<Device>,
}

/// Session timing knobs, all optional in the file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Overall per-command timeout in seconds.
    pub command_timeout_secs: Option<u64>,

    /// Per-read wait in milliseconds.
    pub read_window_ms: Option<u64>,

    /// Disable the command-token echo heuristic.
    #[serde(default)]
    pub disable_echo_detection: bool,
}

impl SessionConfig {
    /// Apply the file's overrides on top of the defaults.
    pub fn to_settings(&self) -> SessionSettings {
        let mut settings = SessionSettings::default();
        if let Some(secs) = self.command_timeout_secs {
            settings.command_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.read_window_ms {
            settings.read_window = Duration::from_millis(ms);
        }
        if self.disable_echo_detection {
            settings.echo_detection = EchoDetection::Disabled;
        }
        settings
    }
}

/// Feishu bot webhook settings.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeishuConfig {
    /// Bot webhook URL.
    pub webhook_url: String,
}

/// OpenAI-compatible chat-completions endpoint settings.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplainerConfig {
    /// Base URL without the trailing `/chat/completions`.
    pub base_url: String,

    /// API key.
    pub api_key: SecretString,

    /// Model identifier.
    pub model: String,

    /// Lookback window in hours for the explain subcommand.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u64,
}

fn default_backup_root() -> PathBuf {
    PathBuf::from("backups")
}

fn default_concurrency() -> usize {
    1
}

fn default_lookback_hours() -> u64 {
    1
}

impl AppConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: AppConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::Invalid {
                message: "no devices configured".to_string(),
            });
        }
        for device in &self.devices {
            if device.hostname.is_empty() {
                return Err(ConfigError::Invalid {
                    message: "device with empty hostname".to_string(),
                });
            }
            if device.username.is_empty() {
                return Err(ConfigError::Invalid {
                    message: format!("device {} has no username", device.hostname),
                });
            }
        }
        Ok(())
    }
}

/// Write [`CONFIG_TEMPLATE`] to `path` for the `init` subcommand.
pub fn write_template(path: &Path) -> Result<(), ConfigError> {
    fs::write(path, CONFIG_TEMPLATE).map_err(|e| ConfigError::Write {
        path: path.display().to_string(),
        source: e,
    })
}

/// Template written by the `init` subcommand. Passwords are placeholders the
/// operator must edit before the first run.
pub const CONFIG_TEMPLATE: &str = r#"backup_root = "backups"
max_concurrency = 1

# [feishu]
# webhook_url = "https://open.feishu.cn/open-apis/bot/v2/hook/..."

# [explainer]
# base_url = "https://openrouter.ai/api/v1"
# api_key = "sk-..."
# model = "qwen/qwen3-32b:free"
# lookback_hours = 1

[[device]]
hostname = "192.0.2.1"
username = "admin"
password = "CHANGE-ME"
port = 22
device_type = "huawei"   # huawei | h3c | unknown
device_name = "core-sw1"
"#;
