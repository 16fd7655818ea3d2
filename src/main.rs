use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};

use cfgdrift::cli::{Cli, Command};
use cfgdrift::config::AppConfig;
use cfgdrift::explain;
use cfgdrift::notify::{ChatExplainer, FeishuNotifier, Notifier};
use cfgdrift::orchestrator::{DeviceStatus, Orchestrator};
use cfgdrift::session::SessionDriver;
use cfgdrift::store::SnapshotStore;
use cfgdrift::transport::{ConnectSettings, SshConnector};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> cfgdrift::Result<()> {
    if let Command::Init = cli.command {
        if cli.config.exists() {
            warn!("config file {} already exists, not overwriting", cli.config.display());
            return Ok(());
        }
        cfgdrift::config::write_template(&cli.config)?;
        info!("template config written to {}", cli.config.display());
        info!("edit the device entries before running");
        return Ok(());
    }

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Command::Run => run_backup(config).await,
        Command::Explain => run_explain(config).await,
        Command::Init => unreachable!("handled above"),
    }
}

async fn run_backup(config: AppConfig) -> cfgdrift::Result<()> {
    info!("loaded {} devices", config.devices.len());

    let driver = SessionDriver::new(config.session.to_settings());
    let store = SnapshotStore::new(&config.backup_root);
    let opener = SshConnector::new(ConnectSettings::default());

    let orchestrator = Arc::new(
        Orchestrator::new(opener, driver, store).with_max_concurrency(config.max_concurrency),
    );

    let summary = orchestrator.run(config.devices.clone()).await?;

    for outcome in &summary.outcomes {
        match outcome.status {
            DeviceStatus::Success => info!(
                "device {}: success (diff: {}, startup changed: {})",
                outcome.label, outcome.has_diff, outcome.startup_changed
            ),
            DeviceStatus::Partial => warn!(
                "device {}: partial - {}",
                outcome.label,
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
            DeviceStatus::Failed => warn!(
                "device {}: failed - {}",
                outcome.label,
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    if let Some(path) = &summary.report_path {
        info!("run summary: {}", path.display());

        if let Some(feishu) = &config.feishu {
            let notifier = FeishuNotifier::new(&feishu.webhook_url);
            let text = std::fs::read_to_string(path)
                .map_err(|e| cfgdrift::error::StoreError::io(path, e))?;
            if let Err(e) = notifier.notify(&text).await {
                warn!("summary notification failed: {}", e);
            }
        }
    }

    Ok(())
}

async fn run_explain(config: AppConfig) -> cfgdrift::Result<()> {
    let Some(explainer_config) = &config.explainer else {
        return Err(cfgdrift::error::ConfigError::Invalid {
            message: "explain requires an [explainer] section".to_string(),
        }
        .into());
    };

    let explainer = ChatExplainer::new(
        &explainer_config.base_url,
        explainer_config.api_key.clone(),
        &explainer_config.model,
    );

    let notifier = config
        .feishu
        .as_ref()
        .map(|f| FeishuNotifier::new(&f.webhook_url));

    let processed = explain::explain_recent(
        &config.backup_root,
        chrono::Duration::hours(explainer_config.lookback_hours as i64),
        &explainer,
        notifier.as_ref().map(|n| n as &dyn Notifier),
    )
    .await?;

    info!("explained {} reports", processed);
    Ok(())
}
