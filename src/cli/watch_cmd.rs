use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::client::UsageClient;
use crate::core::config::{AppConfig, REFRESH_INTERVALS};
use crate::core::history::HistoryStore;
use crate::core::notifier::LogSink;
use crate::core::scheduler::{Phase, PollingScheduler};

/// Pick the poll interval: the flag if given, else the config value.
pub fn resolve_interval(flag: Option<u64>, config: &AppConfig) -> Result<Duration> {
    let secs = flag.unwrap_or(config.settings.refresh_interval);
    if !REFRESH_INTERVALS.contains(&secs) {
        bail!("Unsupported refresh interval: {}s (choose 30, 60 or 120)", secs);
    }
    Ok(Duration::from_secs(secs))
}

/// Poll continuously, printing every completed poll. Each line on stdin asks
/// for an immediate refresh; Ctrl-C stops.
pub async fn run(interval: Option<u64>, config: &AppConfig, opts: &OutputOptions) -> Result<()> {
    let interval = resolve_interval(interval, config)?;
    let client = UsageClient::from_config(&config.source)?;
    let history = HistoryStore::new(config.history_path());

    let scheduler = PollingScheduler::new(Arc::new(client), history, interval)
        .with_sink(Box::new(LogSink))
        .with_alerts_enabled(config.settings.alerts_enabled);
    #[cfg(feature = "desktop-notify")]
    let scheduler = scheduler.with_sink(Box::new(crate::core::notifier::DesktopSink::new()));

    let mut updates = scheduler.subscribe();
    let (refresh_tx, refresh_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            // a full channel means a refresh is already queued
            if refresh_tx.try_send(()).is_err() {
                debug!("refresh already pending");
            }
        }
    });

    let poller = tokio::spawn(scheduler.run(refresh_rx, async {
        let _ = tokio::signal::ctrl_c().await;
    }));

    while updates.changed().await.is_ok() {
        let status = updates.borrow_and_update().clone();
        if status.phase == Phase::Fetching {
            continue;
        }
        match opts.format {
            OutputFormat::Text => {
                println!("{}\n", renderer::render_status(&status, Utc::now(), opts.use_color));
            }
            // one JSON document per line
            OutputFormat::Json => println!("{}", serde_json::to_string(&status)?),
        }
    }

    poller.await?;
    Ok(())
}
