use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::client::UsageClient;
use crate::core::config::AppConfig;
use crate::core::history::HistoryStore;
use crate::core::notifier::LogSink;
use crate::core::scheduler::PollingScheduler;

/// Poll once through the full pipeline (history and alert evaluation included)
/// and print the result.
pub async fn run(config: &AppConfig, opts: &OutputOptions) -> Result<()> {
    let client = UsageClient::from_config(&config.source)?;
    let history = HistoryStore::new(config.history_path());
    let mut scheduler = PollingScheduler::new(Arc::new(client), history, config.settings.refresh_interval())
        .with_sink(Box::new(LogSink))
        .with_alerts_enabled(config.settings.alerts_enabled);

    let show_spinner = matches!(opts.format, OutputFormat::Text) && opts.use_color;
    let spinner = if show_spinner {
        Some(tokio::spawn(async move {
            let frames = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
            let mut i = 0usize;
            loop {
                eprint!("\r {} Fetching usage data...", frames[i % frames.len()]);
                i = i.wrapping_add(1);
                tokio::time::sleep(std::time::Duration::from_millis(80)).await;
            }
        }))
    } else {
        None
    };

    let outcome = scheduler.poll_once().await;

    if let Some(s) = spinner {
        s.abort();
        eprint!("\r\x1b[2K");
    }

    let status = scheduler.status();
    match opts.format {
        OutputFormat::Text => {
            println!("{}", renderer::render_status(&status, Utc::now(), opts.use_color))
        }
        OutputFormat::Json => println!("{}", opts.to_json(&status)?),
    }

    if matches!(outcome, Some(Err(_))) {
        std::process::exit(1);
    }
    Ok(())
}
