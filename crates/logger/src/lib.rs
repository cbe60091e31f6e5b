//! Engine Telemetry Logger
//!
//! Wires the pipeline together: serial link or synthetic source, frame
//! decoder, history store for the live view, and the CSV session log.

use anyhow::{ensure, Context};
use chrono::Local;
use ingest::{Dispatcher, Session, SessionReport, StopReason};
use ring_buffer::HistoryStore;
use std::sync::Arc;
use std::time::Duration;
use storage::{session_log_path, CsvSink, SinkWriter};
use synthetic_source::SyntheticSource;
use telemetry_protocol::{open_link, FrameDecoder};
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod render;
mod settings;

pub use render::{fault_labels, fault_text, summarize, Dashboard, FAULT_LABELS};
pub use settings::{AppConfig, LogFormat, DEFAULT_CONFIG_FILE};

/// Initialize logging
pub fn init_logging(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let level = level
        .parse::<Level>()
        .with_context(|| format!("Invalid log_level {:?}", level))?;
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let installed = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
    installed.context("Failed to set tracing subscriber")
}

/// Open the CSV session log. An unwritable log leaves the live view
/// running without a sink.
fn open_sink(config: &AppConfig) -> Option<SinkWriter> {
    if config.no_log {
        info!("CSV logging disabled");
        return None;
    }

    let path = config
        .csv_path
        .clone()
        .unwrap_or_else(|| session_log_path(&config.log_dir, Local::now()));

    match CsvSink::create(&path) {
        Ok(sink) => Some(SinkWriter::spawn(Box::new(sink), config.sink.clone())),
        Err(e) => {
            warn!("Cannot open log {}: {}; continuing without it", path.display(), e);
            None
        }
    }
}

/// Run one logging session until `shutdown` is set, the link fails, or
/// the sink is exhausted.
pub async fn run(config: AppConfig, shutdown: watch::Receiver<bool>) -> anyhow::Result<SessionReport> {
    ensure!(config.history_depth > 0, "history_depth must be at least 1");

    // Link first: nothing is created on disk for a port that cannot open
    let link = if config.demo {
        None
    } else {
        Some(open_link(&config.link).context("Failed to open serial link")?)
    };

    let history = Arc::new(HistoryStore::new(config.history_depth));
    let dispatcher = Dispatcher::new(history.clone(), open_sink(&config));
    let decoder = FrameDecoder::new(config.decoder.clone());
    let mut session = Session::new(dispatcher, decoder, config.session.clone(), shutdown);

    let (render_stop, render_rx) = watch::channel(false);
    let dashboard = Dashboard::new(
        history.clone(),
        Duration::from_millis(config.dashboard_interval_ms),
    );
    let render = tokio::spawn(dashboard.run(
        Duration::from_millis(config.render_interval_ms),
        render_rx,
    ));

    let reason = match link {
        Some(link) => session
            .run_stream(link)
            .await
            .unwrap_or_else(|e| StopReason::Transport(e.to_string())),
        None => {
            let mut source = SyntheticSource::new(config.synthetic.clone());
            session.run_synthetic(&mut source, config.loopback).await
        }
    };

    if let StopReason::Transport(e) = &reason {
        warn!("Link lost: {}", e);
    }

    let report = session.finish(reason).await;

    // Render task is only stopped once the sink is drained
    render_stop.send_replace(true);
    let dashboard = render.await.context("Render task failed")?;
    dashboard.render_final();

    Ok(report)
}
