//! Producer Session Loop

use crate::dispatch::Dispatcher;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use storage::SinkReport;
use synthetic_source::SyntheticSource;
use telemetry_protocol::{DecoderStats, FrameDecoder, TransportError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bytes requested from the link per read
    pub read_buffer_size: usize,
    /// End the session after this many sink failures in a row
    pub max_consecutive_sink_failures: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 4096,
            max_consecutive_sink_failures: None,
        }
    }
}

/// Why the producer loop ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Shutdown was requested
    Cancelled,
    /// The sink failure limit was reached
    SinkExhausted,
    /// The link failed or closed
    Transport(String),
}

/// Final session counters
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub reason: StopReason,
    pub frames_dispatched: u64,
    pub decode_errors: u64,
    pub decoder: DecoderStats,
    /// Undecoded bytes still buffered when the session stopped
    pub pending_bytes_discarded: usize,
    pub sink_refusals: u64,
    pub sink: Option<SinkReport>,
    /// Frames left in the history store for the final render
    pub history_len: usize,
}

/// One producer session: a decoder and a dispatcher driven until
/// shutdown, end of stream, or sink exhaustion.
pub struct Session {
    dispatcher: Dispatcher,
    decoder: FrameDecoder,
    config: SessionConfig,
    shutdown: watch::Receiver<bool>,
}

impl Session {
    /// Create a session. Setting the watched flag to `true`, or dropping
    /// its sender, stops the session at the next read or tick.
    pub fn new(
        dispatcher: Dispatcher,
        decoder: FrameDecoder,
        config: SessionConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            dispatcher,
            decoder,
            config,
            shutdown,
        }
    }

    /// Shutdown flag pair for [`Session::new`]
    pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Read from the link until cancelled. Transport failures and end of
    /// stream are returned to the caller, never retried here.
    pub async fn run_stream<R>(&mut self, mut reader: R) -> Result<StopReason, TransportError>
    where
        R: AsyncRead + Unpin,
    {
        info!("Reading telemetry stream");
        let mut buf = vec![0u8; self.config.read_buffer_size.max(1)];

        loop {
            let read = tokio::select! {
                biased;
                _ = self.shutdown.wait_for(|stop| *stop) => return Ok(StopReason::Cancelled),
                read = reader.read(&mut buf) => read,
            };

            let n = read?;
            if n == 0 {
                return Err(TransportError::Disconnected);
            }

            self.ingest_bytes(&buf[..n]);
            if self.sink_exhausted() {
                return Ok(StopReason::SinkExhausted);
            }
        }
    }

    /// Pace the synthetic source at its configured interval until
    /// cancelled. With `loopback` each frame is encoded to wire format
    /// and pushed through the decoder like bytes from the link.
    pub async fn run_synthetic(&mut self, source: &mut SyntheticSource, loopback: bool) -> StopReason {
        let period = Duration::from_millis(source.config().interval_ms.max(1));
        info!(
            "Generating synthetic telemetry every {:?}{}",
            period,
            if loopback { " (through decoder)" } else { "" }
        );

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.wait_for(|stop| *stop) => return StopReason::Cancelled,
                _ = ticker.tick() => {}
            }

            let frame = source.next_frame();
            if loopback {
                self.ingest_bytes(&frame.to_wire());
            } else {
                self.dispatcher.dispatch(frame);
            }

            if self.sink_exhausted() {
                return StopReason::SinkExhausted;
            }
        }
    }

    /// Stop the session: count undecoded bytes, drain and close the
    /// sink, and report. The history store stays readable through any
    /// other handle the caller holds.
    pub async fn finish(mut self, reason: StopReason) -> SessionReport {
        let pending = self.decoder.discard_pending();
        if pending > 0 {
            warn!("Discarding {} undecoded bytes at shutdown", pending);
            counter!("telemetry_pending_bytes_discarded_total").increment(pending as u64);
        }

        let stats = self.dispatcher.stats();
        let history_len = self.dispatcher.history().len();
        let sink = self.dispatcher.close().await;

        let report = SessionReport {
            reason,
            frames_dispatched: stats.dispatched(),
            decode_errors: stats.decode_errors(),
            decoder: self.decoder.stats(),
            pending_bytes_discarded: pending,
            sink_refusals: stats.sink_refusals(),
            sink,
            history_len,
        };

        info!(
            "Session stopped ({:?}): {} frames, {} decode errors, {} sink refusals",
            report.reason, report.frames_dispatched, report.decode_errors, report.sink_refusals
        );
        report
    }

    fn ingest_bytes(&mut self, bytes: &[u8]) {
        for outcome in self.decoder.feed(bytes) {
            match outcome {
                Ok(frame) => self.dispatcher.dispatch(frame),
                Err(e) => {
                    self.dispatcher.stats().record_decode_error();
                    counter!("telemetry_decode_errors_total", "kind" => e.kind()).increment(1);
                }
            }
        }
    }

    fn sink_exhausted(&self) -> bool {
        let (Some(limit), Some(stats)) = (
            self.config.max_consecutive_sink_failures,
            self.dispatcher.sink_stats(),
        ) else {
            return false;
        };

        let failures = stats.consecutive_failures();
        if failures >= limit {
            error!(
                "Sink failed {} times in a row (limit {}), ending session",
                failures, limit
            );
            return true;
        }
        if failures > 0 {
            debug!("Sink consecutive failures: {}", failures);
        }
        false
    }
}
