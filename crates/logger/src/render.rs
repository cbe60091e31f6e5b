//! Text Dashboard
//!
//! The render path: snapshots the history store on a timer and turns the
//! window into a one-line dashboard. Fault-word labelling lives here
//! because it is purely a display concern.

use ring_buffer::{HistoryStore, Snapshot};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry_protocol::Channel;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Fault bit labels (bit, label)
pub const FAULT_LABELS: [(u32, &str); 8] = [
    (0, "SENSOR_ERR"),
    (1, "OVERBOOST"),
    (2, "LOW_OIL"),
    (3, "HIGH_EGT"),
    (4, "LOW_FUEL_PRESS"),
    (5, "LOW_U12V"),
    (6, "LOW_U5V"),
    (7, "MAP_IMPLAUS"),
];

/// Labels of the bits set in a fault word
pub fn fault_labels(word: i64) -> Vec<&'static str> {
    FAULT_LABELS
        .iter()
        .filter(|(bit, _)| word & (1 << bit) != 0)
        .map(|(_, label)| *label)
        .collect()
}

/// Fault overlay text, empty when no fault is active
pub fn fault_text(word: i64) -> String {
    if word == 0 {
        return String::new();
    }
    format!("FAULT {}: {}", word, fault_labels(word).join(", "))
}

/// One-line summary of the newest frame and the window
pub fn summarize(snapshot: &Snapshot) -> Option<String> {
    let latest = snapshot.latest()?;
    let (rpm_lo, rpm_hi) = snapshot.range(Channel::EngineRpm)?;

    let mut line = format!(
        "#{} rpm {} [{}-{}] | {} km/h gear {} torque {} | coolant {} iat {} egt {}/{} C | \
         oil {} fuel {} map {} exh {}/{} | {}/{} mV | window {}",
        latest.log_index(),
        latest.engine_rpm(),
        rpm_lo,
        rpm_hi,
        latest.vehicle_speed(),
        latest.gear(),
        latest.torque(),
        latest.oil_coolant_temperature(),
        latest.intake_air_temperature(),
        latest.egt_bank1(),
        latest.egt_bank2(),
        latest.oil_press(),
        latest.fuel_press(),
        latest.map_value(),
        latest.exhaust_press_bank1(),
        latest.exhaust_press_bank2(),
        latest.u12v(),
        latest.u5v(),
        snapshot.len(),
    );

    let faults = fault_text(latest.faultword1());
    if !faults.is_empty() {
        line.push_str(" | ");
        line.push_str(&faults);
    }
    Some(line)
}

/// Periodic snapshot consumer
pub struct Dashboard {
    history: Arc<HistoryStore>,
    /// Minimum time between dashboard lines
    line_interval: Duration,
    last_line: Option<Instant>,
    last_seen: u64,
    last_fault: i64,
    renders: u64,
}

impl Dashboard {
    pub fn new(history: Arc<HistoryStore>, line_interval: Duration) -> Self {
        Self {
            history,
            line_interval,
            last_line: None,
            last_seen: 0,
            last_fault: 0,
            renders: 0,
        }
    }

    /// Take a snapshot and render it if new frames arrived
    pub fn render(&mut self) -> Option<String> {
        let snapshot = self.history.snapshot();
        if snapshot.total_recorded() == self.last_seen {
            return None;
        }
        self.last_seen = snapshot.total_recorded();
        self.renders += 1;

        let fault = snapshot.latest().map_or(0, |f| f.faultword1());
        if fault != self.last_fault {
            if fault == 0 {
                info!("Fault cleared");
            } else {
                warn!("{}", fault_text(fault));
            }
            self.last_fault = fault;
        }

        let line = summarize(&snapshot)?;
        let due = self
            .last_line
            .map_or(true, |at| at.elapsed() >= self.line_interval);
        if due {
            info!("{}", line);
            self.last_line = Some(Instant::now());
        } else {
            debug!("{}", line);
        }
        Some(line)
    }

    /// Render the last snapshot unconditionally
    pub fn render_final(&self) -> Option<String> {
        let line = summarize(&self.history.snapshot())?;
        info!("Final: {}", line);
        Some(line)
    }

    /// Snapshots that contained new frames
    pub fn renders(&self) -> u64 {
        self.renders
    }

    /// Render every `period` until `stop` is set or its sender dropped
    pub async fn run(mut self, period: Duration, mut stop: watch::Receiver<bool>) -> Self {
        let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = stop.wait_for(|stop| *stop) => break,
                _ = ticker.tick() => {
                    self.render();
                }
            }
        }
        self
    }
}
