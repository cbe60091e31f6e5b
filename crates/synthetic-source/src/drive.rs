//! Driver and Gearbox State Machines

use serde::{Deserialize, Serialize};

/// Selected gear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gear {
    Reverse,
    Neutral,
    Forward(u8),
}

impl Gear {
    /// Value sent on the gear channel (-1 reverse, 0 neutral)
    pub fn as_channel(&self) -> i64 {
        match self {
            Gear::Reverse => -1,
            Gear::Neutral => 0,
            Gear::Forward(n) => *n as i64,
        }
    }
}

/// What the simulated driver is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverPhase {
    /// Stopped, engine idling
    Idle,
    /// Throttle applied towards a target speed
    Accelerate,
    /// Holding speed
    Cruise,
    /// Brake applied until stopped
    Brake,
    /// Backing up slowly in reverse
    Reversing,
}

/// Automatic gearbox driven by engine speed and driver phase
#[derive(Debug, Clone)]
pub struct GearBox {
    gear: Gear,
    max_gear: u8,
    upshift_rpm: f64,
    downshift_rpm: f64,
}

/// Engine rpm per km/h for each forward gear (index 0 unused)
const FORWARD_RATIOS: [f64; 9] = [0.0, 110.0, 65.0, 45.0, 35.0, 28.0, 23.0, 20.0, 17.0];
const REVERSE_RATIO: f64 = 110.0;

impl GearBox {
    /// Create a gearbox in neutral
    pub fn new(max_gear: u8) -> Self {
        Self {
            gear: Gear::Neutral,
            max_gear: max_gear.clamp(1, 8),
            upshift_rpm: 3000.0,
            downshift_rpm: 1300.0,
        }
    }

    pub fn gear(&self) -> Gear {
        self.gear
    }

    pub fn max_gear(&self) -> u8 {
        self.max_gear
    }

    /// Engine rpm per km/h in the current gear (0 in neutral)
    pub fn ratio(&self) -> f64 {
        match self.gear {
            Gear::Reverse => REVERSE_RATIO,
            Gear::Neutral => 0.0,
            Gear::Forward(n) => FORWARD_RATIOS[n as usize],
        }
    }

    /// Apply one step of the shift logic. Returns true on a gear change.
    pub fn update(&mut self, phase: DriverPhase, speed_kmh: f64, rpm: f64) -> bool {
        let stopped = speed_kmh < 1.0;
        let next = match (self.gear, phase) {
            (Gear::Neutral, DriverPhase::Reversing) if stopped => Gear::Reverse,
            (Gear::Neutral, DriverPhase::Accelerate) => Gear::Forward(1),
            (Gear::Reverse, phase) if phase != DriverPhase::Reversing && stopped => Gear::Neutral,
            (Gear::Forward(_), DriverPhase::Idle | DriverPhase::Reversing) if stopped => Gear::Neutral,
            (Gear::Forward(n), _) if rpm > self.upshift_rpm && n < self.max_gear => {
                Gear::Forward(n + 1)
            }
            (Gear::Forward(n), _) if rpm < self.downshift_rpm && n > 1 => Gear::Forward(n - 1),
            (gear, _) => gear,
        };

        let changed = next != self.gear;
        self.gear = next;
        changed
    }
}
