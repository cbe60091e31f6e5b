//! Synthetic Frame Generator

use crate::drive::{DriverPhase, Gear, GearBox};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use telemetry_protocol::{Channel, Frame, CHANNEL_COUNT};
use tracing::{debug, info};

/// Synthetic source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// RNG seed; equal seeds give equal frame sequences
    pub seed: u64,
    /// Highest forward gear
    pub max_gear: u8,
    /// Simulated time between frames (ms)
    pub interval_ms: u64,
    /// Chance per frame of raising a fault bit
    pub fault_probability: f64,
    /// Frames a raised fault stays active
    pub fault_hold_frames: u32,
    /// First log index emitted
    pub start_index: i64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            max_gear: 8,
            interval_ms: 50,
            fault_probability: 0.002,
            fault_hold_frames: 40,
            start_index: 1,
        }
    }
}

const IDLE_RPM: f64 = 800.0;
const MIN_RPM: f64 = 700.0;
const MAX_RPM: f64 = 6500.0;
const MAX_SPEED_KMH: f64 = 220.0;
const MAX_REVERSE_KMH: f64 = 12.0;
const COOLANT_SET_POINT: f64 = 90.0;
const FAULT_BITS: u32 = 8;

/// Continuous vehicle state between frames
#[derive(Debug, Clone)]
struct Vehicle {
    phase: DriverPhase,
    phase_ticks: u32,
    target_speed: f64,
    throttle: f64,
    brake: f64,
    speed: f64,
    rpm: f64,
    coolant: f64,
    fault_word: i64,
    fault_ticks_left: u32,
}

/// Deterministic, infinite generator of plausible telemetry frames
pub struct SyntheticSource {
    rng: StdRng,
    config: SyntheticConfig,
    gearbox: GearBox,
    vehicle: Vehicle,
    log_index: i64,
}

impl SyntheticSource {
    /// Create a source from configuration
    pub fn new(config: SyntheticConfig) -> Self {
        info!(
            "Creating synthetic source (seed {:#x}, {} ms per frame)",
            config.seed, config.interval_ms
        );
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            gearbox: GearBox::new(config.max_gear),
            vehicle: Vehicle {
                phase: DriverPhase::Idle,
                phase_ticks: 0,
                target_speed: 0.0,
                throttle: 0.0,
                brake: 0.0,
                speed: 0.0,
                rpm: IDLE_RPM,
                coolant: 70.0,
                fault_word: 0,
                fault_ticks_left: 0,
            },
            log_index: config.start_index,
            config,
        }
    }

    /// Create a source with default settings and the given seed
    pub fn with_seed(seed: u64) -> Self {
        Self::new(SyntheticConfig {
            seed,
            ..Default::default()
        })
    }

    /// Produce the next frame stamped with the current time
    pub fn next_frame(&mut self) -> Frame {
        self.next_frame_at(Utc::now())
    }

    /// Produce the next frame stamped with `received_at`
    pub fn next_frame_at(&mut self, received_at: DateTime<Utc>) -> Frame {
        let dt = self.config.interval_ms as f64 / 1000.0;
        self.step_driver();
        self.step_vehicle(dt);
        self.step_faults();

        let frame = Frame::new(self.channels(), received_at);
        self.log_index = self.log_index.wrapping_add(1);
        frame
    }

    /// Current gear
    pub fn gear(&self) -> Gear {
        self.gearbox.gear()
    }

    /// Current driver phase
    pub fn phase(&self) -> DriverPhase {
        self.vehicle.phase
    }

    /// Configuration in use
    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    fn enter(&mut self, phase: DriverPhase) {
        debug!("Driver phase {:?} -> {:?}", self.vehicle.phase, phase);
        let v = &mut self.vehicle;
        v.phase = phase;
        v.phase_ticks = 0;
        match phase {
            DriverPhase::Idle => {
                v.throttle = 0.0;
                v.brake = 0.0;
            }
            DriverPhase::Accelerate => {
                v.target_speed = self.rng.gen_range(30.0..180.0);
                v.throttle = self.rng.gen_range(0.5..1.0);
                v.brake = 0.0;
            }
            DriverPhase::Cruise => {
                v.throttle = 0.25;
                v.brake = 0.0;
            }
            DriverPhase::Brake => {
                v.throttle = 0.0;
                v.brake = self.rng.gen_range(0.3..1.0);
            }
            DriverPhase::Reversing => {
                v.throttle = 0.15;
                v.brake = 0.0;
            }
        }
    }

    /// Throttle and brake triggers
    fn step_driver(&mut self) {
        self.vehicle.phase_ticks += 1;
        let stopped = self.vehicle.speed < 1.0;

        let next = match self.vehicle.phase {
            DriverPhase::Idle if self.vehicle.phase_ticks > 20 => {
                if self.rng.gen_bool(0.01) {
                    Some(DriverPhase::Reversing)
                } else if self.rng.gen_bool(0.05) {
                    Some(DriverPhase::Accelerate)
                } else {
                    None
                }
            }
            DriverPhase::Accelerate => {
                if self.vehicle.speed >= self.vehicle.target_speed {
                    Some(DriverPhase::Cruise)
                } else if self.rng.gen_bool(0.002) {
                    Some(DriverPhase::Brake)
                } else {
                    None
                }
            }
            DriverPhase::Cruise => {
                if self.rng.gen_bool(0.004) {
                    Some(DriverPhase::Brake)
                } else if self.rng.gen_bool(0.004) {
                    Some(DriverPhase::Accelerate)
                } else {
                    None
                }
            }
            DriverPhase::Brake if stopped => Some(DriverPhase::Idle),
            DriverPhase::Reversing if self.vehicle.phase_ticks > 80 => Some(DriverPhase::Brake),
            _ => None,
        };

        if let Some(phase) = next {
            self.enter(phase);
        }
    }

    fn step_vehicle(&mut self, dt: f64) {
        let (gear, ratio) = (self.gearbox.gear(), self.gearbox.ratio());
        let noise = self.rng.gen_range(-10.0..=10.0);
        let v = &mut self.vehicle;

        // Cruise holds speed with a little throttle hunting
        if v.phase == DriverPhase::Cruise {
            v.throttle = (0.25 + (v.target_speed - v.speed) * 0.02).clamp(0.0, 0.6);
        }

        let drive = match gear {
            Gear::Forward(n) => v.throttle * (16.0 - 1.4 * n as f64),
            Gear::Reverse => v.throttle * 8.0,
            Gear::Neutral => 0.0,
        };
        let resistance = if v.speed > 0.0 { 0.5 + 0.015 * v.speed } else { 0.0 };
        let accel = drive - v.brake * 30.0 - resistance;

        let top = if gear == Gear::Reverse {
            MAX_REVERSE_KMH
        } else {
            MAX_SPEED_KMH
        };
        v.speed = (v.speed + accel * dt).clamp(0.0, top);

        let target_rpm = match gear {
            Gear::Neutral => IDLE_RPM + v.throttle * 1500.0,
            _ => IDLE_RPM + v.speed * ratio,
        };
        v.rpm = (v.rpm + (target_rpm - v.rpm) * 0.25 + noise).clamp(MIN_RPM, MAX_RPM);

        let (phase, speed, rpm) = (v.phase, v.speed, v.rpm);
        if self.gearbox.update(phase, speed, rpm) {
            debug!("Shifted to {:?} at {:.0} rpm", self.gearbox.gear(), rpm);
        }

        let drift = (COOLANT_SET_POINT - self.vehicle.coolant) * 0.002;
        let wobble = self.rng.gen_range(-0.05..=0.05);
        self.vehicle.coolant = (self.vehicle.coolant + drift + wobble).clamp(60.0, 115.0);
    }

    /// Occasionally raise a single fault bit and hold it for a while
    fn step_faults(&mut self) {
        let v = &mut self.vehicle;
        if v.fault_ticks_left > 0 {
            v.fault_ticks_left -= 1;
            if v.fault_ticks_left == 0 {
                v.fault_word = 0;
            }
            return;
        }

        if self.config.fault_probability > 0.0
            && self.rng.gen_bool(self.config.fault_probability.min(1.0))
        {
            let bit = self.rng.gen_range(0..FAULT_BITS);
            let v = &mut self.vehicle;
            v.fault_word = 1 << bit;
            v.fault_ticks_left = self.config.fault_hold_frames.max(1);
            debug!("Injected fault bit {}", bit);
        }
    }

    fn channels(&mut self) -> [i64; CHANNEL_COUNT] {
        let v = self.vehicle.clone();
        let load = v.rpm / MAX_RPM;
        let torque_curve = (1.0 - ((v.rpm - 3500.0) / 3500.0).powi(2)).clamp(0.2, 1.0);

        let egt1 = 300.0 + load * 700.0 + self.rng.gen_range(-5.0..=5.0);
        let egt2 = egt1 - 10.0 + self.rng.gen_range(-3.0..=3.0);
        let exhaust1 = 80.0 + load * 120.0;

        let mut values = [0i64; CHANNEL_COUNT];
        let mut set = |channel: Channel, value: f64| values[channel.index()] = value.round() as i64;

        set(Channel::EngineRpm, v.rpm);
        set(Channel::VehicleSpeed, v.speed);
        set(Channel::Torque, (v.throttle * 450.0 * torque_curve).clamp(0.0, 450.0));
        set(Channel::OilCoolantTemperature, v.coolant);
        set(Channel::EgtBank1, egt1);
        set(Channel::EgtBank2, egt2);
        set(Channel::IntakeAirTemperature, 20.0 + (v.rpm / 10_000.0) * 30.0);
        set(Channel::OilPress, (1.5 + load * 4.0) * 100.0);
        set(Channel::FuelPress, 2500.0 + load * 1500.0);
        set(Channel::MapValue, 1000.0 + (0.3 * load + 0.7 * v.throttle) * 1500.0);
        set(Channel::ExhaustPressBank1, exhaust1);
        set(Channel::ExhaustPressBank2, exhaust1 - 5.0);

        values[Channel::LogIndex.index()] = self.log_index;
        values[Channel::Gear.index()] = self.gearbox.gear().as_channel();
        values[Channel::U12v.index()] = 13_800 + self.rng.gen_range(-50..=50);
        values[Channel::U5v.index()] = 5_020 + self.rng.gen_range(-5..=5);
        values[Channel::Faultword1.index()] = v.fault_word;
        values
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

/// Never ends; `next` always returns `Some`
impl Iterator for SyntheticSource {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        Some(self.next_frame())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn values(source: &mut SyntheticSource, n: usize) -> Vec<[i64; CHANNEL_COUNT]> {
        let ts = Utc::now();
        (0..n).map(|_| *source.next_frame_at(ts).values()).collect()
    }

    fn check_invariants(frame: &[i64; CHANNEL_COUNT], max_gear: i64) -> Result<(), String> {
        let get = |c: Channel| frame[c.index()];
        let checks = [
            ("rpm", (700..=6500).contains(&get(Channel::EngineRpm))),
            ("speed", (0..=220).contains(&get(Channel::VehicleSpeed))),
            ("gear", (-1..=max_gear).contains(&get(Channel::Gear))),
            ("torque", (0..=450).contains(&get(Channel::Torque))),
            ("coolant", (60..=115).contains(&get(Channel::OilCoolantTemperature))),
            ("u12v", (13_750..=13_850).contains(&get(Channel::U12v))),
            ("u5v", (5_015..=5_025).contains(&get(Channel::U5v))),
            ("egt", get(Channel::EgtBank2) < get(Channel::EgtBank1) + 5),
            (
                "fault",
                get(Channel::Faultword1) == 0 || (get(Channel::Faultword1) as u64).is_power_of_two(),
            ),
        ];
        match checks.iter().find(|(_, ok)| !ok) {
            Some((name, _)) => Err(format!("{} out of range in {:?}", name, frame)),
            None => Ok(()),
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let a = values(&mut SyntheticSource::with_seed(42), 500);
        let b = values(&mut SyntheticSource::with_seed(42), 500);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_different_sequence() {
        let a = values(&mut SyntheticSource::with_seed(1), 500);
        let b = values(&mut SyntheticSource::with_seed(2), 500);
        assert_ne!(a, b);
    }

    #[test]
    fn test_log_index_increments() {
        let mut source = SyntheticSource::new(SyntheticConfig {
            start_index: 10,
            ..Default::default()
        });
        let indices: Vec<i64> = (0..5).map(|_| source.next_frame().log_index()).collect();
        assert_eq!(indices, vec![10, 11, 12, 13, 14]);
    }

    #[test]
    fn test_log_index_wraps() {
        let mut source = SyntheticSource::new(SyntheticConfig {
            start_index: i64::MAX - 1,
            ..Default::default()
        });
        let indices: Vec<i64> = (0..4).map(|_| source.next_frame().log_index()).collect();
        assert_eq!(indices, vec![i64::MAX - 1, i64::MAX, i64::MIN, i64::MIN + 1]);
    }

    #[test]
    fn test_drives_through_gears() {
        let mut source = SyntheticSource::with_seed(7);
        let frames = values(&mut source, 20_000);

        let gears: Vec<i64> = frames.iter().map(|f| f[Channel::Gear.index()]).collect();
        assert!(gears.iter().any(|&g| g == 0));
        assert!(gears.iter().any(|&g| g >= 3));
        assert!(frames.iter().any(|f| f[Channel::VehicleSpeed.index()] > 30));

        for frame in &frames {
            check_invariants(frame, 8).unwrap();
        }
    }

    #[test]
    fn test_rpm_changes_smoothly() {
        let frames = values(&mut SyntheticSource::with_seed(3), 5_000);
        for pair in frames.windows(2) {
            let a = pair[0][Channel::EngineRpm.index()];
            let b = pair[1][Channel::EngineRpm.index()];
            // A shift can move the target, but smoothing bounds each step
            assert!((a - b).abs() < 1500, "rpm jumped {} -> {}", a, b);
        }
    }

    #[test]
    fn test_fault_injection() {
        let mut always = SyntheticSource::new(SyntheticConfig {
            fault_probability: 1.0,
            fault_hold_frames: 3,
            ..Default::default()
        });
        let faults: Vec<i64> = (0..4).map(|_| always.next_frame().faultword1()).collect();
        assert_ne!(faults[0], 0);
        assert_eq!(faults[0], faults[1]);
        assert_eq!(faults[0], faults[2]);
        assert_eq!(faults[3], 0);

        let mut never = SyntheticSource::new(SyntheticConfig {
            fault_probability: 0.0,
            ..Default::default()
        });
        assert!((0..2_000).all(|_| never.next_frame().faultword1() == 0));
    }

    #[test]
    fn test_iterator_is_endless() {
        let source = SyntheticSource::with_seed(9);
        assert_eq!(source.take(100).count(), 100);
    }

    proptest! {
        #[test]
        fn frames_stay_plausible(seed in any::<u64>(), max_gear in 1u8..=8) {
            let mut source = SyntheticSource::new(SyntheticConfig {
                seed,
                max_gear,
                fault_probability: 0.05,
                ..Default::default()
            });
            for frame in values(&mut source, 1_000) {
                prop_assert!(check_invariants(&frame, max_gear as i64).is_ok());
            }
        }
    }
}
