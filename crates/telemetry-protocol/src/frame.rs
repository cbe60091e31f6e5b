//! Telemetry Frame Definitions
//!
//! Defines the 17 channels sent by the engine controller, in wire order,
//! and the immutable frame value produced by the decoder.

use crate::wire;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of channels in every frame
pub const CHANNEL_COUNT: usize = 17;

/// Telemetry channels in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum Channel {
    /// Controller-side record counter (opaque, may wrap or reset)
    LogIndex = 0,
    /// Engine speed (rpm)
    EngineRpm,
    /// Vehicle speed (km/h)
    VehicleSpeed,
    /// Selected gear (-1 reverse, 0 neutral)
    Gear,
    /// Engine torque (Nm)
    Torque,
    /// Oil/coolant temperature (°C)
    OilCoolantTemperature,
    /// Exhaust gas temperature, bank 1 (°C)
    EgtBank1,
    /// Exhaust gas temperature, bank 2 (°C)
    EgtBank2,
    /// Intake air temperature (°C)
    IntakeAirTemperature,
    /// Oil pressure (bar * 100)
    OilPress,
    /// Fuel pressure
    FuelPress,
    /// Manifold absolute pressure (mbar)
    MapValue,
    /// Exhaust back-pressure, bank 1
    ExhaustPressBank1,
    /// Exhaust back-pressure, bank 2
    ExhaustPressBank2,
    /// Battery rail (mV)
    U12v,
    /// Sensor supply rail (mV)
    U5v,
    /// Fault bit field, passed through opaquely
    Faultword1,
}

impl Channel {
    /// All channels in wire order
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::LogIndex,
        Channel::EngineRpm,
        Channel::VehicleSpeed,
        Channel::Gear,
        Channel::Torque,
        Channel::OilCoolantTemperature,
        Channel::EgtBank1,
        Channel::EgtBank2,
        Channel::IntakeAirTemperature,
        Channel::OilPress,
        Channel::FuelPress,
        Channel::MapValue,
        Channel::ExhaustPressBank1,
        Channel::ExhaustPressBank2,
        Channel::U12v,
        Channel::U5v,
        Channel::Faultword1,
    ];

    /// Position of this channel in a frame
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Column name used by the controller firmware and the CSV log
    pub fn name(&self) -> &'static str {
        match self {
            Channel::LogIndex => "log_index",
            Channel::EngineRpm => "engine_rpm",
            Channel::VehicleSpeed => "vehicle_speed",
            Channel::Gear => "gear",
            Channel::Torque => "torque",
            Channel::OilCoolantTemperature => "oil_coolant_temperature",
            Channel::EgtBank1 => "EGT_bank1",
            Channel::EgtBank2 => "EGT_bank2",
            Channel::IntakeAirTemperature => "intake_air_temperature",
            Channel::OilPress => "oil_press",
            Channel::FuelPress => "fuel_press",
            Channel::MapValue => "MAP_value",
            Channel::ExhaustPressBank1 => "exhaust_press_bank1",
            Channel::ExhaustPressBank2 => "exhaust_press_bank2",
            Channel::U12v => "U12V",
            Channel::U5v => "U5V",
            Channel::Faultword1 => "faultword1",
        }
    }
}

/// One decoded telemetry record.
///
/// Values are validated once when the frame is built and never change
/// afterwards; consumers share frames by value or behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Ingestion time, assigned on decode (not transmitted)
    received_at: DateTime<Utc>,
    /// Channel values in wire order
    values: [i64; CHANNEL_COUNT],
}

impl Frame {
    /// Build a frame from channel values in wire order
    pub fn new(values: [i64; CHANNEL_COUNT], received_at: DateTime<Utc>) -> Self {
        Self {
            received_at,
            values,
        }
    }

    /// Ingestion timestamp
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// All channel values in wire order
    pub fn values(&self) -> &[i64; CHANNEL_COUNT] {
        &self.values
    }

    /// Value of a single channel
    pub fn get(&self, channel: Channel) -> i64 {
        self.values[channel.index()]
    }

    pub fn log_index(&self) -> i64 {
        self.get(Channel::LogIndex)
    }

    pub fn engine_rpm(&self) -> i64 {
        self.get(Channel::EngineRpm)
    }

    pub fn vehicle_speed(&self) -> i64 {
        self.get(Channel::VehicleSpeed)
    }

    pub fn gear(&self) -> i64 {
        self.get(Channel::Gear)
    }

    pub fn torque(&self) -> i64 {
        self.get(Channel::Torque)
    }

    pub fn oil_coolant_temperature(&self) -> i64 {
        self.get(Channel::OilCoolantTemperature)
    }

    pub fn egt_bank1(&self) -> i64 {
        self.get(Channel::EgtBank1)
    }

    pub fn egt_bank2(&self) -> i64 {
        self.get(Channel::EgtBank2)
    }

    pub fn intake_air_temperature(&self) -> i64 {
        self.get(Channel::IntakeAirTemperature)
    }

    pub fn oil_press(&self) -> i64 {
        self.get(Channel::OilPress)
    }

    pub fn fuel_press(&self) -> i64 {
        self.get(Channel::FuelPress)
    }

    pub fn map_value(&self) -> i64 {
        self.get(Channel::MapValue)
    }

    pub fn exhaust_press_bank1(&self) -> i64 {
        self.get(Channel::ExhaustPressBank1)
    }

    pub fn exhaust_press_bank2(&self) -> i64 {
        self.get(Channel::ExhaustPressBank2)
    }

    pub fn u12v(&self) -> i64 {
        self.get(Channel::U12v)
    }

    pub fn u5v(&self) -> i64 {
        self.get(Channel::U5v)
    }

    pub fn faultword1(&self) -> i64 {
        self.get(Channel::Faultword1)
    }

    /// Render the frame in wire format, including the trailing separator
    /// the controller firmware emits before the terminator.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CHANNEL_COUNT * 6 + 2);
        for value in &self.values {
            out.extend_from_slice(value.to_string().as_bytes());
            out.push(wire::FIELD_SEPARATOR);
        }
        out.extend_from_slice(&wire::TERMINATOR);
        out
    }
}
