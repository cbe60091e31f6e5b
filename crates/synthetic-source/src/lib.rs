//! Synthetic Telemetry Source
//!
//! Generates frames with the same shape as the engine controller's
//! output so the rest of the pipeline can run without hardware. The
//! sequence is fully determined by the configured seed.

mod drive;
mod source;

pub use drive::{DriverPhase, Gear, GearBox};
pub use source::{SyntheticConfig, SyntheticSource};
