//! Engine Telemetry Protocol
//!
//! This crate decodes the telemetry stream emitted by the engine
//! controller over a serial link: 17 signed decimal fields separated by
//! `;`, terminated by LF followed by CR. The stream has no length prefix
//! and no checksum, so the decoder recovers frame boundaries from the
//! terminator alone and resynchronizes after any corrupt or partial input.

mod decoder;
mod error;
mod frame;
mod link;

pub use decoder::{DecoderConfig, DecoderStats, FrameDecoder};
pub use error::{DecodeError, TransportError};
pub use frame::{Channel, Frame, CHANNEL_COUNT};
pub use link::{open_link, resolve_port, LinkConfig};

/// Wire format constants
pub mod wire {
    /// Field separator (`;`)
    pub const FIELD_SEPARATOR: u8 = 59;
    /// Frame terminator: line-feed followed by carriage-return
    pub const TERMINATOR: [u8; 2] = [b'\n', b'\r'];
    /// Baud rate used by the controller firmware
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;
    /// Pending-buffer limit before an unterminated run is discarded
    pub const DEFAULT_MAX_PENDING_BYTES: usize = 4096;
}
