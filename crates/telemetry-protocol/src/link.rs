//! Serial Link to the Engine Controller
//!
//! Opens the serial port the controller streams on. The returned stream
//! is a plain `AsyncRead`; framing is left entirely to [`FrameDecoder`].
//!
//! [`FrameDecoder`]: crate::FrameDecoder

use crate::error::TransportError;
use crate::wire;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::info;

/// Serial link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Device path (e.g. "/dev/ttyUSB0" or "COM3"); auto-selected when unset
    pub port: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout handed to the driver
    pub timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: wire::DEFAULT_BAUD_RATE,
            timeout_ms: 1000,
        }
    }
}

/// Pick the port to open: the configured one, or the only port present
pub fn resolve_port(configured: Option<&str>) -> Result<String, TransportError> {
    if let Some(port) = configured {
        return Ok(port.to_string());
    }

    let ports = tokio_serial::available_ports()?;
    select_single(ports.into_iter().map(|p| p.port_name).collect())
}

fn select_single(mut ports: Vec<String>) -> Result<String, TransportError> {
    match ports.len() {
        0 => Err(TransportError::NoPorts),
        1 => {
            let port = ports.remove(0);
            info!("Auto-selected serial port: {}", port);
            Ok(port)
        }
        n => Err(TransportError::AmbiguousPort(n)),
    }
}

/// Open the serial link described by `config`
pub fn open_link(config: &LinkConfig) -> Result<SerialStream, TransportError> {
    let port = resolve_port(config.port.as_deref())?;
    info!("Opening {} @ {} baud", port, config.baud_rate);

    let stream = tokio_serial::new(&port, config.baud_rate)
        .timeout(Duration::from_millis(config.timeout_ms))
        .open_native_async()?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_port_wins() {
        let port = resolve_port(Some("/dev/ttyACM0")).unwrap();
        assert_eq!(port, "/dev/ttyACM0");
    }

    #[test]
    fn test_select_single_port() {
        let port = select_single(vec!["/dev/ttyUSB0".to_string()]).unwrap();
        assert_eq!(port, "/dev/ttyUSB0");
    }

    #[test]
    fn test_no_ports() {
        assert!(matches!(select_single(vec![]), Err(TransportError::NoPorts)));
    }

    #[test]
    fn test_ambiguous_ports() {
        let ports = vec!["COM3".to_string(), "COM4".to_string()];
        assert!(matches!(
            select_single(ports),
            Err(TransportError::AmbiguousPort(2))
        ));
    }

    #[test]
    fn test_default_baud_rate() {
        assert_eq!(LinkConfig::default().baud_rate, 115_200);
    }
}
