//! Streaming Frame Decoder
//!
//! Turns an arbitrary chunked byte stream into validated frames. Frame
//! boundaries depend only on the LF-CR terminator, so a malformed
//! candidate never affects the decoding of the frames that follow it.

use crate::error::DecodeError;
use crate::frame::{Frame, CHANNEL_COUNT};
use crate::wire;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Decoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Largest unterminated run kept in the pending buffer
    pub max_pending_bytes: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_pending_bytes: wire::DEFAULT_MAX_PENDING_BYTES,
        }
    }
}

/// Running decoder counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    /// Frames decoded successfully
    pub frames: u64,
    /// Candidates with the wrong number of fields
    pub field_count_mismatches: u64,
    /// Candidates with an empty or non-integer field
    pub non_integer_fields: u64,
    /// Times the pending buffer overflowed without a terminator
    pub oversized: u64,
    /// Bytes thrown away by overflow or by `discard_pending`
    pub bytes_discarded: u64,
}

impl DecoderStats {
    /// Total rejected candidates
    pub fn rejected(&self) -> u64 {
        self.field_count_mismatches + self.non_integer_fields + self.oversized
    }
}

/// Stateful byte-stream to frame transducer, one per stream session
#[derive(Debug)]
pub struct FrameDecoder {
    /// Bytes received since the last confirmed frame boundary
    pending: Vec<u8>,
    /// Offset in `pending` where the next terminator scan starts
    scan_from: usize,
    config: DecoderConfig,
    stats: DecoderStats,
}

impl FrameDecoder {
    /// Create a decoder with the given configuration
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            pending: Vec::with_capacity(config.max_pending_bytes.min(64 * 1024)),
            scan_from: 0,
            config,
            stats: DecoderStats::default(),
        }
    }

    /// Feed received bytes, stamping decoded frames with the current time
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<Frame, DecodeError>> {
        self.feed_at(bytes, Utc::now())
    }

    /// Feed received bytes, stamping decoded frames with `received_at`.
    ///
    /// Returns zero or more outcomes in stream order. Incomplete trailing
    /// data stays buffered for the next call. A run longer than
    /// `max_pending_bytes` without a terminator is discarded as soon as
    /// its next byte is known not to start one, so the outcomes do not
    /// depend on how the stream was split into chunks.
    pub fn feed_at(
        &mut self,
        bytes: &[u8],
        received_at: DateTime<Utc>,
    ) -> Vec<Result<Frame, DecodeError>> {
        self.pending.extend_from_slice(bytes);

        let mut outcomes = Vec::new();
        let mut start = 0;
        let mut i = self.scan_from;

        while i + 1 < self.pending.len() {
            if self.pending[i] == wire::TERMINATOR[0] && self.pending[i + 1] == wire::TERMINATOR[1] {
                let outcome = parse_candidate(&self.pending[start..i], received_at);
                self.count(&outcome);
                outcomes.push(outcome);
                start = i + wire::TERMINATOR.len();
                i = start;
            } else if i + 1 - start > self.config.max_pending_bytes {
                // Byte `i` cannot begin a terminator; drop the run through it
                let outcome = Err(DecodeError::FrameTooLarge {
                    limit: self.config.max_pending_bytes,
                    discarded: i + 1 - start,
                });
                self.count(&outcome);
                outcomes.push(outcome);
                start = i + 1;
                i = start;
            } else {
                i += 1;
            }
        }

        self.pending.drain(..start);
        // The last byte may be the first half of a split terminator
        self.scan_from = self.pending.len().saturating_sub(1);

        outcomes
    }

    /// Drop any buffered partial frame, returning how many bytes were lost
    pub fn discard_pending(&mut self) -> usize {
        let discarded = self.pending.len();
        if discarded > 0 {
            debug!("Discarding {} undecoded pending bytes", discarded);
        }
        self.pending.clear();
        self.scan_from = 0;
        self.stats.bytes_discarded += discarded as u64;
        discarded
    }

    /// Bytes currently buffered without a terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Decoder counters
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Decoder configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    fn count(&mut self, outcome: &Result<Frame, DecodeError>) {
        match outcome {
            Ok(_) => self.stats.frames += 1,
            Err(DecodeError::FrameTooLarge { limit, discarded }) => {
                warn!(
                    "No frame terminator within {} bytes, discarding {} pending bytes",
                    limit, discarded
                );
                self.stats.oversized += 1;
                self.stats.bytes_discarded += *discarded as u64;
            }
            Err(e) => {
                debug!("Dropping malformed frame: {}", e);
                match e {
                    DecodeError::FieldCountMismatch { .. } => self.stats.field_count_mismatches += 1,
                    DecodeError::NonIntegerField { .. } => self.stats.non_integer_fields += 1,
                    DecodeError::FrameTooLarge { .. } => {}
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

/// Validate one raw candidate (the bytes before a terminator)
fn parse_candidate(raw: &[u8], received_at: DateTime<Utc>) -> Result<Frame, DecodeError> {
    let mut fields: Vec<&[u8]> = raw.split(|&b| b == wire::FIELD_SEPARATOR).collect();

    // A single separator right before the terminator is allowed
    if fields.last().is_some_and(|f| f.trim_ascii().is_empty()) {
        fields.pop();
    }

    if fields.len() != CHANNEL_COUNT {
        return Err(DecodeError::FieldCountMismatch {
            expected: CHANNEL_COUNT,
            actual: fields.len(),
        });
    }

    let mut values = [0i64; CHANNEL_COUNT];
    for (index, field) in fields.iter().enumerate() {
        values[index] = parse_field(field).ok_or_else(|| DecodeError::NonIntegerField {
            index,
            raw: String::from_utf8_lossy(field).into_owned(),
        })?;
    }

    Ok(Frame::new(values, received_at))
}

fn parse_field(field: &[u8]) -> Option<i64> {
    let text = std::str::from_utf8(field.trim_ascii()).ok()?;
    if text.is_empty() {
        return None;
    }
    text.parse().ok()
}
