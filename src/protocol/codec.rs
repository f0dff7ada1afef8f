//! Wire protocol for the coordination link.
//!
//! The command set is a handful of short ASCII-tagged messages with decimal
//! payloads, multiplexed over one byte stream per peer. The one exception is
//! the ping reply, which leads with two fixed-width 8-byte big-endian
//! nanosecond timestamps so the group owner's receive/send times survive
//! without string formatting, followed by the ASCII round marker.
//!
//! Classification operates on an explicit byte count; buffers are not
//! NUL-terminated and may carry stale bytes past the read length.

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::BeamSyncError;

/// Request a timed ping round
const TAG_SYNCH: &[u8] = b"synch";
/// Ping round marker, followed by `<window>X<round>`
const TAG_PING: &[u8] = b"pingpingy";
/// Schedule a synchronized start, followed by a decimal nanotime
const TAG_PLAY: &[u8] = b"play";
/// Apply or schedule a phase offset, followed by a decimal nano delay
const TAG_PHASE: &[u8] = b"phase";
/// Immediate stop
const TAG_STOP: &[u8] = b"stop";

/// Byte length of the two leading timestamps in a ping reply
const REPLY_TIMESTAMP_LEN: usize = 16;

/// A classified wire message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireMessage {
    /// Request that the receiving peer begin a timed ping round
    Synch,
    /// Ping round marker carrying its window slot and round counter
    Ping {
        /// Window slot the round targets
        window: u8,
        /// Round counter within that slot
        round: u32,
    },
    /// Round completion payload from the group owner
    PingReply {
        /// Owner's receive nanotime for the matching ping
        server_received: i64,
        /// Owner's send nanotime for this reply
        server_sent: i64,
        /// Window slot echoed from the ping
        window: u8,
        /// Round counter echoed from the ping
        round: u32,
    },
    /// Schedule a synchronized start anchored to the sender's nanotime
    Play {
        /// Sender's local clock at send time, in nanoseconds
        timestamp: i64,
    },
    /// Apply or store a phase delay
    Phase {
        /// Delay in nanoseconds; may be negative
        delay: i64,
    },
    /// Stop playback immediately
    Stop,
    /// Input that matched no known tag
    Unrecognized,
}

impl WireMessage {
    /// Classify an inbound buffer.
    ///
    /// `buf` must be exactly the bytes read for one message; anything that
    /// fails tag or payload parsing classifies as [`WireMessage::Unrecognized`].
    #[must_use]
    pub fn decode(buf: &[u8]) -> Self {
        // The binary reply is the only message that does not start with an
        // ASCII tag; its marker sits after the two fixed-width timestamps.
        if buf.len() > REPLY_TIMESTAMP_LEN && buf[REPLY_TIMESTAMP_LEN] == b'X' {
            if let Some((window, round)) = parse_round_marker(&buf[REPLY_TIMESTAMP_LEN..]) {
                return Self::PingReply {
                    server_received: BigEndian::read_i64(&buf[0..8]),
                    server_sent: BigEndian::read_i64(&buf[8..16]),
                    window,
                    round,
                };
            }
        }

        if buf == TAG_SYNCH {
            return Self::Synch;
        }
        if buf == TAG_STOP {
            return Self::Stop;
        }
        if let Some(rest) = buf.strip_prefix(TAG_PING) {
            return match parse_window_round(rest) {
                Some((window, round)) => Self::Ping { window, round },
                None => Self::Unrecognized,
            };
        }
        // "phase" before "play": distinct prefixes today, but the order
        // documents that longer tags win.
        if let Some(rest) = buf.strip_prefix(TAG_PHASE) {
            return match parse_decimal(rest) {
                Some(delay) => Self::Phase { delay },
                None => Self::Unrecognized,
            };
        }
        if let Some(rest) = buf.strip_prefix(TAG_PLAY) {
            return match parse_decimal(rest) {
                Some(timestamp) => Self::Play { timestamp },
                None => Self::Unrecognized,
            };
        }

        Self::Unrecognized
    }

    /// Encode for the wire.
    ///
    /// # Errors
    ///
    /// Returns `CodecError` for [`WireMessage::Unrecognized`], which has no
    /// wire form.
    pub fn encode(&self) -> Result<Bytes, BeamSyncError> {
        let bytes = match self {
            Self::Synch => Bytes::from_static(TAG_SYNCH),
            Self::Stop => Bytes::from_static(TAG_STOP),
            Self::Ping { window, round } => {
                Bytes::from(format!("pingpingy{window}X{round}").into_bytes())
            }
            Self::PingReply {
                server_received,
                server_sent,
                window,
                round,
            } => {
                let marker = format!("X{window}X{round}");
                let mut buf = BytesMut::with_capacity(REPLY_TIMESTAMP_LEN + marker.len());
                buf.put_i64(*server_received);
                buf.put_i64(*server_sent);
                buf.put_slice(marker.as_bytes());
                buf.freeze()
            }
            Self::Play { timestamp } => Bytes::from(format!("play{timestamp}").into_bytes()),
            Self::Phase { delay } => Bytes::from(format!("phase{delay}").into_bytes()),
            Self::Unrecognized => {
                return Err(BeamSyncError::CodecError {
                    message: "unrecognized messages have no wire form".to_string(),
                });
            }
        };
        Ok(bytes)
    }
}

/// Parse `<window>X<round>` (the payload of a ping marker).
fn parse_window_round(rest: &[u8]) -> Option<(u8, u32)> {
    let split = rest.iter().position(|&b| b == b'X')?;
    let window = parse_unsigned(&rest[..split])?;
    let round = parse_unsigned(&rest[split + 1..])?;
    Some((u8::try_from(window).ok()?, u32::try_from(round).ok()?))
}

/// Parse `X<window>X<round>` (the trailing marker of a binary reply).
fn parse_round_marker(marker: &[u8]) -> Option<(u8, u32)> {
    parse_window_round(marker.strip_prefix(b"X")?)
}

/// Parse an unsigned ASCII decimal.
fn parse_unsigned(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut value: u64 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value
            .checked_mul(10)?
            .checked_add(u64::from(b - b'0'))?;
    }
    Some(value)
}

/// Parse a signed ASCII decimal.
fn parse_decimal(bytes: &[u8]) -> Option<i64> {
    let (negative, digits) = match bytes.strip_prefix(b"-") {
        Some(rest) => (true, rest),
        None => (false, bytes),
    };
    let magnitude = parse_unsigned(digits)?;
    if negative {
        // i64::MIN magnitude overflows the positive range, handle it directly.
        if magnitude == i64::MAX as u64 + 1 {
            return Some(i64::MIN);
        }
        Some(-i64::try_from(magnitude).ok()?)
    } else {
        i64::try_from(magnitude).ok()
    }
}
