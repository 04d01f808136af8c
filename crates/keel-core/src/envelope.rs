//! The plaintext message envelope used before an auth key exists.
//!
//! ```text
//! auth_key_id (8 bytes, all zero) || msg_id (8) || len (4) || body
//! ```
//!
//! Message ids are the unix time as a 32.32 fixed-point value, bumped past
//! the previous id on collision so ids stay strictly increasing within a
//! session.

use keel_crypto::sha::sha1;

use crate::wire::WireError;

/// Envelope header length: key id, message id, body length.
pub const ENVELOPE_HEADER_LEN: usize = 8 + 8 + 4;

/// Generates strictly increasing protocol message ids.
#[derive(Debug, Default)]
pub struct MessageIdClock {
    last: i64,
}

impl MessageIdClock {
    /// Create a clock with no issued ids.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next message id, corrected by `clock_offset` seconds of
    /// measured server/client skew.
    pub fn next(&mut self, clock_offset: i32) -> i64 {
        let millis = unix_millis() + i64::from(clock_offset) * 1000;
        let mut id = ((i128::from(millis) << 32) / 1000) as i64;
        if id <= self.last {
            id = self.last + 1;
        }
        self.last = id;
        id
    }
}

fn unix_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

/// Wrap a message body in the plaintext envelope.
#[must_use]
pub fn pack_plaintext(msg_id: i64, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ENVELOPE_HEADER_LEN + body.len());
    out.extend_from_slice(&0i64.to_le_bytes());
    out.extend_from_slice(&msg_id.to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// A parsed plaintext envelope, borrowing the body from the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlainMessage<'a> {
    /// Message id assigned by the sender
    pub msg_id: i64,
    /// The message body
    pub body: &'a [u8],
}

/// Parse a plaintext envelope out of a decoded frame.
///
/// # Errors
///
/// [`WireError::Malformed`] if the key id is non-zero (an encrypted frame
/// reached the handshake) or the declared body length disagrees with the
/// frame, [`WireError::Truncated`] if the header itself is short.
pub fn unpack_plaintext(frame: &[u8]) -> Result<PlainMessage<'_>, WireError> {
    if frame.len() < ENVELOPE_HEADER_LEN {
        return Err(WireError::Truncated);
    }
    let (header, body) = frame.split_at(ENVELOPE_HEADER_LEN);
    if header[..8] != [0u8; 8] {
        return Err(WireError::Malformed("non-zero auth key id"));
    }
    let mut msg_id = [0u8; 8];
    msg_id.copy_from_slice(&header[8..16]);
    let len = u32::from_le_bytes([header[16], header[17], header[18], header[19]]) as usize;
    if len != body.len() {
        return Err(WireError::Malformed("body length mismatch"));
    }
    Ok(PlainMessage {
        msg_id: i64::from_le_bytes(msg_id),
        body,
    })
}

/// Quick-ack id for an outgoing plaintext: the low 31 bits of the first
/// four digest bytes, the value the server echoes when a quick-ack was
/// requested for the message.
#[must_use]
pub fn quick_ack_id(plaintext: &[u8]) -> u32 {
    let digest = sha1(plaintext);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) & 0x7fff_ffff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_round_trip() {
        let body = [7u8; 24];
        let frame = pack_plaintext(0x0102_0304_0506_0700, &body);
        assert_eq!(frame.len(), ENVELOPE_HEADER_LEN + 24);
        assert_eq!(&frame[..8], &[0u8; 8]);
        let msg = unpack_plaintext(&frame).unwrap();
        assert_eq!(msg.msg_id, 0x0102_0304_0506_0700);
        assert_eq!(msg.body, &body);
    }

    #[test]
    fn test_unpack_rejects_encrypted_frames() {
        let mut frame = pack_plaintext(1, &[0u8; 4]);
        frame[3] = 0xFF;
        assert_eq!(
            unpack_plaintext(&frame),
            Err(WireError::Malformed("non-zero auth key id"))
        );
    }

    #[test]
    fn test_unpack_rejects_length_mismatch() {
        let mut frame = pack_plaintext(1, &[0u8; 8]);
        frame.truncate(frame.len() - 4);
        assert_eq!(
            unpack_plaintext(&frame),
            Err(WireError::Malformed("body length mismatch"))
        );
    }

    #[test]
    fn test_message_ids_strictly_increase() {
        let mut clock = MessageIdClock::new();
        let mut last = 0;
        for _ in 0..1000 {
            let id = clock.next(0);
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn test_message_id_reflects_clock_offset() {
        let mut a = MessageIdClock::new();
        let mut b = MessageIdClock::new();
        let base = a.next(0);
        let skewed = b.next(3600);
        // An hour of skew is an hour in the 32.32 fixed-point id space
        let delta = skewed - base;
        assert!(delta > 3599 * (1i64 << 32));
        assert!(delta < 3601 * (1i64 << 32));
    }

    #[test]
    fn test_quick_ack_id_masks_top_bit() {
        for seed in 0u8..32 {
            let id = quick_ack_id(&[seed; 40]);
            assert_eq!(id & 0x8000_0000, 0);
        }
    }
}
