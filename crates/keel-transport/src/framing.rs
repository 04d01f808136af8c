//! Wire framing: the obfuscated length-prefixed packet layout.
//!
//! Client to server, for a payload of `len` bytes (`len` always a multiple
//! of 4, `q = len / 4`):
//!
//! ```text
//! q < 0x7f:   [ q | quick_ack_bit ] payload
//! otherwise:  [ le32((q << 8) | 0x7f) | quick_ack_bit ] payload
//! ```
//!
//! The very first packet on a fresh socket is preceded by a single
//! obfuscation marker byte (`0xEF`), never repeated on that socket.
//!
//! Server to client the same layout applies, plus a frame-free quick-ack
//! notification: a first byte with the top bit set introduces a 4-byte
//! big-endian acknowledged id (top bit masked off).

use crate::error::FrameError;
use crate::{DOWNLOAD_PROGRESS_HEADER_LEN, MAX_FRAME_LEN, OBFUSCATION_MARKER};

/// Request-quick-ack bit in the length prefix
const QUICK_ACK_BIT: u8 = 0x80;
/// Short length prefix values stop below this; it doubles as the extended
/// length escape byte
const EXTENDED_LEN_MARKER: u8 = 0x7f;

/// Encode a payload into a wire packet.
///
/// `first_packet` prepends the one-time obfuscation marker;
/// `request_quick_ack` sets the quick-ack bit in the length prefix.
///
/// # Errors
///
/// Returns [`FrameError::Misaligned`] unless the payload length is a
/// positive multiple of 4, or [`FrameError::Oversized`] above the 2 MiB
/// cap.
pub fn encode_frame(
    payload: &[u8],
    request_quick_ack: bool,
    first_packet: bool,
) -> Result<Vec<u8>, FrameError> {
    if payload.is_empty() || payload.len() % 4 != 0 {
        return Err(FrameError::Misaligned(payload.len()));
    }
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::Oversized(payload.len()));
    }

    let quads = (payload.len() / 4) as u32;
    let mut out = Vec::with_capacity(payload.len() + 5);
    if first_packet {
        out.push(OBFUSCATION_MARKER);
    }
    if quads < u32::from(EXTENDED_LEN_MARKER) {
        let mut prefix = quads as u8;
        if request_quick_ack {
            prefix |= QUICK_ACK_BIT;
        }
        out.push(prefix);
    } else {
        let mut word = (quads << 8) | u32::from(EXTENDED_LEN_MARKER);
        if request_quick_ack {
            word |= u32::from(QUICK_ACK_BIT);
        }
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(payload);
    Ok(out)
}

/// Encode a frame-free quick-ack notification for `ack_id`.
#[must_use]
pub fn encode_quick_ack(ack_id: u32) -> [u8; 4] {
    (ack_id | 0x8000_0000).to_be_bytes()
}

/// A decoded wire event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A complete frame payload
    Frame(Vec<u8>),
    /// A quick-ack notification for a previously sent message
    QuickAck(u32),
    /// Partial-frame progress: enough of a download-class frame is
    /// buffered to recover the in-flight message id
    Progress {
        /// Message id recovered from the buffered frame prefix
        message_id: i64,
        /// Bytes of the frame received so far
        received: u32,
        /// Declared total frame length
        total: u32,
    },
}

/// Stateful frame decoder with carry-over across socket reads.
///
/// Feed raw bytes as they arrive; complete frames, quick-acks and (for
/// download-class connections) partial-frame progress come out as events.
/// An incomplete header or body is retained until the next read.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    download_class: bool,
}

impl FrameDecoder {
    /// Create a decoder. `download_class` enables progress events for
    /// partial frames.
    #[must_use]
    pub fn new(download_class: bool) -> Self {
        Self {
            buffer: Vec::new(),
            download_class,
        }
    }

    /// Number of carry-over bytes awaiting the rest of a frame.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop all carry-over state. Called on reconnect: bytes from the old
    /// socket must never prefix frames from the new one.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Feed newly received bytes, appending decoded events to `events`.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] on a malformed length prefix. The caller
    /// must tear the connection down; the decoder state is unspecified
    /// afterwards until [`FrameDecoder::reset`] is called.
    pub fn feed(&mut self, data: &[u8], events: &mut Vec<FrameEvent>) -> Result<(), FrameError> {
        self.buffer.extend_from_slice(data);
        let mut pos = 0usize;

        loop {
            let remaining = &self.buffer[pos..];
            if remaining.is_empty() {
                break;
            }

            let first = remaining[0];
            if first & QUICK_ACK_BIT != 0 {
                // Not a frame: a 4-byte big-endian ack id with the top bit set
                if remaining.len() < 4 {
                    break;
                }
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&remaining[..4]);
                let ack_id = u32::from_be_bytes(raw) & 0x7fff_ffff;
                events.push(FrameEvent::QuickAck(ack_id));
                pos += 4;
                continue;
            }

            let (length, header_len) = if first == EXTENDED_LEN_MARKER {
                if remaining.len() < 4 {
                    break;
                }
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&remaining[..4]);
                (((u32::from_le_bytes(raw) >> 8) as usize) * 4, 4usize)
            } else {
                (usize::from(first) * 4, 1usize)
            };

            if length == 0 {
                return Err(FrameError::Empty);
            }
            if length > MAX_FRAME_LEN {
                return Err(FrameError::Oversized(length));
            }

            let body = &remaining[header_len..];
            if body.len() < length {
                if self.download_class && body.len() >= DOWNLOAD_PROGRESS_HEADER_LEN {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(&body[8..16]);
                    events.push(FrameEvent::Progress {
                        message_id: i64::from_le_bytes(raw),
                        received: body.len() as u32,
                        total: length as u32,
                    });
                }
                break;
            }

            events.push(FrameEvent::Frame(body[..length].to_vec()));
            pos += header_len + length;
        }

        self.buffer.drain(..pos);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_all(decoder: &mut FrameDecoder, data: &[u8]) -> Vec<FrameEvent> {
        let mut events = Vec::new();
        decoder.feed(data, &mut events).unwrap();
        events
    }

    #[test]
    fn test_short_frame_round_trip() {
        let payload = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let encoded = encode_frame(&payload, false, false).unwrap();
        assert_eq!(encoded[0], 2); // 8 bytes = 2 quads
        let mut decoder = FrameDecoder::new(false);
        assert_eq!(decode_all(&mut decoder, &encoded), vec![FrameEvent::Frame(payload)]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_extended_frame_round_trip() {
        // 0x7f quads = 508 bytes is the first length needing the long form
        let payload = vec![0xA5u8; 508];
        let encoded = encode_frame(&payload, false, false).unwrap();
        assert_eq!(encoded[0], 0x7f);
        assert_eq!(encoded.len(), 4 + 508);
        let mut decoder = FrameDecoder::new(false);
        assert_eq!(decode_all(&mut decoder, &encoded), vec![FrameEvent::Frame(payload)]);
    }

    #[test]
    fn test_first_packet_marker_prepended_once() {
        let payload = vec![0u8; 4];
        let first = encode_frame(&payload, false, true).unwrap();
        assert_eq!(first[0], OBFUSCATION_MARKER);
        let later = encode_frame(&payload, false, false).unwrap();
        assert_ne!(later[0], OBFUSCATION_MARKER);
    }

    #[test]
    fn test_quick_ack_request_bit() {
        let short = encode_frame(&[0u8; 8], true, false).unwrap();
        assert_eq!(short[0], 2 | 0x80);
        let long = encode_frame(&vec![0u8; 508], true, false).unwrap();
        assert_eq!(long[0], 0x7f | 0x80);
    }

    #[test]
    fn test_quick_ack_notification_decodes() {
        let mut decoder = FrameDecoder::new(false);
        let events = decode_all(&mut decoder, &encode_quick_ack(0x1234_5678));
        assert_eq!(events, vec![FrameEvent::QuickAck(0x1234_5678)]);
    }

    #[test]
    fn test_quick_ack_top_bit_masked() {
        let mut decoder = FrameDecoder::new(false);
        let events = decode_all(&mut decoder, &0xFFFF_FFFFu32.to_be_bytes());
        assert_eq!(events, vec![FrameEvent::QuickAck(0x7FFF_FFFF)]);
    }

    #[test]
    fn test_pipelined_frames_and_ack() {
        let a = encode_frame(&[1u8; 4], false, false).unwrap();
        let ack = encode_quick_ack(99);
        let b = encode_frame(&[2u8; 8], false, false).unwrap();
        let mut stream = Vec::new();
        stream.extend_from_slice(&a);
        stream.extend_from_slice(&ack);
        stream.extend_from_slice(&b);

        let mut decoder = FrameDecoder::new(false);
        let events = decode_all(&mut decoder, &stream);
        assert_eq!(
            events,
            vec![
                FrameEvent::Frame(vec![1u8; 4]),
                FrameEvent::QuickAck(99),
                FrameEvent::Frame(vec![2u8; 8]),
            ]
        );
    }

    #[test]
    fn test_split_at_every_boundary() {
        let payload: Vec<u8> = (0..32u8).map(|i| i.wrapping_mul(7)).collect();
        let encoded = encode_frame(&payload, false, false).unwrap();
        for split in 1..encoded.len() {
            let mut decoder = FrameDecoder::new(false);
            let mut events = Vec::new();
            decoder.feed(&encoded[..split], &mut events).unwrap();
            decoder.feed(&encoded[split..], &mut events).unwrap();
            assert_eq!(events, vec![FrameEvent::Frame(payload.clone())], "split {split}");
            assert_eq!(decoder.pending(), 0);
        }
    }

    #[test]
    fn test_oversized_frame_rejected() {
        // Declared length of 2 MiB + 4 bytes
        let quads = (MAX_FRAME_LEN / 4 + 1) as u32;
        let header = ((quads << 8) | 0x7f).to_le_bytes();
        let mut decoder = FrameDecoder::new(false);
        let mut events = Vec::new();
        assert!(matches!(
            decoder.feed(&header, &mut events),
            Err(FrameError::Oversized(_))
        ));
    }

    #[test]
    fn test_zero_length_frame_rejected() {
        let mut decoder = FrameDecoder::new(false);
        let mut events = Vec::new();
        assert!(matches!(decoder.feed(&[0u8], &mut events), Err(FrameError::Empty)));
    }

    #[test]
    fn test_progress_for_download_class_partial_frame() {
        let total = 1024usize;
        let mut payload = vec![0u8; total];
        let message_id = 0x0102_0304_0506_0708i64;
        payload[8..16].copy_from_slice(&message_id.to_le_bytes());
        let encoded = encode_frame(&payload, false, false).unwrap();

        let mut decoder = FrameDecoder::new(true);
        // One byte short of the threshold: no progress yet
        let header_len = encoded.len() - total;
        let cut = header_len + DOWNLOAD_PROGRESS_HEADER_LEN - 1;
        let mut events = Vec::new();
        decoder.feed(&encoded[..cut], &mut events).unwrap();
        assert!(events.is_empty());

        // Crossing the threshold reports progress
        decoder.feed(&encoded[cut..cut + 1], &mut events).unwrap();
        assert_eq!(
            events,
            vec![FrameEvent::Progress {
                message_id,
                received: DOWNLOAD_PROGRESS_HEADER_LEN as u32,
                total: total as u32,
            }]
        );

        // Completing the frame delivers it
        events.clear();
        decoder.feed(&encoded[cut + 1..], &mut events).unwrap();
        assert_eq!(events, vec![FrameEvent::Frame(payload)]);
    }

    #[test]
    fn test_no_progress_for_generic_class() {
        let payload = vec![0u8; 1024];
        let encoded = encode_frame(&payload, false, false).unwrap();
        let mut decoder = FrameDecoder::new(false);
        let mut events = Vec::new();
        decoder.feed(&encoded[..500], &mut events).unwrap();
        assert!(events.is_empty());
        assert_eq!(decoder.pending(), 500);
    }

    #[test]
    fn test_reset_drops_carry_over() {
        let encoded = encode_frame(&vec![0u8; 64], false, false).unwrap();
        let mut decoder = FrameDecoder::new(false);
        let mut events = Vec::new();
        decoder.feed(&encoded[..10], &mut events).unwrap();
        assert!(decoder.pending() > 0);
        decoder.reset();
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_encode_rejects_misaligned_and_oversized() {
        assert!(matches!(encode_frame(&[1, 2, 3], false, false), Err(FrameError::Misaligned(3))));
        assert!(matches!(encode_frame(&[], false, false), Err(FrameError::Misaligned(0))));
        let big = vec![0u8; MAX_FRAME_LEN + 4];
        assert!(matches!(encode_frame(&big, false, false), Err(FrameError::Oversized(_))));
    }

    proptest! {
        #[test]
        fn prop_round_trip_any_chunking(
            quads in 1usize..600,
            seed in any::<u64>(),
            splits in proptest::collection::vec(1usize..64, 0..8),
        ) {
            let payload: Vec<u8> = (0..quads * 4)
                .map(|i| (seed.wrapping_mul(i as u64 + 1) >> 3) as u8)
                .collect();
            let encoded = encode_frame(&payload, false, false).unwrap();

            let mut decoder = FrameDecoder::new(false);
            let mut events = Vec::new();
            let mut offset = 0usize;
            for split in splits {
                let end = (offset + split).min(encoded.len());
                decoder.feed(&encoded[offset..end], &mut events).unwrap();
                offset = end;
            }
            decoder.feed(&encoded[offset..], &mut events).unwrap();

            prop_assert_eq!(events, vec![FrameEvent::Frame(payload)]);
            prop_assert_eq!(decoder.pending(), 0);
        }
    }
}
