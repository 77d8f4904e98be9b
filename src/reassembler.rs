//! Turns a TCP byte stream into a sequence of complete frames.
//!
//! TCP delivers bytes, not messages: one `read` may land mid-frame, exactly
//! on a frame boundary, or across several frames plus a trailing partial
//! one. [`Reassembler::feed`] absorbs whatever arrived and yields a decode
//! result for every frame it could fully extract, re-synchronizing on the
//! `0xC0` delimiter rather than relying on a length prefix the wire format
//! doesn't have.

use tracing::{debug, warn};

use crate::error::LinkResult;
use crate::packet::{frame, DataTable};
use crate::primitives::DELIMITER;

/// Must be at least twice the maximum frame size so one oversized feed can't
/// force a drop mid-frame under normal operation.
pub const RX_CAP: usize = 4096;

pub struct Reassembler {
    buf: Vec<u8>,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(RX_CAP),
        }
    }

    /// Appends `bytes` and extracts every complete frame now available.
    /// Each element is the frame codec's verdict on one delimited slice:
    /// `Ok` for a frame that decoded cleanly, `Err` for one that didn't
    /// (bad CRC, bad escape, truncated header). A malformed frame only
    /// costs its own bytes — extraction continues past it.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<LinkResult<DataTable>> {
        if self.buf.len() + bytes.len() > RX_CAP {
            warn!(
                buffered = self.buf.len(),
                incoming = bytes.len(),
                "reassembler buffer would overflow, discarding buffered bytes"
            );
            self.buf.clear();
        }
        self.buf.extend_from_slice(bytes);

        let mut frames = Vec::new();
        loop {
            let Some(start) = self.buf.iter().position(|&b| b == DELIMITER) else {
                // pure noise: nothing to resync on
                if !self.buf.is_empty() {
                    debug!(dropped = self.buf.len(), "discarding prefix noise");
                }
                self.buf.clear();
                break;
            };

            let Some(end_rel) = self.buf[start + 1..].iter().position(|&b| b == DELIMITER) else {
                // frame start seen, no end yet: keep it for the next feed
                if start > 0 {
                    self.buf.drain(0..start);
                }
                break;
            };
            let end = start + 1 + end_rel;

            let candidate = &self.buf[start..=end];
            frames.push(frame::decode(candidate));
            self.buf.drain(0..=end);
        }
        frames
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::LinkError;
    use crate::packet::{DeviceId, ObjectId, Operation};

    fn table(object_id: ObjectId, content: Vec<u8>) -> DataTable {
        let sender = DeviceId::new(0x01AD24, 0x0002, 0x0100).unwrap();
        DataTable::new(
            sender,
            DeviceId::zeroed(),
            Operation::Upload,
            object_id,
            content,
        )
        .unwrap()
    }

    #[test]
    fn single_frame_in_one_feed() {
        let wire = frame::encode(&table(ObjectId::COMMUNICATION, vec![])).unwrap();
        let mut r = Reassembler::new();
        let out = r.feed(&wire);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_ok());
    }

    #[test]
    fn adjacent_double_frame_yields_both_in_order() {
        let a = frame::encode(&table(ObjectId::COMMUNICATION, vec![])).unwrap();
        let b = frame::encode(&table(ObjectId::TRAFFIC_REALTIME, vec![0u8; 12])).unwrap();
        let mut combined = a.clone();
        combined.extend_from_slice(&b);

        let mut r = Reassembler::new();
        let out = r.feed(&combined);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap().object_id, ObjectId::COMMUNICATION.0);
        assert_eq!(
            out[1].as_ref().unwrap().object_id,
            ObjectId::TRAFFIC_REALTIME.0
        );
    }

    #[test]
    fn split_frame_across_two_feeds() {
        let wire = frame::encode(&table(ObjectId::COMMUNICATION, vec![])).unwrap();
        let mid = wire.len() / 2;
        let mut r = Reassembler::new();

        assert!(r.feed(&wire[..mid]).is_empty());
        let out = r.feed(&wire[mid..]);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_ok());
    }

    #[test]
    fn noise_prefix_is_discarded() {
        let wire = frame::encode(&table(ObjectId::COMMUNICATION, vec![])).unwrap();
        let mut combined = vec![0xFF, 0xAA, 0x55, 0x88, 0x12, 0x34, 0x56, 0xAB, 0xCD, 0xEF];
        combined.extend_from_slice(&wire);

        let mut r = Reassembler::new();
        let out = r.feed(&combined);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_ok());
    }

    #[test]
    fn bad_crc_then_good_frame() {
        let good = frame::encode(&table(ObjectId::COMMUNICATION, vec![])).unwrap();
        let mut corrupted = good.clone();
        let last = corrupted.len() - 1;
        corrupted[last - 1] ^= 0xFF;
        corrupted[last - 2] ^= 0xFF;

        let mut combined = corrupted;
        combined.extend_from_slice(&good);

        let mut r = Reassembler::new();
        let out = r.feed(&combined);
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], Err(LinkError::Crc { .. })));
        assert!(out[1].is_ok());
    }

    #[test]
    fn oversized_noise_clears_the_buffer_without_poisoning_later_frames() {
        let mut r = Reassembler::new();
        let noise = vec![0x41u8; RX_CAP + 1];
        assert!(r.feed(&noise).is_empty());

        let wire = frame::encode(&table(ObjectId::COMMUNICATION, vec![])).unwrap();
        let out = r.feed(&wire);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_ok());
    }
}
