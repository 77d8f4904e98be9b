//! The on-wire frame: one start delimiter, the byte-stuffed data table plus
//! its CRC, one end delimiter.

use crate::error::{LinkError, LinkResult};
use crate::primitives::{crc16, escape_to_vec, unescape_to_vec, DELIMITER};

use super::header;
use super::types::{DataTable, MAX_CONTENT_LEN};

/// Unescaped frames (header + content + CRC) may not exceed this. The
/// content cap of 1500 bytes plus the 20-byte header and 2-byte CRC leaves
/// comfortable headroom under it.
pub const MAX_UNESCAPED_FRAME: usize = 2048;

const CRC_LEN: usize = 2;

/// Encodes `table` as a complete wire frame: `0xC0`, the escaped
/// `header | content | CRC`, `0xC0`.
pub fn encode(table: &DataTable) -> LinkResult<Vec<u8>> {
    let mut unescaped = Vec::with_capacity(header::HEADER_LEN + table.content.len() + CRC_LEN);
    header::encode(table, &mut unescaped);

    if unescaped.len() + CRC_LEN > MAX_UNESCAPED_FRAME {
        return Err(LinkError::Oversize);
    }

    let crc = crc16(&unescaped);
    unescaped.extend_from_slice(&crc.to_le_bytes());

    let mut framed = Vec::with_capacity(unescaped.len() * 2 + 2);
    framed.push(DELIMITER);
    framed.extend(escape_to_vec(&unescaped));
    framed.push(DELIMITER);
    Ok(framed)
}

/// Decodes a complete wire frame — including both delimiters — into a
/// [`DataTable`]. `candidate` is expected to be exactly one frame, as
/// produced by [`crate::reassembler::Reassembler`].
pub fn decode(candidate: &[u8]) -> LinkResult<DataTable> {
    if candidate.first() != Some(&DELIMITER) {
        return Err(LinkError::FormatStart);
    }
    if candidate.last() != Some(&DELIMITER) || candidate.len() < 2 {
        return Err(LinkError::FormatEnd);
    }

    let interior = &candidate[1..candidate.len() - 1];
    let unescaped = unescape_to_vec(interior)?;

    if unescaped.len() > MAX_UNESCAPED_FRAME {
        return Err(LinkError::Oversize);
    }
    if unescaped.len() < header::HEADER_LEN + CRC_LEN {
        return Err(LinkError::Incomplete);
    }

    let (body, crc_bytes) = unescaped.split_at(unescaped.len() - CRC_LEN);
    let expected = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    let actual = crc16(body);
    if expected != actual {
        return Err(LinkError::Crc { expected, actual });
    }

    let content_len = body.len() - header::HEADER_LEN;
    if content_len > MAX_CONTENT_LEN {
        return Err(LinkError::ContentOversize(content_len));
    }

    header::decode(body)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::packet::{DeviceId, ObjectId, Operation};

    fn handshake_table() -> DataTable {
        let sender = DeviceId::new(0x01AD24, 0x0002, 0x0100).unwrap();
        DataTable::new(
            sender,
            DeviceId::zeroed(),
            Operation::SetReq,
            ObjectId::COMMUNICATION,
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn single_frame_round_trips() {
        let table = handshake_table();
        let wire = encode(&table).unwrap();

        assert_eq!(wire.first(), Some(&DELIMITER));
        assert_eq!(wire.last(), Some(&DELIMITER));

        let decoded = decode(&wire).unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn crc_bytes_sit_immediately_before_the_trailing_delimiter() {
        let table = handshake_table();
        let wire = encode(&table).unwrap();

        let mut unescaped = Vec::new();
        header::encode(&table, &mut unescaped);
        let crc = crc16(&unescaped).to_le_bytes();

        // no escapes are triggered by this particular table, so the
        // unescaped and on-wire interiors coincide.
        assert_eq!(&wire[wire.len() - 3..wire.len() - 1], &crc);
    }

    #[test]
    fn content_round_trips_with_delimiter_and_escape_bytes_inside() {
        let sender = DeviceId::new(0x01AD24, 0x0002, 0x0100).unwrap();
        let table = DataTable::new(
            sender,
            DeviceId::zeroed(),
            Operation::Upload,
            ObjectId::TRAFFIC_REALTIME,
            vec![0xC0, 0xDB, 0x00, 0xC0, 0xDB, 0xDB, 0xC0],
        )
        .unwrap();

        let wire = encode(&table).unwrap();
        let decoded = decode(&wire).unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn missing_start_delimiter_is_rejected() {
        let mut wire = encode(&handshake_table()).unwrap();
        wire[0] = 0x00;
        assert_eq!(decode(&wire), Err(LinkError::FormatStart));
    }

    #[test]
    fn missing_end_delimiter_is_rejected() {
        let mut wire = encode(&handshake_table()).unwrap();
        let last = wire.len() - 1;
        wire[last] = 0x00;
        assert_eq!(decode(&wire), Err(LinkError::FormatEnd));
    }

    #[test]
    fn corrupted_crc_is_rejected() {
        let mut wire = encode(&handshake_table()).unwrap();
        let last = wire.len() - 1;
        wire[last - 1] ^= 0xFF;
        wire[last - 2] ^= 0xFF;
        assert!(matches!(decode(&wire), Err(LinkError::Crc { .. })));
    }

    #[test]
    fn truncated_frame_is_incomplete() {
        let wire = vec![DELIMITER, 0x01, 0x02, DELIMITER];
        assert_eq!(decode(&wire), Err(LinkError::Incomplete));
    }

    #[test]
    fn content_over_1500_bytes_is_rejected_even_within_the_unescaped_cap() {
        // DataTable::new already refuses to build this; forge the wire bytes
        // directly to exercise decode()'s own content-length check, the way
        // a misbehaving or malicious peer could.
        let table = DataTable {
            link_addr: 0,
            sender: DeviceId::zeroed(),
            receiver: DeviceId::zeroed(),
            protocol_version: crate::packet::PROTOCOL_VERSION,
            operation: Operation::Upload.to_wire(),
            object_id: ObjectId::TRAFFIC_REALTIME.0,
            content: vec![0x41; 1600],
        };

        let mut unescaped = Vec::new();
        header::encode(&table, &mut unescaped);
        assert!(unescaped.len() + CRC_LEN <= MAX_UNESCAPED_FRAME);
        let crc = crc16(&unescaped);
        unescaped.extend_from_slice(&crc.to_le_bytes());

        let mut wire = Vec::new();
        wire.push(DELIMITER);
        wire.extend(crate::primitives::escape_to_vec(&unescaped));
        wire.push(DELIMITER);

        assert_eq!(decode(&wire), Err(LinkError::ContentOversize(1600)));
    }
}
