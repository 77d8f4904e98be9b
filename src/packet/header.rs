//! Serialization of the data-table header and content, in the little-endian
//! octet order the wire format specifies. CRC and framing live one layer up,
//! in [`super::frame`].

use crate::error::{LinkError, LinkResult};

use super::types::DataTable;
use super::DeviceId;

/// `link_addr` (2) + two `DeviceId`s (7 each) + `protocol_version` (1) +
/// `operation` (1) + `object_id` (2).
pub const HEADER_LEN: usize = 20;

fn encode_device_id(id: &DeviceId, out: &mut Vec<u8>) {
    out.extend_from_slice(&id.admin_code.to_le_bytes()[..3]);
    out.extend_from_slice(&id.device_type.to_le_bytes());
    out.extend_from_slice(&id.device_id.to_le_bytes());
}

fn decode_device_id(bytes: &[u8]) -> DeviceId {
    let admin_code = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
    let device_type = u16::from_le_bytes([bytes[3], bytes[4]]);
    let device_id = u16::from_le_bytes([bytes[5], bytes[6]]);
    DeviceId {
        admin_code,
        device_type,
        device_id,
    }
}

/// Appends the header and content of `table` to `out`. Infallible: every
/// field already fits its wire width by construction.
pub fn encode(table: &DataTable, out: &mut Vec<u8>) {
    out.extend_from_slice(&table.link_addr.to_le_bytes());
    encode_device_id(&table.sender, out);
    encode_device_id(&table.receiver, out);
    out.push(table.protocol_version);
    out.push(table.operation);
    out.extend_from_slice(&table.object_id.to_le_bytes());
    out.extend_from_slice(&table.content);
}

/// Parses the fixed header out of `bytes` and takes ownership of everything
/// past it as `content`. Callers (the frame codec) are responsible for
/// having already stripped the trailing CRC.
pub fn decode(bytes: &[u8]) -> LinkResult<DataTable> {
    if bytes.len() < HEADER_LEN {
        return Err(LinkError::Incomplete);
    }

    let link_addr = u16::from_le_bytes([bytes[0], bytes[1]]);
    let sender = decode_device_id(&bytes[2..9]);
    let receiver = decode_device_id(&bytes[9..16]);
    let protocol_version = bytes[16];
    let operation = bytes[17];
    let object_id = u16::from_le_bytes([bytes[18], bytes[19]]);
    let content = bytes[HEADER_LEN..].to_vec();

    Ok(DataTable {
        link_addr,
        sender,
        receiver,
        protocol_version,
        operation,
        object_id,
        content,
    })
}
