//! Turns a decoded [`DataTable`] into a [`Message`] the event loops can match
//! on, instead of every caller re-deriving operation/object-id meaning from
//! raw wire bytes. Also holds the two places that produce an `ERROR_RESP`
//! code: structural decode failures ([`error_code_for`]) and session-level
//! field validation ([`validate_session_fields`]).

use crate::error::LinkError;
use crate::packet::{DataTable, ObjectId, Operation, PROTOCOL_VERSION};

/// The session-level meaning of an incoming frame. `Unknown` covers any
/// operation/object-id pair the session core doesn't act on — those are
/// logged and otherwise ignored, per the wire contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Handshake,
    HandshakeAck,
    HeartbeatQuery,
    HeartbeatResponse,
    RealtimeUpload(Vec<u8>),
    StatisticsUpload(Vec<u8>),
    StatisticsAck,
    DetectorStatusUpload(Vec<u8>),
    DetectorStatusAck,
    ErrorReport(u8),
    Unknown { operation: u8, object_id: u16 },
}

pub fn classify(dt: &DataTable) -> Message {
    let op = Operation::try_from(dt.operation);
    let obj = dt.object_id;

    match (op, obj) {
        (Ok(Operation::SetReq), o) if o == ObjectId::COMMUNICATION.0 => Message::Handshake,
        (Ok(Operation::SetResp), o) if o == ObjectId::COMMUNICATION.0 => Message::HandshakeAck,
        (Ok(Operation::QueryReq), o) if o == ObjectId::COMMUNICATION.0 => Message::HeartbeatQuery,
        (Ok(Operation::QueryResp), o) if o == ObjectId::COMMUNICATION.0 => {
            Message::HeartbeatResponse
        }
        (Ok(Operation::Upload), o) if o == ObjectId::TRAFFIC_REALTIME.0 => {
            Message::RealtimeUpload(dt.content.clone())
        }
        (Ok(Operation::Upload), o) if o == ObjectId::TRAFFIC_STATS.0 => {
            Message::StatisticsUpload(dt.content.clone())
        }
        (Ok(Operation::UploadResp), o) if o == ObjectId::TRAFFIC_STATS.0 => {
            Message::StatisticsAck
        }
        (Ok(Operation::Upload), o) if o == ObjectId::DETECTOR_STATUS.0 => {
            Message::DetectorStatusUpload(dt.content.clone())
        }
        (Ok(Operation::UploadResp), o) if o == ObjectId::DETECTOR_STATUS.0 => {
            Message::DetectorStatusAck
        }
        (Ok(Operation::ErrorResp), o) if o == ObjectId::ERROR.0 => {
            Message::ErrorReport(dt.content.first().copied().unwrap_or(0))
        }
        _ => Message::Unknown {
            operation: dt.operation,
            object_id: dt.object_id,
        },
    }
}

/// Session-level field validation, run only on frames that already decoded
/// structurally. Returns the `ERROR_RESP` code for the first field found
/// invalid, per the wire contract's §4.5 table (codes 4-7).
pub fn validate_session_fields(dt: &DataTable) -> Result<(), u8> {
    if dt.link_addr != 0x0000 {
        return Err(4);
    }
    if dt.protocol_version != PROTOCOL_VERSION {
        return Err(5);
    }
    if Operation::try_from(dt.operation).is_err() {
        return Err(6);
    }
    let known = [
        ObjectId::ERROR.0,
        ObjectId::COMMUNICATION.0,
        ObjectId::DETECTOR_STATUS.0,
        ObjectId::TRAFFIC_REALTIME.0,
        ObjectId::TRAFFIC_STATS.0,
    ];
    if !known.contains(&dt.object_id) {
        return Err(7);
    }
    Ok(())
}

/// Maps a structural decode failure to the `ERROR_RESP` code table (codes
/// 1-3 and the catch-all 128). Session-field errors (4-7) are produced
/// separately by [`validate_session_fields`], since they require a
/// successfully decoded `DataTable` to inspect.
pub fn error_code_for(err: &LinkError) -> u8 {
    match err {
        LinkError::FormatStart => 1,
        LinkError::FormatEnd => 2,
        LinkError::Crc { .. } => 3,
        _ => 128,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::packet::DeviceId;

    fn table(operation: Operation, object_id: ObjectId, content: Vec<u8>) -> DataTable {
        DataTable::new(
            DeviceId::new(0x01AD24, 0x0002, 0x0100).unwrap(),
            DeviceId::zeroed(),
            operation,
            object_id,
            content,
        )
        .unwrap()
    }

    #[test]
    fn handshake_classifies_correctly() {
        let dt = table(Operation::SetReq, ObjectId::COMMUNICATION, vec![]);
        assert_eq!(classify(&dt), Message::Handshake);
    }

    #[test]
    fn realtime_upload_carries_its_content() {
        let dt = table(Operation::Upload, ObjectId::TRAFFIC_REALTIME, vec![1, 2, 3]);
        assert_eq!(classify(&dt), Message::RealtimeUpload(vec![1, 2, 3]));
    }

    #[test]
    fn unrecognized_object_id_is_unknown() {
        let mut dt = table(Operation::Upload, ObjectId::TRAFFIC_REALTIME, vec![]);
        dt.object_id = 0x9999;
        assert_eq!(
            classify(&dt),
            Message::Unknown {
                operation: Operation::Upload.to_wire(),
                object_id: 0x9999
            }
        );
    }

    #[test]
    fn validate_rejects_nonzero_link_addr() {
        let mut dt = table(Operation::SetReq, ObjectId::COMMUNICATION, vec![]);
        dt.link_addr = 1;
        assert_eq!(validate_session_fields(&dt), Err(4));
    }

    #[test]
    fn validate_rejects_wrong_protocol_version() {
        let mut dt = table(Operation::SetReq, ObjectId::COMMUNICATION, vec![]);
        dt.protocol_version = 0x20;
        assert_eq!(validate_session_fields(&dt), Err(5));
    }

    #[test]
    fn validate_rejects_unknown_operation() {
        let mut dt = table(Operation::SetReq, ObjectId::COMMUNICATION, vec![]);
        dt.operation = 0xFF;
        assert_eq!(validate_session_fields(&dt), Err(6));
    }

    #[test]
    fn validate_rejects_unknown_object_id() {
        let mut dt = table(Operation::SetReq, ObjectId::COMMUNICATION, vec![]);
        dt.object_id = 0x9999;
        assert_eq!(validate_session_fields(&dt), Err(7));
    }

    #[test]
    fn validate_accepts_a_well_formed_handshake() {
        let dt = table(Operation::SetReq, ObjectId::COMMUNICATION, vec![]);
        assert_eq!(validate_session_fields(&dt), Ok(()));
    }

    #[test]
    fn error_codes_match_the_structural_taxonomy() {
        assert_eq!(error_code_for(&LinkError::FormatStart), 1);
        assert_eq!(error_code_for(&LinkError::FormatEnd), 2);
        assert_eq!(
            error_code_for(&LinkError::Crc {
                expected: 0,
                actual: 1
            }),
            3
        );
        assert_eq!(error_code_for(&LinkError::Incomplete), 128);
        assert_eq!(error_code_for(&LinkError::Escape), 128);
    }
}
