use crate::error::{LinkError, LinkResult};
use crate::wire_code;

/// A stable identifier for either endpoint on the link.
///
/// `admin_code` is a 24-bit field; callers must go through [`DeviceId::new`]
/// to get the range check, but the fields stay public since both the codec
/// and the demo binaries construct these directly from known-good CLI input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId {
    pub admin_code: u32,
    pub device_type: u16,
    pub device_id: u16,
}

impl DeviceId {
    pub const MAX_ADMIN_CODE: u32 = 0x00FF_FFFF;

    pub fn new(admin_code: u32, device_type: u16, device_id: u16) -> LinkResult<Self> {
        if admin_code > Self::MAX_ADMIN_CODE {
            return Err(LinkError::InvalidParam("admin_code exceeds 24 bits"));
        }
        Ok(Self {
            admin_code,
            device_type,
            device_id,
        })
    }

    pub const fn zeroed() -> Self {
        Self {
            admin_code: 0,
            device_type: 0,
            device_id: 0,
        }
    }

    /// The low byte of `device_type`, which names the physical sensor kind.
    pub fn kind(&self) -> Option<DeviceKind> {
        DeviceKind::try_from((self.device_type & 0xFF) as u8).ok()
    }
}

wire_code! {
    pub enum DeviceKind: u8 {
        SignalController = 0x01,
        InductiveLoop = 0x02,
        Magnetic = 0x03,
        Ultrasonic = 0x04,
        Video = 0x05,
        Microwave = 0x06,
        Radar = 0x07,
        Rfid = 0x08,
    }
}

wire_code! {
    /// Constructors for the operation byte of an outgoing [`super::DataTable`].
    /// Incoming frames carry the raw byte in `DataTable::operation` instead,
    /// since an unrecognized value is a session-level concern
    /// (see [`crate::session::classify`]), not a framing failure.
    pub enum Operation: u8 {
        QueryReq = 0x80,
        SetReq = 0x81,
        Upload = 0x82,
        QueryResp = 0x83,
        SetResp = 0x84,
        UploadResp = 0x85,
        ErrorResp = 0x86,
    }
}

/// A 16-bit object identifier naming the semantic category of a payload.
/// Modeled as a newtype with known constants rather than a closed enum,
/// since the wire format permits (and the session core must tolerate)
/// object identifiers it doesn't recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectId(pub u16);

impl ObjectId {
    pub const ERROR: ObjectId = ObjectId(0x0000);
    pub const COMMUNICATION: ObjectId = ObjectId(0x0101);
    pub const DETECTOR_STATUS: ObjectId = ObjectId(0x0205);
    pub const TRAFFIC_REALTIME: ObjectId = ObjectId(0x0301);
    pub const TRAFFIC_STATS: ObjectId = ObjectId(0x0302);
}

pub const PROTOCOL_VERSION: u8 = 0x10;
pub const MAX_CONTENT_LEN: usize = 1500;

/// The logical message a [`super::Frame`] carries: a fixed header plus an
/// opaque content payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTable {
    pub link_addr: u16,
    pub sender: DeviceId,
    pub receiver: DeviceId,
    pub protocol_version: u8,
    pub operation: u8,
    pub object_id: u16,
    pub content: Vec<u8>,
}

impl DataTable {
    pub fn new(
        sender: DeviceId,
        receiver: DeviceId,
        operation: Operation,
        object_id: ObjectId,
        content: Vec<u8>,
    ) -> LinkResult<Self> {
        if content.len() > MAX_CONTENT_LEN {
            return Err(LinkError::InvalidParam("content exceeds 1500 bytes"));
        }
        Ok(Self {
            link_addr: 0x0000,
            sender,
            receiver,
            protocol_version: PROTOCOL_VERSION,
            operation: operation.to_wire(),
            object_id: object_id.0,
            content,
        })
    }
}
