pub mod frame;
pub mod header;
pub mod types;

pub use types::{DataTable, DeviceId, DeviceKind, ObjectId, Operation, MAX_CONTENT_LEN, PROTOCOL_VERSION};
