//! GB/T 43229-2023 link layer: wire codec, stream reassembly, and the
//! session state machine shared by the signal controller (server) and
//! vehicle detector (client) roles.

pub mod error;
pub mod macros;
pub mod logging;
pub mod packet;
pub mod primitives;
pub mod reassembler;
pub mod session;
pub mod shutdown;

pub use error::{LinkError, LinkResult};
