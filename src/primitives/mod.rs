pub mod crc;
pub mod demo_data;
pub mod escape;

pub use crc::crc16;
pub use escape::{escape_into, escape_to_vec, unescape_into, unescape_to_vec, DELIMITER};
