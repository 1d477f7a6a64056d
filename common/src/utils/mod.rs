pub mod buffer;
pub mod checksum;

pub use buffer::DatagramBuffer;
pub use checksum::{calculate_checksum, calculate_checksum_parts};
