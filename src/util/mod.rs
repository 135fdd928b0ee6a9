//! Small helpers shared across packagers: checksums and architecture name
//! mapping tables.

pub mod archmap;
pub mod checksum;
