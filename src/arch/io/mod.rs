//! Hardware I/O primitives.

pub mod port;

pub use port::{read_port, write_port, HardwarePorts, PortIo};
