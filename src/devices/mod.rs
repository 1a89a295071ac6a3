//! Device Subsystem
//!
//! - `drivers`: PS/2 keyboard
//! - `console`: text output sink

pub mod console;
pub mod drivers;
