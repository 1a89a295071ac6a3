//! Device Drivers
//!
//! - PS/2 Keyboard (IRQ1)

pub mod ps2_keyboard;

pub use ps2_keyboard::{KeyboardHandler, ScanCodeCell, KEYBOARD_DATA_PORT};
