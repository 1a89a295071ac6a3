//! Text output used as a diagnostic sink.
//!
//! The rest of the kernel only needs [`TextOutput`]. [`SerialConsole`] is
//! the implementation shipped with the kernel: it renders the sixteen VGA
//! text colors as ANSI escapes on COM1, so the QEMU serial window looks like
//! the text console would.

use core::fmt;

/// The VGA text-mode palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

impl Color {
    /// ANSI SGR foreground code (30-37, 90-97).
    pub fn ansi_foreground(self) -> u8 {
        // VGA puts red at bit 2, ANSI at bit 0.
        let vga = self as u8;
        let ansi = ((vga & 0b001) << 2) | (vga & 0b010) | ((vga & 0b100) >> 2);
        if vga & 0b1000 != 0 {
            90 + ansi
        } else {
            30 + ansi
        }
    }

    pub fn ansi_background(self) -> u8 {
        self.ansi_foreground() + 10
    }
}

/// Console operations the interrupt layer consumes. Nothing is returned;
/// output is best effort.
pub trait TextOutput {
    fn set_color(&mut self, foreground: Color, background: Color);

    fn clear_screen(&mut self);

    fn write_string(&mut self, text: &str) {
        text.chars().for_each(|c| self.write_char(c));
    }

    fn write_char(&mut self, c: char);
}

/// [`TextOutput`] over the COM1 UART.
#[derive(Debug, Clone, Copy)]
pub struct SerialConsole {
    blocking: bool,
}

impl SerialConsole {
    pub const fn new() -> Self {
        Self { blocking: true }
    }

    /// A console that drops output instead of waiting for the port lock.
    /// The only kind an interrupt handler may use.
    pub const fn interrupt_safe() -> Self {
        Self { blocking: false }
    }

    fn emit(&self, args: fmt::Arguments) {
        if self.blocking {
            crate::serial::_print(args);
        } else {
            crate::serial::try_print(args);
        }
    }
}

impl Default for SerialConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl TextOutput for SerialConsole {
    fn set_color(&mut self, foreground: Color, background: Color) {
        self.emit(format_args!(
            "\x1b[{};{}m",
            foreground.ansi_foreground(),
            background.ansi_background()
        ));
    }

    fn clear_screen(&mut self) {
        self.emit(format_args!("\x1b[2J\x1b[H"));
    }

    fn write_string(&mut self, text: &str) {
        self.emit(format_args!("{}", text));
    }

    fn write_char(&mut self, c: char) {
        self.emit(format_args!("{}", c));
    }
}
