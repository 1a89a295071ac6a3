//! # PS/2 Keyboard Driver
//!
//! Handles PS/2 keyboard input via IRQ1 interrupt.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    IRQ1     ┌──────────────────┐
//! │  Keyboard   │────────────▶│ KeyboardHandler  │──▶ EOI to PIC
//! │  (Port 60)  │             └────────┬─────────┘
//! └─────────────┘                      │ store
//!                                      ▼
//!                             ┌──────────────────┐
//!                             │  ScanCodeCell    │◀── kernel polls
//!                             │  (one byte)      │
//!                             └──────────────────┘
//! ```
//!
//! ## Scancode Processing
//!
//! 1. IRQ1 handler reads the scancode from port 0x60
//! 2. The scancode replaces whatever the cell held
//! 3. A `.` is written to the console as a heartbeat
//! 4. EOI goes to the PIC when the handler's guard drops
//!
//! Scancodes are raw set-1 bytes (make codes, `0x80 | code` for breaks,
//! `0xE0` prefixes). Nothing here translates them to characters.
//!
//! The cell is a single slot. A consumer that does not poll between two
//! interrupts loses the first byte; [`ScanCodeCell::overruns`] counts how
//! often that happened.

use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use crate::arch::interrupts::pic::ChainedPics;
use crate::arch::io::PortIo;
use crate::devices::console::TextOutput;

pub const KEYBOARD_DATA_PORT: u16 = 0x60;

const PENDING: u16 = 1 << 8;

/// Latest scancode plus an "unread" flag, packed into one atomic word so
/// the handler publishes both at once.
pub struct ScanCodeCell {
    state: AtomicU16,
    overruns: AtomicU32,
}

impl ScanCodeCell {
    pub const fn new() -> Self {
        Self {
            state: AtomicU16::new(0),
            overruns: AtomicU32::new(0),
        }
    }

    /// Only the keyboard handler writes.
    pub(crate) fn store(&self, scancode: u8) {
        let previous = self.state.swap(PENDING | u16::from(scancode), Ordering::AcqRel);
        if previous & PENDING != 0 {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Most recent scancode, read or not. `0` before the first key.
    pub fn current(&self) -> u8 {
        self.state.load(Ordering::Acquire) as u8
    }

    pub fn is_available(&self) -> bool {
        self.state.load(Ordering::Acquire) & PENDING != 0
    }

    /// Consume the pending scancode, if one arrived since the last take.
    pub fn take(&self) -> Option<u8> {
        let previous = self.state.fetch_and(!PENDING, Ordering::AcqRel);
        (previous & PENDING != 0).then_some(previous as u8)
    }

    /// Scancodes overwritten before anyone took them.
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }
}

impl Default for ScanCodeCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Context the IRQ1 gate runs with: where scancodes go and which vector to
/// acknowledge.
pub struct KeyboardHandler<'a> {
    cell: &'a ScanCodeCell,
    vector: u8,
}

impl<'a> KeyboardHandler<'a> {
    pub fn new(cell: &'a ScanCodeCell, vector: u8) -> Self {
        Self { cell, vector }
    }

    pub fn vector(&self) -> u8 {
        self.vector
    }

    pub fn cell(&self) -> &'a ScanCodeCell {
        self.cell
    }

    /// Service one keyboard interrupt and return the scancode read.
    ///
    /// The EOI is owned by a guard taken before anything else, so it is
    /// sent whichever way this returns.
    pub fn service<P, Q, O>(&self, ports: &mut P, pics: &mut ChainedPics<Q>, output: &mut O) -> u8
    where
        P: PortIo,
        Q: PortIo,
        O: TextOutput,
    {
        let _eoi = pics.end_of_interrupt_on_drop(self.vector);

        let scancode = unsafe { ports.read_u8(KEYBOARD_DATA_PORT) };
        self.cell.store(scancode);
        output.write_char('.');

        scancode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::interrupts::pic::PicOffsets;
    use crate::testing::{RecordingOutput, SimulatedMachine};

    const A_MAKE: u8 = 0x1E;
    const A_BREAK: u8 = 0x9E;

    fn remapped_pics(machine: &SimulatedMachine) -> ChainedPics<SimulatedMachine> {
        let mut pics = ChainedPics::new(machine.clone());
        pics.remap(PicOffsets::DEFAULT);
        pics
    }

    #[test]
    fn fresh_cell_is_empty() {
        let cell = ScanCodeCell::new();
        assert_eq!(cell.current(), 0);
        assert!(!cell.is_available());
        assert_eq!(cell.take(), None);
        assert_eq!(cell.overruns(), 0);
    }

    #[test]
    fn a_key_is_stored_and_acknowledged_once() {
        let machine = SimulatedMachine::new();
        let mut pics = remapped_pics(&machine);
        let cell = ScanCodeCell::new();
        let handler = KeyboardHandler::new(&cell, 33);
        let mut output = RecordingOutput::default();

        machine.press(A_MAKE);
        let read = handler.service(&mut machine.clone(), &mut pics, &mut output);

        assert_eq!(read, A_MAKE);
        assert_eq!(cell.current(), A_MAKE);
        assert!(cell.is_available());
        let (master, slave) = machine.controllers();
        assert_eq!(master.eoi_count(), 1);
        assert_eq!(slave.eoi_count(), 0);
        assert_eq!(machine.reads_from(KEYBOARD_DATA_PORT), 1);
        assert_eq!(output.text(), ".");
    }

    #[test]
    fn second_scancode_overwrites_unread_first() {
        let machine = SimulatedMachine::new();
        let mut pics = remapped_pics(&machine);
        let cell = ScanCodeCell::new();
        let handler = KeyboardHandler::new(&cell, 33);
        let mut output = RecordingOutput::default();

        machine.press(A_MAKE);
        machine.press(A_BREAK);
        handler.service(&mut machine.clone(), &mut pics, &mut output);
        handler.service(&mut machine.clone(), &mut pics, &mut output);

        // Single slot, not a queue: the make code is gone.
        assert_eq!(cell.take(), Some(A_BREAK));
        assert_eq!(cell.take(), None);
        assert_eq!(cell.current(), A_BREAK);
        assert_eq!(cell.overruns(), 1);
        assert_eq!(machine.controllers().0.eoi_count(), 2);
        assert_eq!(output.text(), "..");
    }

    #[test]
    fn reading_between_interrupts_loses_nothing() {
        let machine = SimulatedMachine::new();
        let mut pics = remapped_pics(&machine);
        let cell = ScanCodeCell::new();
        let handler = KeyboardHandler::new(&cell, 33);
        let mut output = RecordingOutput::default();

        machine.press(A_MAKE);
        handler.service(&mut machine.clone(), &mut pics, &mut output);
        assert_eq!(cell.take(), Some(A_MAKE));

        machine.press(A_BREAK);
        handler.service(&mut machine.clone(), &mut pics, &mut output);
        assert_eq!(cell.take(), Some(A_BREAK));
        assert_eq!(cell.overruns(), 0);
    }

    #[test]
    fn take_clears_flag_but_keeps_value() {
        let cell = ScanCodeCell::new();
        cell.store(0x2A);
        assert_eq!(cell.take(), Some(0x2A));
        assert!(!cell.is_available());
        assert_eq!(cell.current(), 0x2A);
    }

    #[test]
    fn zero_scancode_is_still_a_scancode() {
        let cell = ScanCodeCell::new();
        cell.store(0x00);
        assert!(cell.is_available());
        assert_eq!(cell.take(), Some(0x00));
    }
}
