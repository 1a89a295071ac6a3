//! # Interrupt Handling Module
//!
//! Brings the interrupt machinery online:
//!
//! - **PIC**: 8259 remapping, line masking and EOI
//! - **IDT**: the 256-entry descriptor table and its validating builder
//! - **Setup**: the one-shot sequence that wires both together
//! - **Handlers**: keyboard IRQ trampoline and CPU exception handlers
//!
//! ## Interrupt Vector Layout
//!
//! | Vector | Type                   | Handler                    |
//! |--------|------------------------|----------------------------|
//! | 0      | Divide error           | divide_error_handler       |
//! | 3      | Breakpoint             | breakpoint_handler         |
//! | 6      | Invalid opcode         | invalid_opcode_handler     |
//! | 8      | Double fault           | double_fault_handler       |
//! | 13     | General protection     | general_protection_fault_handler |
//! | 14     | Page fault             | page_fault_handler         |
//! | 33     | Keyboard (IRQ1)        | keyboard_interrupt_handler |
//!
//! Every other vector is left not-present, and every other IRQ line stays
//! masked.
//!
//! ## Usage
//!
//! ```ignore
//! static SCAN_CODE: ScanCodeCell = ScanCodeCell::new();
//!
//! kernel64::arch::interrupts::initialize(&SCAN_CODE)?;
//! ```

use core::fmt;

use spin::Mutex;
use x86_64::instructions::interrupts::without_interrupts;

use crate::arch::io::HardwarePorts;
use crate::devices::drivers::ps2_keyboard::ScanCodeCell;

pub mod idt;
pub mod interrupts;
pub mod pic;
pub mod setup;

pub use idt::{GateAttributes, GateType, IdtBuilder, IdtEntry, InterruptDescriptorTable};
pub use pic::{ChainedPics, Irq, PicOffsets, PIC_1_OFFSET, PIC_2_OFFSET};
pub use setup::{Cpu, InterruptSetup, InterruptState, X86Cpu};

pub static PICS: Mutex<ChainedPics<HardwarePorts>> = Mutex::new(ChainedPics::new(HardwarePorts));

static STATE: InterruptState = InterruptState::new();

/// Everything that can be rejected before the hardware is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptError {
    /// PIC base below 32 or not a multiple of 8.
    InvalidOffset(u8),
    OverlappingOffsets { master: u8, slave: u8 },
    /// A vector that must be able to fire has no present gate.
    MissingHandler(u8),
    /// Gates would point at the null segment.
    NullSelector,
    AlreadyInitialized,
}

impl fmt::Display for InterruptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterruptError::InvalidOffset(offset) => {
                write!(f, "PIC offset {} collides with CPU exceptions or is unaligned", offset)
            }
            InterruptError::OverlappingOffsets { master, slave } => {
                write!(f, "PIC offsets overlap (master {}, slave {})", master, slave)
            }
            InterruptError::MissingHandler(vector) => {
                write!(f, "vector {} has no present handler", vector)
            }
            InterruptError::NullSelector => write!(f, "IDT gates would use the null selector"),
            InterruptError::AlreadyInitialized => write!(f, "interrupts already initialized"),
        }
    }
}

/// Remap the PIC, install the IDT with the keyboard handler writing into
/// `scan_codes`, unmask IRQ1 and enable interrupts.
///
/// Call exactly once during boot, after the console is ready.
pub fn initialize(scan_codes: &'static ScanCodeCell) -> Result<(), InterruptError> {
    let idt = InterruptSetup::new(&PICS, X86Cpu, interrupts::keyboard_interrupt_handler)
        .run(&STATE, scan_codes)?;
    crate::serial_println!(
        "[interrupts] online, {} vectors present",
        idt.present_vectors().count()
    );
    Ok(())
}

/// Mask or unmask one IRQ line from kernel context.
pub fn set_irq_enabled(irq: Irq, enabled: bool) {
    without_interrupts(|| PICS.lock().set_mask(irq, enabled));
}

pub(crate) fn state() -> &'static InterruptState {
    &STATE
}
