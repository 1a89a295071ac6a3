//! One-shot interrupt bring-up.
//!
//! The order is fixed: remap the PIC, load the IDT, unmask the keyboard,
//! enable interrupts. Anything that can be validated (offsets, selector,
//! required gates) is checked before the first port write.

use spin::{Mutex, Once};
use x86_64::instructions::segmentation::{Segment, CS};
use x86_64::structures::gdt::SegmentSelector;
use x86_64::structures::idt::HandlerFunc;

use crate::arch::interrupts::idt::{IdtBuilder, InterruptDescriptorTable};
use crate::arch::interrupts::interrupts::register_exception_handlers;
use crate::arch::interrupts::pic::{ChainedPics, Irq, PicOffsets};
use crate::arch::interrupts::InterruptError;
use crate::arch::io::PortIo;
use crate::devices::drivers::ps2_keyboard::{KeyboardHandler, ScanCodeCell};
use crate::serial_println;

/// The processor-side operations the setup sequence needs.
pub trait Cpu {
    /// Selector every gate jumps through.
    fn code_selector(&self) -> SegmentSelector;

    /// # Safety
    ///
    /// Every vector that can fire must be present in `idt`.
    unsafe fn load_idt(&mut self, idt: &'static InterruptDescriptorTable);

    fn enable_interrupts(&mut self);
}

/// The executing processor.
#[derive(Debug, Default, Clone, Copy)]
pub struct X86Cpu;

impl Cpu for X86Cpu {
    fn code_selector(&self) -> SegmentSelector {
        CS::get_reg()
    }

    unsafe fn load_idt(&mut self, idt: &'static InterruptDescriptorTable) {
        idt.load();
    }

    fn enable_interrupts(&mut self) {
        x86_64::instructions::interrupts::enable();
    }
}

/// What the setup leaves behind: the loaded table and the keyboard
/// handler's context. Both are written once.
pub struct InterruptState {
    idt: Once<InterruptDescriptorTable>,
    keyboard: Once<KeyboardHandler<'static>>,
}

impl InterruptState {
    pub const fn new() -> Self {
        Self {
            idt: Once::new(),
            keyboard: Once::new(),
        }
    }

    pub fn idt(&self) -> Option<&InterruptDescriptorTable> {
        self.idt.get()
    }

    pub fn keyboard(&self) -> Option<&KeyboardHandler<'static>> {
        self.keyboard.get()
    }
}

impl Default for InterruptState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InterruptSetup<'a, P: PortIo, C: Cpu> {
    pics: &'a Mutex<ChainedPics<P>>,
    cpu: C,
    offsets: PicOffsets,
    keyboard_entry: HandlerFunc,
}

impl<'a, P: PortIo, C: Cpu> InterruptSetup<'a, P, C> {
    /// `keyboard_entry` is the gate installed for IRQ1.
    pub fn new(pics: &'a Mutex<ChainedPics<P>>, cpu: C, keyboard_entry: HandlerFunc) -> Self {
        Self {
            pics,
            cpu,
            offsets: PicOffsets::DEFAULT,
            keyboard_entry,
        }
    }

    pub fn with_offsets(mut self, offsets: PicOffsets) -> Self {
        self.offsets = offsets;
        self
    }

    /// Run the sequence. A `state` that already holds a table is rejected
    /// before anything is written.
    pub fn run(
        mut self,
        state: &'static InterruptState,
        scan_codes: &'static ScanCodeCell,
    ) -> Result<&'static InterruptDescriptorTable, InterruptError> {
        if state.idt.is_completed() {
            return Err(InterruptError::AlreadyInitialized);
        }

        let keyboard_vector = self.offsets.vector(Irq::Keyboard);
        let mut builder = IdtBuilder::new(self.cpu.code_selector());
        register_exception_handlers(&mut builder);
        builder.handler(keyboard_vector, self.keyboard_entry);
        let table = builder.finish()?;

        self.pics.lock().remap(self.offsets);
        serial_println!("[interrupts] PIC remapped: {}", self.offsets);

        state
            .keyboard
            .call_once(|| KeyboardHandler::new(scan_codes, keyboard_vector));
        let idt = state.idt.call_once(|| table);
        unsafe { self.cpu.load_idt(idt) };
        serial_println!("[interrupts] IDT loaded, keyboard on vector {}", keyboard_vector);

        // The guard must be gone before IF is set, or the first keyboard
        // interrupt spins on it forever.
        self.pics.lock().set_mask(Irq::Keyboard, true);
        self.cpu.enable_interrupts();

        Ok(idt)
    }
}
