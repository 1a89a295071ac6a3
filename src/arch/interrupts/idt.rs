//! # Interrupt Descriptor Table
//!
//! The processor indexes this table directly with the vector number, so it
//! is a flat array of 256 long-mode gate descriptors.
//!
//! ## Entry Format (16 bytes)
//!
//! | Bytes  | Field                                   |
//! |--------|-----------------------------------------|
//! | 0-1    | handler offset bits 0-15                |
//! | 2-3    | code segment selector                   |
//! | 4      | IST index (bits 0-2)                    |
//! | 5      | type (0-3), DPL (5-6), present (7)      |
//! | 6-7    | handler offset bits 16-31               |
//! | 8-11   | handler offset bits 32-63               |
//! | 12-15  | reserved, zero                          |

use core::fmt;
use core::mem::size_of;

use x86_64::instructions::tables::lidt;
use x86_64::structures::idt::{
    DivergingHandlerFuncWithErrCode, HandlerFunc, HandlerFuncWithErrCode, PageFaultHandlerFunc,
};
use x86_64::structures::gdt::SegmentSelector;
use x86_64::structures::DescriptorTablePointer;
use x86_64::{PrivilegeLevel, VirtAddr};

use crate::arch::interrupts::InterruptError;

pub const IDT_ENTRIES: usize = 256;

/// Gate flavour, stored in the low nibble of the attribute byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GateType {
    /// Clears IF on entry.
    Interrupt = 0b1110,
    /// Leaves IF alone.
    Trap = 0b1111,
}

/// Attribute byte of a gate descriptor.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct GateAttributes(u8);

impl GateAttributes {
    const PRESENT: u8 = 1 << 7;
    const DPL_SHIFT: u8 = 5;

    /// Present ring-0 interrupt gate (`0x8E`).
    pub const INTERRUPT: GateAttributes =
        GateAttributes::new(GateType::Interrupt, PrivilegeLevel::Ring0);

    pub const fn new(gate: GateType, dpl: PrivilegeLevel) -> Self {
        Self(Self::PRESENT | ((dpl as u8) << Self::DPL_SHIFT) | gate as u8)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_present(self) -> bool {
        self.0 & Self::PRESENT != 0
    }

    pub fn privilege_level(self) -> PrivilegeLevel {
        PrivilegeLevel::from_u16(((self.0 >> Self::DPL_SHIFT) & 0b11) as u16)
    }

    pub fn gate_type(self) -> Option<GateType> {
        match self.0 & 0x0F {
            0b1110 => Some(GateType::Interrupt),
            0b1111 => Some(GateType::Trap),
            _ => None,
        }
    }
}

impl fmt::Debug for GateAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateAttributes")
            .field("present", &self.is_present())
            .field("dpl", &self.privilege_level())
            .field("gate", &self.gate_type())
            .finish()
    }
}

/// One gate descriptor, laid out exactly as the CPU reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct IdtEntry {
    offset_low: u16,
    selector: u16,
    ist: u8,
    attributes: GateAttributes,
    offset_mid: u16,
    offset_high: u32,
    reserved: u32,
}

const _: () = assert!(size_of::<IdtEntry>() == 16);

impl IdtEntry {
    /// A not-present entry. Firing its vector raises #NP, then #DF.
    pub const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            ist: 0,
            attributes: GateAttributes(GateType::Interrupt as u8),
            offset_mid: 0,
            offset_high: 0,
            reserved: 0,
        }
    }

    pub fn new(handler: VirtAddr, selector: SegmentSelector, attributes: GateAttributes) -> Self {
        let addr = handler.as_u64();
        Self {
            offset_low: addr as u16,
            selector: selector.0,
            ist: 0,
            attributes,
            offset_mid: (addr >> 16) as u16,
            offset_high: (addr >> 32) as u32,
            reserved: 0,
        }
    }

    pub fn is_present(&self) -> bool {
        self.attributes.is_present()
    }

    pub fn handler_address(&self) -> u64 {
        u64::from(self.offset_low)
            | (u64::from(self.offset_mid) << 16)
            | (u64::from(self.offset_high) << 32)
    }

    pub fn selector(&self) -> SegmentSelector {
        SegmentSelector(self.selector)
    }

    pub fn attributes(&self) -> GateAttributes {
        self.attributes
    }

    pub fn stack_index(&self) -> u8 {
        self.ist & 0b111
    }
}

/// The full 256-vector table.
#[derive(Clone)]
#[repr(C, align(16))]
pub struct InterruptDescriptorTable {
    entries: [IdtEntry; IDT_ENTRIES],
}

impl InterruptDescriptorTable {
    pub const fn new() -> Self {
        Self {
            entries: [IdtEntry::missing(); IDT_ENTRIES],
        }
    }

    /// Write one descriptor.
    pub fn set_entry(
        &mut self,
        vector: u8,
        handler: VirtAddr,
        selector: SegmentSelector,
        attributes: GateAttributes,
    ) {
        self.entries[usize::from(vector)] = IdtEntry::new(handler, selector, attributes);
    }

    pub fn entry(&self, vector: u8) -> &IdtEntry {
        &self.entries[usize::from(vector)]
    }

    pub fn present_vectors(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |&v| self.entry(v).is_present())
    }

    /// The operand for `lidt`.
    pub fn pointer(&'static self) -> DescriptorTablePointer {
        DescriptorTablePointer {
            limit: (size_of::<Self>() - 1) as u16,
            base: VirtAddr::from_ptr(self),
        }
    }

    /// Make this the active IDT.
    ///
    /// Every vector that can fire from here on must already be present.
    pub fn load(&'static self) {
        unsafe { lidt(&self.pointer()) }
    }
}

impl Default for InterruptDescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds an [`InterruptDescriptorTable`] and refuses to hand it out while
/// any registered vector is unusable.
pub struct IdtBuilder {
    table: InterruptDescriptorTable,
    selector: SegmentSelector,
    required: [bool; IDT_ENTRIES],
}

impl IdtBuilder {
    /// Every gate registered through this builder uses `selector` as its
    /// code segment.
    pub fn new(selector: SegmentSelector) -> Self {
        Self {
            table: InterruptDescriptorTable::new(),
            selector,
            required: [false; IDT_ENTRIES],
        }
    }

    pub fn handler(&mut self, vector: u8, handler: HandlerFunc) -> &mut Self {
        self.gate(vector, handler as *const () as u64, GateAttributes::INTERRUPT)
    }

    pub fn handler_with_err_code(
        &mut self,
        vector: u8,
        handler: HandlerFuncWithErrCode,
    ) -> &mut Self {
        self.gate(vector, handler as *const () as u64, GateAttributes::INTERRUPT)
    }

    pub fn diverging_handler_with_err_code(
        &mut self,
        vector: u8,
        handler: DivergingHandlerFuncWithErrCode,
    ) -> &mut Self {
        self.gate(vector, handler as *const () as u64, GateAttributes::INTERRUPT)
    }

    pub fn page_fault_handler(&mut self, vector: u8, handler: PageFaultHandlerFunc) -> &mut Self {
        self.gate(vector, handler as *const () as u64, GateAttributes::INTERRUPT)
    }

    /// Register a raw entry point. The vector becomes required.
    pub fn gate(&mut self, vector: u8, address: u64, attributes: GateAttributes) -> &mut Self {
        let handler = VirtAddr::new_truncate(address);
        self.table.set_entry(vector, handler, self.selector, attributes);
        self.required[usize::from(vector)] = true;
        self
    }

    /// Mark a vector that must be present without registering it here.
    pub fn require(&mut self, vector: u8) -> &mut Self {
        self.required[usize::from(vector)] = true;
        self
    }

    pub fn finish(self) -> Result<InterruptDescriptorTable, InterruptError> {
        if self.selector.index() == 0 {
            return Err(InterruptError::NullSelector);
        }
        for vector in 0..=u8::MAX {
            if !self.required[usize::from(vector)] {
                continue;
            }
            let entry = self.table.entry(vector);
            if !entry.is_present() || entry.handler_address() == 0 {
                return Err(InterruptError::MissingHandler(vector));
            }
        }
        Ok(self.table)
    }
}
