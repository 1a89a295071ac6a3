//! Host-side doubles for the hardware this crate drives.
//!
//! [`SimulatedMachine`] stands in for the I/O bus: two 8259 controllers that
//! follow the ICW protocol, a keyboard data port fed from a queue, and an
//! ordered log of everything that crossed the bus. [`RecordingCpu`] logs
//! into the same stream so the relative order of port writes, `lidt` and
//! `sti` can be asserted.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use x86_64::structures::gdt::SegmentSelector;
use x86_64::PrivilegeLevel;

use crate::arch::interrupts::idt::InterruptDescriptorTable;
use crate::arch::interrupts::pic::{PIC_1_COMMAND, PIC_1_DATA, PIC_2_COMMAND, PIC_2_DATA};
use crate::arch::interrupts::setup::Cpu;
use crate::arch::io::port::IO_WAIT_PORT;
use crate::arch::io::PortIo;
use crate::devices::console::{Color, TextOutput};
use crate::devices::drivers::ps2_keyboard::KEYBOARD_DATA_PORT;

pub fn leak<T: 'static>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    Read { port: u16, value: u8 },
    Write { port: u16, value: u8 },
    /// A write to the `io_wait` port.
    Settle,
    IdtLoaded { keyboard_present: bool },
    InterruptsEnabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitStage {
    Ready,
    Icw2,
    Icw3,
    Icw4,
}

/// One 8259 as far as the init protocol, IMR and EOI are concerned.
#[derive(Debug, Clone, Copy)]
pub struct Simulated8259 {
    stage: InitStage,
    expects_icw4: bool,
    initialized: bool,
    base: u8,
    cascade: u8,
    mode: u8,
    mask: u8,
    eoi_count: usize,
}

impl Simulated8259 {
    fn power_on(base: u8) -> Self {
        Self {
            stage: InitStage::Ready,
            expects_icw4: false,
            initialized: false,
            base,
            cascade: 0,
            mode: 0,
            mask: 0,
            eoi_count: 0,
        }
    }

    fn command(&mut self, value: u8) {
        if value & 0x10 != 0 {
            // ICW1 restarts initialization and clears the IMR.
            self.stage = InitStage::Icw2;
            self.expects_icw4 = value & 0x01 != 0;
            self.initialized = false;
            self.mask = 0;
        } else if value == 0x20 {
            self.eoi_count += 1;
        }
    }

    fn data(&mut self, value: u8) {
        match self.stage {
            InitStage::Icw2 => {
                self.base = value & 0xF8;
                self.stage = InitStage::Icw3;
            }
            InitStage::Icw3 => {
                self.cascade = value;
                if self.expects_icw4 {
                    self.stage = InitStage::Icw4;
                } else {
                    self.stage = InitStage::Ready;
                    self.initialized = true;
                }
            }
            InitStage::Icw4 => {
                self.mode = value;
                self.stage = InitStage::Ready;
                self.initialized = true;
            }
            InitStage::Ready => self.mask = value,
        }
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    /// Vector this controller raises for its local `line` (0-7).
    pub fn irq_vector(&self, line: u8) -> u8 {
        self.base + line
    }

    pub fn cascade(&self) -> u8 {
        self.cascade
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    pub fn eoi_count(&self) -> usize {
        self.eoi_count
    }
}

struct Machine {
    master: Simulated8259,
    slave: Simulated8259,
    keyboard: VecDeque<u8>,
    last_scancode: u8,
    events: Vec<BusEvent>,
}

/// Shared handle to one simulated machine; clones see the same state.
#[derive(Clone)]
pub struct SimulatedMachine(Rc<RefCell<Machine>>);

impl SimulatedMachine {
    /// Controllers at their BIOS vectors (8 and 0x70), all lines open.
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Machine {
            master: Simulated8259::power_on(0x08),
            slave: Simulated8259::power_on(0x70),
            keyboard: VecDeque::new(),
            last_scancode: 0,
            events: Vec::new(),
        })))
    }

    /// Latch a scancode into the keyboard controller's output buffer.
    pub fn press(&self, scancode: u8) {
        self.0.borrow_mut().keyboard.push_back(scancode);
    }

    pub fn controllers(&self) -> (Simulated8259, Simulated8259) {
        let machine = self.0.borrow();
        (machine.master, machine.slave)
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.0.borrow().events.clone()
    }

    pub fn record(&self, event: BusEvent) {
        self.0.borrow_mut().events.push(event);
    }

    pub fn reads_from(&self, port: u16) -> usize {
        self.0
            .borrow()
            .events
            .iter()
            .filter(|e| matches!(e, BusEvent::Read { port: p, .. } if *p == port))
            .count()
    }
}

impl PortIo for SimulatedMachine {
    unsafe fn read_u8(&mut self, port: u16) -> u8 {
        let mut machine = self.0.borrow_mut();
        let value = match port {
            PIC_1_DATA => machine.master.mask,
            PIC_2_DATA => machine.slave.mask,
            KEYBOARD_DATA_PORT => {
                // The output buffer keeps its last byte once drained.
                if let Some(code) = machine.keyboard.pop_front() {
                    machine.last_scancode = code;
                }
                machine.last_scancode
            }
            _ => 0xFF,
        };
        machine.events.push(BusEvent::Read { port, value });
        value
    }

    unsafe fn write_u8(&mut self, port: u16, value: u8) {
        let mut machine = self.0.borrow_mut();
        match port {
            IO_WAIT_PORT => {
                machine.events.push(BusEvent::Settle);
                return;
            }
            PIC_1_COMMAND => machine.master.command(value),
            PIC_1_DATA => machine.master.data(value),
            PIC_2_COMMAND => machine.slave.command(value),
            PIC_2_DATA => machine.slave.data(value),
            _ => {}
        }
        machine.events.push(BusEvent::Write { port, value });
    }
}

/// A [`Cpu`] that only logs what it was asked to do.
pub struct RecordingCpu {
    machine: SimulatedMachine,
    keyboard_vector: u8,
    selector: SegmentSelector,
}

impl RecordingCpu {
    pub fn new(machine: SimulatedMachine, keyboard_vector: u8) -> Self {
        Self {
            machine,
            keyboard_vector,
            selector: SegmentSelector::new(1, PrivilegeLevel::Ring0),
        }
    }

    pub fn with_selector(mut self, selector: SegmentSelector) -> Self {
        self.selector = selector;
        self
    }
}

impl Cpu for RecordingCpu {
    fn code_selector(&self) -> SegmentSelector {
        self.selector
    }

    unsafe fn load_idt(&mut self, idt: &'static InterruptDescriptorTable) {
        let keyboard_present = idt.entry(self.keyboard_vector).is_present();
        self.machine.record(BusEvent::IdtLoaded { keyboard_present });
    }

    fn enable_interrupts(&mut self) {
        self.machine.record(BusEvent::InterruptsEnabled);
    }
}

#[derive(Default)]
pub struct RecordingOutput {
    text: String,
    colors: Option<(Color, Color)>,
    clears: usize,
}

impl RecordingOutput {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn colors(&self) -> Option<(Color, Color)> {
        self.colors
    }

    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl TextOutput for RecordingOutput {
    fn set_color(&mut self, foreground: Color, background: Color) {
        self.colors = Some((foreground, background));
    }

    fn clear_screen(&mut self) {
        self.clears += 1;
        self.text.clear();
    }

    fn write_char(&mut self, c: char) {
        self.text.push(c);
    }
}
