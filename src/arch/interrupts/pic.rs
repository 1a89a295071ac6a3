//! # Programmable Interrupt Controller (8259 PIC)
//!
//! Configures the legacy 8259 PIC chips for interrupt routing.
//!
//! ## PIC Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │   PIC 1     │     │   PIC 2     │
//! │  (Master)   │◀────│  (Slave)    │
//! │ IRQ 0-7     │ IRQ2│ IRQ 8-15    │
//! └─────────────┘     └─────────────┘
//!       │
//!       ▼
//!     CPU
//! ```
//!
//! ## Vector Remapping
//!
//! Out of reset the master delivers IRQ 0-7 on vectors 8-15, right on top of
//! the CPU exception vectors. [`ChainedPics::remap`] moves them:
//! - PIC 1: vectors 32-39 (IRQ 0-7)
//! - PIC 2: vectors 40-47 (IRQ 8-15)
//!
//! ## Interrupt Assignments
//!
//! | IRQ | Vector | Device    |
//! |-----|--------|-----------|
//! | 0   | 32     | Timer     |
//! | 1   | 33     | Keyboard  |
//! | 2   | 34     | Cascade   |
//! | 12  | 44     | Mouse     |

use core::fmt;

use crate::arch::interrupts::InterruptError;
use crate::arch::io::PortIo;

pub const PIC_1_OFFSET: u8 = 32; // Primary PIC handles IRQs 0-7
pub const PIC_2_OFFSET: u8 = 40; // Secondary PIC handles IRQs 8-15

pub const PIC_1_COMMAND: u16 = 0x20;
pub const PIC_1_DATA: u16 = 0x21;
pub const PIC_2_COMMAND: u16 = 0xA0;
pub const PIC_2_DATA: u16 = 0xA1;

/// ICW1: edge triggered, cascade mode, ICW4 follows.
const ICW1_INIT: u8 = 0x11;
/// ICW3 (master): a slave hangs off IRQ2.
const ICW3_MASTER_CASCADE: u8 = 1 << 2;
/// ICW3 (slave): cascade identity 2.
const ICW3_SLAVE_IDENTITY: u8 = 2;
/// ICW4: 8086/88 mode.
const ICW4_8086: u8 = 0x01;
/// OCW2: non-specific end of interrupt.
pub const CMD_END_OF_INTERRUPT: u8 = 0x20;

const ALL_MASKED: u8 = 0xFF;

/// The sixteen ISA interrupt lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Irq {
    Timer = 0,
    Keyboard = 1,
    Cascade = 2,
    Com2 = 3,
    Com1 = 4,
    Lpt2 = 5,
    Floppy = 6,
    Lpt1 = 7,
    Rtc = 8,
    Free9 = 9,
    Free10 = 10,
    Free11 = 11,
    Mouse = 12,
    Fpu = 13,
    PrimaryAta = 14,
    SecondaryAta = 15,
}

impl Irq {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Bit of this line within its controller's mask register.
    fn mask_bit(self) -> u8 {
        1 << (self.as_u8() % 8)
    }

    fn on_slave(self) -> bool {
        self.as_u8() >= 8
    }
}

/// Vector bases for the master and slave controller.
///
/// Only constructible through [`PicOffsets::new`], which refuses any pair
/// that would alias CPU exceptions or each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PicOffsets {
    master: u8,
    slave: u8,
}

impl PicOffsets {
    pub const DEFAULT: PicOffsets = PicOffsets {
        master: PIC_1_OFFSET,
        slave: PIC_2_OFFSET,
    };

    pub fn new(master: u8, slave: u8) -> Result<Self, InterruptError> {
        for offset in [master, slave] {
            // ICW2 only carries bits 3-7 of the base in 8086 mode.
            if offset < 32 || offset % 8 != 0 {
                return Err(InterruptError::InvalidOffset(offset));
            }
        }
        if master == slave {
            return Err(InterruptError::OverlappingOffsets { master, slave });
        }
        Ok(Self { master, slave })
    }

    pub fn master(self) -> u8 {
        self.master
    }

    pub fn slave(self) -> u8 {
        self.slave
    }

    /// CPU vector that `irq` is delivered on.
    pub fn vector(self, irq: Irq) -> u8 {
        if irq.on_slave() {
            self.slave + (irq.as_u8() - 8)
        } else {
            self.master + irq.as_u8()
        }
    }
}

impl Default for PicOffsets {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for PicOffsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "master {}-{}, slave {}-{}",
            self.master,
            self.master + 7,
            self.slave,
            self.slave + 7
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Pic {
    offset: u8,
    command: u16,
    data: u16,
}

impl Pic {
    fn handles_interrupt(&self, vector: u8) -> bool {
        vector >= self.offset && vector - self.offset < 8
    }
}

/// The master/slave 8259 pair, talking over `P`.
pub struct ChainedPics<P: PortIo> {
    pics: [Pic; 2],
    io: P,
}

impl<P: PortIo> ChainedPics<P> {
    /// A pair that assumes the default offsets. Nothing is written until
    /// [`remap`](Self::remap).
    pub const fn new(io: P) -> Self {
        Self {
            pics: [
                Pic {
                    offset: PIC_1_OFFSET,
                    command: PIC_1_COMMAND,
                    data: PIC_1_DATA,
                },
                Pic {
                    offset: PIC_2_OFFSET,
                    command: PIC_2_COMMAND,
                    data: PIC_2_DATA,
                },
            ],
            io,
        }
    }

    pub fn offsets(&self) -> PicOffsets {
        PicOffsets {
            master: self.pics[0].offset,
            slave: self.pics[1].offset,
        }
    }

    /// Run the full ICW1-ICW4 initialization on both controllers and leave
    /// every line masked.
    ///
    /// The four words must reach each chip in this exact order; the chip
    /// treats the data port as ICW2/3/4 until the sequence completes.
    pub fn remap(&mut self, offsets: PicOffsets) {
        self.pics[0].offset = offsets.master;
        self.pics[1].offset = offsets.slave;
        let [master, slave] = self.pics;

        unsafe {
            self.write(master.command, ICW1_INIT);
            self.write(slave.command, ICW1_INIT);

            self.write(master.data, master.offset);
            self.write(slave.data, slave.offset);

            self.write(master.data, ICW3_MASTER_CASCADE);
            self.write(slave.data, ICW3_SLAVE_IDENTITY);

            self.write(master.data, ICW4_8086);
            self.write(slave.data, ICW4_8086);

            self.write_masks(ALL_MASKED, ALL_MASKED);
        }
    }

    /// Unmask (`enabled`) or mask one line. Only that line's bit changes.
    pub fn set_mask(&mut self, irq: Irq, enabled: bool) {
        let pic = self.pics[irq.on_slave() as usize];
        unsafe {
            let mask = self.io.read_u8(pic.data);
            let mask = if enabled {
                mask & !irq.mask_bit()
            } else {
                mask | irq.mask_bit()
            };
            self.io.write_u8(pic.data, mask);
        }
    }

    pub fn is_enabled(&mut self, irq: Irq) -> bool {
        let pic = self.pics[irq.on_slave() as usize];
        let mask = unsafe { self.io.read_u8(pic.data) };
        mask & irq.mask_bit() == 0
    }

    /// Raw (master, slave) mask registers.
    pub fn read_masks(&mut self) -> (u8, u8) {
        unsafe {
            (
                self.io.read_u8(self.pics[0].data),
                self.io.read_u8(self.pics[1].data),
            )
        }
    }

    /// # Safety
    ///
    /// Unmasking a line whose vector has no IDT entry faults on the next
    /// interrupt from that line.
    pub unsafe fn write_masks(&mut self, master: u8, slave: u8) {
        self.write(self.pics[0].data, master);
        self.write(self.pics[1].data, slave);
    }

    /// Mask every line on both controllers.
    pub fn disable(&mut self) {
        unsafe { self.write_masks(ALL_MASKED, ALL_MASKED) }
    }

    pub fn handles_interrupt(&self, vector: u8) -> bool {
        self.pics.iter().any(|p| p.handles_interrupt(vector))
    }

    /// Send EOI for `vector`. Slave vectors need it on both chips.
    ///
    /// # Safety
    ///
    /// Acknowledging an interrupt that is not in service can unblock a
    /// lower-priority line early.
    pub unsafe fn notify_end_of_interrupt(&mut self, vector: u8) {
        if self.handles_interrupt(vector) {
            if self.pics[1].handles_interrupt(vector) {
                self.io.write_u8(self.pics[1].command, CMD_END_OF_INTERRUPT);
            }
            self.io.write_u8(self.pics[0].command, CMD_END_OF_INTERRUPT);
        }
    }

    /// Guard that acknowledges `vector` when dropped, however the handler
    /// leaves its scope.
    pub fn end_of_interrupt_on_drop(&mut self, vector: u8) -> EndOfInterrupt<'_, P> {
        EndOfInterrupt { pics: self, vector }
    }

    unsafe fn write(&mut self, port: u16, value: u8) {
        self.io.write_u8(port, value);
        self.io.io_wait();
    }
}

/// Pending acknowledgment for one interrupt; see
/// [`ChainedPics::end_of_interrupt_on_drop`].
pub struct EndOfInterrupt<'a, P: PortIo> {
    pics: &'a mut ChainedPics<P>,
    vector: u8,
}

impl<P: PortIo> Drop for EndOfInterrupt<'_, P> {
    fn drop(&mut self) {
        unsafe { self.pics.notify_end_of_interrupt(self.vector) }
    }
}
