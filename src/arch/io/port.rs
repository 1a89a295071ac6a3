//! # Port I/O
//!
//! Single-byte access to the x86 I/O address space.
//!
//! Everything above this layer talks to hardware through the [`PortIo`]
//! trait. On the machine that is [`HardwarePorts`], a zero-sized handle over
//! `in`/`out`; under test it is the simulated bus in `crate::testing`.
//!
//! No port is validated. Executing `in`/`out` without I/O privilege is a
//! general protection fault, not an error value.

use x86_64::instructions::port::Port;

/// Unused port written to let slow ISA devices settle between commands.
pub const IO_WAIT_PORT: u16 = 0x80;

/// Byte-wide access to I/O ports.
pub trait PortIo {
    /// Read one byte from `port`.
    ///
    /// # Safety
    ///
    /// Reading a device port can have side effects on that device (it
    /// acknowledges data, clears status bits, ...).
    unsafe fn read_u8(&mut self, port: u16) -> u8;

    /// Write one byte to `port`.
    ///
    /// # Safety
    ///
    /// Writes reprogram hardware; the caller must know what lives at `port`.
    unsafe fn write_u8(&mut self, port: u16, value: u8);

    /// Give the device on the other end of the bus time to latch the last
    /// write.
    fn io_wait(&mut self) {
        unsafe { self.write_u8(IO_WAIT_PORT, 0) }
    }
}

impl<T: PortIo + ?Sized> PortIo for &mut T {
    unsafe fn read_u8(&mut self, port: u16) -> u8 {
        (**self).read_u8(port)
    }

    unsafe fn write_u8(&mut self, port: u16, value: u8) {
        (**self).write_u8(port, value)
    }

    fn io_wait(&mut self) {
        (**self).io_wait()
    }
}

/// The real I/O bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct HardwarePorts;

impl PortIo for HardwarePorts {
    #[inline]
    unsafe fn read_u8(&mut self, port: u16) -> u8 {
        read_port(port)
    }

    #[inline]
    unsafe fn write_u8(&mut self, port: u16, value: u8) {
        write_port(port, value)
    }
}

/// `inb`: read one byte from `port`.
///
/// # Safety
///
/// See [`PortIo::read_u8`].
#[inline]
pub unsafe fn read_port(port: u16) -> u8 {
    Port::<u8>::new(port).read()
}

/// `outb`: write one byte to `port`.
///
/// # Safety
///
/// See [`PortIo::write_u8`].
#[inline]
pub unsafe fn write_port(port: u16, value: u8) {
    Port::<u8>::new(port).write(value)
}
