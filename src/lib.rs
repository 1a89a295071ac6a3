//! Interrupt bring-up and raw keyboard input for a bare-metal x86_64
//! kernel.
//!
//! - [`arch::interrupts::initialize`] remaps the 8259 pair, installs the
//!   IDT, unmasks the keyboard and turns interrupts on.
//! - Every keyboard interrupt lands in a [`ScanCodeCell`] owned by the
//!   caller.
//!
//! Built `no_std` for the kernel; host unit tests link `std`.

#![cfg_attr(not(test), no_std)]
#![feature(abi_x86_interrupt)]

pub mod arch;
pub mod devices;
pub mod serial;

#[cfg(test)]
mod testing;

pub use devices::drivers::ps2_keyboard::ScanCodeCell;

pub fn hlt_loop() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}
