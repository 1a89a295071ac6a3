//! # Processor and Platform Layer
//!
//! - `io`: port I/O primitives
//! - `interrupts`: PIC, IDT and the bring-up sequence
//!
//! ## Initialization Order
//!
//! 1. PIC (Programmable Interrupt Controller) - remapped, all lines masked
//! 2. IDT (Interrupt Descriptor Table) - exception and keyboard gates
//! 3. IRQ1 unmasked, then interrupts enabled

pub mod interrupts;
pub mod io;
