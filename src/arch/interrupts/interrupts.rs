//! # Interrupt and Exception Handlers
//!
//! ## Exception Handlers
//!
//! | Exception              | Action                              |
//! |------------------------|-------------------------------------|
//! | Breakpoint (#BP)       | Print debug info, continue          |
//! | Page Fault (#PF)       | Diagnostic output, then panic       |
//! | Divide Error (#DE)     | Panic                               |
//! | Invalid Opcode (#UD)   | Panic                               |
//! | General Protection     | Panic with error code               |
//! | Double Fault (#DF)     | Panic                               |
//!
//! ## Hardware Interrupts
//!
//! | IRQ  | Vector | Handler                   |
//! |------|--------|---------------------------|
//! | IRQ1 | 33     | Keyboard (PS/2 scancode)  |

use x86_64::structures::idt::{InterruptStackFrame, PageFaultErrorCode};

use crate::arch::interrupts::idt::IdtBuilder;
use crate::arch::interrupts::pic::Irq;
use crate::arch::interrupts::{state, PICS};
use crate::arch::io::{read_port, HardwarePorts};
use crate::devices::console::SerialConsole;
use crate::devices::drivers::ps2_keyboard::KEYBOARD_DATA_PORT;
use crate::serial_println;

const DIVIDE_ERROR: u8 = 0;
const BREAKPOINT: u8 = 3;
const INVALID_OPCODE: u8 = 6;
const DOUBLE_FAULT: u8 = 8;
const GENERAL_PROTECTION_FAULT: u8 = 13;
const PAGE_FAULT: u8 = 14;

/// Install the CPU exception gates.
pub fn register_exception_handlers(builder: &mut IdtBuilder) {
    builder
        .handler(DIVIDE_ERROR, divide_error_handler)
        .handler(BREAKPOINT, breakpoint_handler)
        .handler(INVALID_OPCODE, invalid_opcode_handler)
        .diverging_handler_with_err_code(DOUBLE_FAULT, double_fault_handler)
        .handler_with_err_code(GENERAL_PROTECTION_FAULT, general_protection_fault_handler)
        .page_fault_handler(PAGE_FAULT, page_fault_handler);
}

extern "x86-interrupt" fn breakpoint_handler(stack_frame: InterruptStackFrame) {
    serial_println!("EXCEPTION: BREAKPOINT\n{:#?}", stack_frame);
}

extern "x86-interrupt" fn divide_error_handler(stack_frame: InterruptStackFrame) {
    panic!("EXCEPTION: DIVIDE BY ZERO\n{:#?}", stack_frame);
}

extern "x86-interrupt" fn invalid_opcode_handler(stack_frame: InterruptStackFrame) {
    panic!("EXCEPTION: INVALID OPCODE\n{:#?}", stack_frame);
}

extern "x86-interrupt" fn general_protection_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) {
    panic!("EXCEPTION: GENERAL PROTECTION FAULT (error code: {})\n{:#?}", error_code, stack_frame);
}

// No IST stack: segment and TSS setup happen before this layer, so a fault
// caused by stack overflow still ends in a triple fault.
extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) -> ! {
    panic!("EXCEPTION: DOUBLE FAULT\n{stack_frame:#?}\n CODE{error_code}");
}

extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: PageFaultErrorCode,
) {
    use x86_64::registers::control::Cr2;

    serial_println!("EXCEPTION: PAGE FAULT");
    match Cr2::read() {
        Ok(addr) => serial_println!("Accessed Address: {:?}", addr),
        Err(e) => serial_println!("Failed to read CR2: {:?}", e),
    }
    serial_println!("Error Code: {:?}", error_code);
    serial_println!("{:#?}", stack_frame);
    panic!("Page fault!");
}

pub(crate) extern "x86-interrupt" fn keyboard_interrupt_handler(_stack_frame: InterruptStackFrame) {
    let mut pics = PICS.lock();
    match state().keyboard() {
        Some(keyboard) => {
            keyboard.service(&mut HardwarePorts, &mut *pics, &mut SerialConsole::interrupt_safe());
        }
        None => {
            // Nobody to hand the byte to; still drain the port and
            // acknowledge so the line does not wedge.
            let vector = pics.offsets().vector(Irq::Keyboard);
            let _eoi = pics.end_of_interrupt_on_drop(vector);
            let _ = unsafe { read_port(KEYBOARD_DATA_PORT) };
        }
    }
}
