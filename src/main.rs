#![no_std]
#![no_main]

extern crate rlibc;

use bootloader_api::config::{BootloaderConfig, Mapping};
use bootloader_api::{entry_point, BootInfo};
use core::panic::PanicInfo;

use kernel64::arch::interrupts;
use kernel64::devices::console::{Color, SerialConsole, TextOutput};
use kernel64::{hlt_loop, serial, serial_println, ScanCodeCell};

const CONFIG: BootloaderConfig = {
    let mut config = BootloaderConfig::new_default();
    config.mappings.physical_memory = Some(Mapping::Dynamic);
    config.kernel_stack_size = 64 * 1024;
    config
};

entry_point!(kernel_main, config = &CONFIG);

/// Written by the keyboard IRQ handler, polled below.
static SCAN_CODE: ScanCodeCell = ScanCodeCell::new();

fn kernel_main(_boot_info: &'static mut BootInfo) -> ! {
    serial::init();

    let mut console = SerialConsole::new();
    console.set_color(Color::Black, Color::White);
    console.clear_screen();
    console.write_string("Welcome to our 64-bit kernel!\n");

    if let Err(e) = interrupts::initialize(&SCAN_CODE) {
        serial_println!("Interrupt setup failed: {}", e);
        hlt_loop();
    }

    let mut overruns = 0;
    loop {
        // Interrupts wake the hlt; check the cell after each one.
        x86_64::instructions::hlt();

        if let Some(scancode) = SCAN_CODE.take() {
            serial_println!(" scancode {:#04x}", scancode);
        }
        if SCAN_CODE.overruns() != overruns {
            overruns = SCAN_CODE.overruns();
            serial_println!(" {} scancode(s) overwritten before read", overruns);
        }
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    serial_println!("PANIC : {} | {:?}", info.message(), info.location());
    hlt_loop()
}
