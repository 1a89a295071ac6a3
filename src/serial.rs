use spin::Mutex;
use uart_16550::SerialPort;

pub const COM1: u16 = 0x3F8;

pub static SERIAL: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(COM1) });

/// Program the UART. Call once before the first print.
pub fn init() {
    x86_64::instructions::interrupts::without_interrupts(|| SERIAL.lock().init());
}

#[doc(hidden)]
#[cfg(not(test))]
pub fn _print(args: ::core::fmt::Arguments) {
    use core::fmt::Write;
    use x86_64::instructions::interrupts;

    // IRQ handlers share this port; keep them out while we hold it.
    interrupts::without_interrupts(|| {
        let _ = SERIAL.lock().write_fmt(args);
    });
}

/// Print only if nobody holds the port. Returns whether anything was
/// written.
#[cfg(not(test))]
pub fn try_print(args: ::core::fmt::Arguments) -> bool {
    use core::fmt::Write;

    match SERIAL.try_lock() {
        Some(mut port) => {
            let _ = port.write_fmt(args);
            true
        }
        None => false,
    }
}

#[doc(hidden)]
#[cfg(test)]
pub fn _print(args: ::core::fmt::Arguments) {
    std::print!("{}", args);
}

#[cfg(test)]
pub fn try_print(args: ::core::fmt::Arguments) -> bool {
    std::print!("{}", args);
    true
}

/// Prints to the host through the serial interface.
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {{
        $crate::serial::_print(format_args!($($arg)*))
    }};
}

/// Prints to the host through the serial interface, appending a newline.
#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($fmt:expr) => ($crate::serial_print!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => ($crate::serial_print!(
        concat!($fmt, "\n"), $($arg)*));
}
