//! COM1 output through a 16550 UART.
//! Everything the kernel prints, including log records, goes through here.

use core::fmt;

use crate::constants::ports::SERIAL_PORT;
use lazy_static::lazy_static;
use spin::Mutex;
use uart_16550::SerialPort;

lazy_static! {
    /// The first serial port, programmed on first use.
    pub static ref SERIAL1: Mutex<SerialPort> = {
        let mut serial_port = unsafe { SerialPort::new(SERIAL_PORT) };
        serial_port.init();
        Mutex::new(serial_port)
    };
}

#[doc(hidden)]
pub fn _print(args: ::core::fmt::Arguments) {
    use core::fmt::Write;

    // An interrupt handler that prints must not find the port already locked.
    #[cfg(all(target_arch = "x86", target_os = "none"))]
    crate::interrupts::without_interrupts(|| {
        SERIAL1
            .lock()
            .write_fmt(args)
            .expect("Printing to serial failed");
    });

    #[cfg(not(all(target_arch = "x86", target_os = "none")))]
    SERIAL1
        .lock()
        .write_fmt(args)
        .expect("Printing to serial failed");
}

/// Writes `args` through `port`, or through a writer from `fallback` when the
/// lock is already held. Never waits.
pub fn write_or_steal<W, F>(port: &Mutex<W>, fallback: F, args: fmt::Arguments) -> fmt::Result
where
    W: fmt::Write,
    F: FnOnce() -> W,
{
    match port.try_lock() {
        Some(mut writer) => writer.write_fmt(args),
        None => fallback().write_fmt(args),
    }
}

/// Last-resort output for fatal diagnostics. If the interrupted code owns COM1,
/// the UART is driven directly through a second handle.
#[doc(hidden)]
pub fn _print_fatal(args: fmt::Arguments) {
    let _ = write_or_steal(&SERIAL1, || unsafe { SerialPort::new(SERIAL_PORT) }, args);
}

/// Prints formatted text to the serial port.
///
/// # Examples
/// ```ignore
/// serial_print!("vector {}", 32);
/// ```
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*))
    };
}

/// Prints formatted text to the serial port, followed by a newline.
#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => ($crate::serial_print!("{}\n", format_args!($($arg)*)));
}
