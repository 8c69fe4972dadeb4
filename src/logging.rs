//! Kernel logging facility
//!
//! Routes the `log` crate facade to the serial port. The maximum level is
//! Debug in debug builds and Info in release builds.

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

pub static LOGGER: Logger = Logger::new();

/// Serializes whole records so lines from different callers never interleave.
pub struct Logger {
    inner: Mutex<()>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    pub const fn new() -> Logger {
        Logger {
            inner: Mutex::new(()),
        }
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    /// Formats messages as "[LEVEL] message"
    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Errors come from the fatal path, which may have interrupted a holder
        // of either lock.
        if record.level() == Level::Error {
            let _guard = self.inner.try_lock();
            crate::serial::_print_fatal(format_args!(
                "[{}] {}\n",
                record.level(),
                record.args()
            ));
            return;
        }

        let write = || {
            let _guard = self.inner.lock();
            crate::serial_println!("[{}] {}", record.level(), record.args());
        };

        // Handlers log too; they must never find the lock held.
        #[cfg(all(target_arch = "x86", target_os = "none"))]
        crate::interrupts::without_interrupts(write);
        #[cfg(not(all(target_arch = "x86", target_os = "none")))]
        write();
    }

    fn flush(&self) {}
}

/// Level used when nothing overrides it.
pub const fn default_level() -> LevelFilter {
    #[cfg(debug_assertions)]
    {
        LevelFilter::Debug
    }
    #[cfg(not(debug_assertions))]
    {
        LevelFilter::Info
    }
}

/// Installs [`LOGGER`]. Fails if a logger is already installed.
pub fn try_init() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(default_level()))
}

/// Installs [`LOGGER`]; must run once, before anything logs.
pub fn init() {
    try_init().expect("Logger initialization failed");
}
