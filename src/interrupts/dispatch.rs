//! Central interrupt dispatch.
//!
//! Every trampoline ends up in [`Dispatcher::dispatch`] or, on the running
//! kernel, [`dispatch_shared`]. CPU exceptions are classified and reported as
//! fatal. Controller lines run their handler and are always acknowledged. Any
//! other vector runs its handler if one is registered.

use spin::Mutex;

use crate::{
    constants::idt::{EXCEPTION_VECTORS, IDT_ENTRIES},
    hal::{Cpu, PortIo},
    interrupts::{
        exceptions::{report_fatal, ExceptionReport},
        frame::InterruptFrame,
        pic::ChainedPics,
    },
};

/// A registered interrupt handler. Runs with interrupts disabled and must not
/// block or re-enable them.
pub type InterruptHandler = fn(&mut InterruptFrame);

/// One handler slot per vector.
#[derive(Clone)]
pub struct HandlerTable {
    slots: [Option<InterruptHandler>; IDT_ENTRIES],
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerTable {
    pub const fn new() -> Self {
        Self {
            slots: [None; IDT_ENTRIES],
        }
    }

    /// Installs `handler` for `vector`, replacing whatever was there.
    pub fn register(&mut self, vector: u8, handler: InterruptHandler) -> Option<InterruptHandler> {
        self.slots[usize::from(vector)].replace(handler)
    }

    pub fn unregister(&mut self, vector: u8) -> Option<InterruptHandler> {
        self.slots[usize::from(vector)].take()
    }

    pub fn get(&self, vector: u8) -> Option<InterruptHandler> {
        self.slots[usize::from(vector)]
    }

    pub fn registered_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl core::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(
                self.slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.is_some())
                    .map(|(vector, _)| vector),
            )
            .finish()
    }
}

/// What the interrupt entry must do once dispatch returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Return to the interrupted code.
    Resume,
    /// A CPU exception occurred; stop the processor permanently.
    Halt(ExceptionReport),
}

/// Where one interrupt goes once the handler table has been consulted.
#[derive(Clone, Copy)]
enum Route {
    Halt(ExceptionReport),
    Run {
        handler: Option<InterruptHandler>,
        /// Controller line to acknowledge after the handler returns.
        line: Option<u8>,
    },
}

#[derive(Debug)]
pub struct Dispatcher<P: PortIo> {
    handlers: HandlerTable,
    pics: ChainedPics<P>,
    unhandled: u64,
}

impl<P: PortIo> Dispatcher<P> {
    pub const fn new(pics: ChainedPics<P>) -> Self {
        Self {
            handlers: HandlerTable::new(),
            pics,
            unhandled: 0,
        }
    }

    /// Installs `handler` for `vector` (last writer wins).
    pub fn register(&mut self, vector: u8, handler: InterruptHandler) {
        if vector < EXCEPTION_VECTORS {
            log::warn!(
                "Handler registered on exception vector {}; exceptions are always fatal",
                vector
            );
        }
        if self.handlers.register(vector, handler).is_some() {
            log::debug!("Replaced handler for vector {}", vector);
        }
    }

    pub fn unregister(&mut self, vector: u8) {
        self.handlers.unregister(vector);
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    pub fn pics(&self) -> &ChainedPics<P> {
        &self.pics
    }

    pub fn pics_mut(&mut self) -> &mut ChainedPics<P> {
        &mut self.pics
    }

    /// Interrupts that arrived with no handler to run.
    pub fn unhandled_count(&self) -> u64 {
        self.unhandled
    }

    /// Routes one interrupt occurrence.
    pub fn dispatch(&mut self, frame: &mut InterruptFrame, cpu: &impl Cpu) -> Disposition {
        match self.route(frame, cpu) {
            Route::Halt(report) => Disposition::Halt(report),
            Route::Run { handler, line } => {
                if let Some(handler) = handler {
                    handler(frame);
                }
                self.acknowledge(line);
                Disposition::Resume
            }
        }
    }

    fn route(&mut self, frame: &InterruptFrame, cpu: &impl Cpu) -> Route {
        if let Some(report) = report_fatal(frame, cpu) {
            return Route::Halt(report);
        }

        let vector = frame.vector();
        let handler = self.handlers.get(vector);
        if handler.is_none() {
            self.unhandled += 1;
            log::debug!("Unhandled interrupt: {}", vector);
        }

        Route::Run {
            handler,
            line: self.pics.line_for_vector(vector),
        }
    }

    fn acknowledge(&mut self, line: Option<u8>) {
        if let Some(line) = line {
            self.pics.end_of_interrupt(line);
        }
    }
}

/// Routes one interrupt through a dispatcher shared with the rest of the kernel.
///
/// The lock is released while the handler runs, so a handler may register or
/// unregister handlers itself. If the lock is already held, only the exception
/// path is taken.
pub fn dispatch_shared<P: PortIo>(
    shared: &Mutex<Dispatcher<P>>,
    frame: &mut InterruptFrame,
    cpu: &impl Cpu,
) -> Disposition {
    let route = match shared.try_lock() {
        Some(mut dispatcher) => dispatcher.route(frame, cpu),
        None => {
            return match report_fatal(frame, cpu) {
                Some(report) => Disposition::Halt(report),
                None => {
                    log::warn!("Vector {} arrived while the dispatcher was busy", frame.vector);
                    Disposition::Resume
                }
            };
        }
    };

    match route {
        Route::Halt(report) => Disposition::Halt(report),
        Route::Run { handler, line } => {
            if let Some(handler) = handler {
                handler(frame);
            }
            shared.lock().acknowledge(line);
            Disposition::Resume
        }
    }
}
