//! Tick counter driven by controller line 0.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::interrupts::frame::InterruptFrame;

/// Controller line the programmable interval timer is wired to.
pub const TIMER_LINE: u8 = 0;

static TICKS: AtomicU64 = AtomicU64::new(0);

pub fn on_tick(_frame: &mut InterruptFrame) {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Timer interrupts seen since boot.
pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}
