//! Cooperative shutdown signal

use core::cell::Cell;

use critical_section::Mutex;

/// One-way flag raised by any context and observed by the render loop at
/// the start of its next tick.
pub struct ShutdownSignal {
    requested: Mutex<Cell<bool>>,
}

impl ShutdownSignal {
    pub const fn new() -> Self {
        Self {
            requested: Mutex::new(Cell::new(false)),
        }
    }

    pub fn request(&self) {
        critical_section::with(|cs| self.requested.borrow(cs).set(true));
    }

    pub fn is_requested(&self) -> bool {
        critical_section::with(|cs| self.requested.borrow(cs).get())
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
