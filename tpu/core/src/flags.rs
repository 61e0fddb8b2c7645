//! Running/latched error flag storage
//!
//! Event handlers raise bits into the running set. The host reads them either
//! directly (racy against an in-flight transfer) or through
//! [`FlagLatch::latch_and_clear`], which moves the running set into the
//! latched set inside one critical section.

use core::cell::Cell;
use critical_section::Mutex;

/// Pair of flag registers shared between event handlers and host queries
pub struct FlagLatch {
    running: Mutex<Cell<u8>>,
    latched: Mutex<Cell<u8>>,
}

impl FlagLatch {
    pub const fn new() -> Self {
        Self {
            running: Mutex::new(Cell::new(0)),
            latched: Mutex::new(Cell::new(0)),
        }
    }

    /// OR `bits` into the running flags
    pub fn raise(&self, bits: u8) {
        critical_section::with(|cs| {
            let running = self.running.borrow(cs);
            running.set(running.get() | bits);
        });
    }

    pub fn running(&self) -> u8 {
        critical_section::with(|cs| self.running.borrow(cs).get())
    }

    pub fn clear_running(&self) {
        critical_section::with(|cs| self.running.borrow(cs).set(0));
    }

    /// Copy running into latched and zero running, atomically.
    /// Returns the new latched value.
    pub fn latch_and_clear(&self) -> u8 {
        critical_section::with(|cs| {
            let snapshot = self.running.borrow(cs).replace(0);
            self.latched.borrow(cs).set(snapshot);
            snapshot
        })
    }

    pub fn latched(&self) -> u8 {
        critical_section::with(|cs| self.latched.borrow(cs).get())
    }

    pub fn clear_latched(&self) {
        critical_section::with(|cs| self.latched.borrow(cs).set(0));
    }

    /// Zero both registers
    pub fn reset(&self) {
        critical_section::with(|cs| {
            self.running.borrow(cs).set(0);
            self.latched.borrow(cs).set(0);
        });
    }
}

impl Default for FlagLatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_accumulates() {
        let flags = FlagLatch::new();
        flags.raise(0x01);
        flags.raise(0x20);

        assert_eq!(flags.running(), 0x21);
        assert_eq!(flags.latched(), 0);
    }

    #[test]
    fn test_latch_and_clear() {
        let flags = FlagLatch::new();
        flags.raise(0x10);
        assert_eq!(flags.latch_and_clear(), 0x10);
        assert_eq!(flags.running(), 0);
        assert_eq!(flags.latched(), 0x10);

        // only what accumulated since the previous latch is captured
        flags.raise(0x40);
        flags.latch_and_clear();
        assert_eq!(flags.latched(), 0x40);

        flags.latch_and_clear();
        assert_eq!(flags.latched(), 0);
    }

    #[test]
    fn test_clear_registers() {
        let flags = FlagLatch::new();
        flags.raise(0x02);
        flags.latch_and_clear();
        flags.raise(0x01);

        flags.clear_latched();
        assert_eq!(flags.latched(), 0);
        assert_eq!(flags.running(), 0x01);

        flags.clear_running();
        assert_eq!(flags.running(), 0);
    }
}
