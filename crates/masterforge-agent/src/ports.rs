//! The port pool: one port per spawned room process, owned exclusively
//! by the agent and returned when the process exits.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

/// A pool of ports handed to spawned room processes.
///
/// Freed ports are reused lowest-first before the pool grows into
/// untouched range. The pool doesn't probe the OS — it assumes the
/// configured range is reserved for room processes on this machine.
pub struct PortPool {
    next: u32,
    end: u16,
    released: BTreeSet<u16>,
}

impl PortPool {
    pub fn new(range: RangeInclusive<u16>) -> Self {
        Self {
            next: *range.start() as u32,
            end: *range.end(),
            released: BTreeSet::new(),
        }
    }

    /// Takes a port, or `None` when the pool is exhausted.
    pub fn allocate(&mut self) -> Option<u16> {
        if let Some(port) = self.released.pop_first() {
            return Some(port);
        }
        if self.next <= self.end as u32 {
            let port = self.next as u16;
            self.next += 1;
            Some(port)
        } else {
            None
        }
    }

    /// Returns a port to the pool.
    pub fn release(&mut self, port: u16) {
        self.released.insert(port);
    }

    /// Ports currently available without releases.
    pub fn available(&self) -> usize {
        let fresh = (self.end as u32 + 1).saturating_sub(self.next);
        fresh as usize + self.released.len()
    }
}
