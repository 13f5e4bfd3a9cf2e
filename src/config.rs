//! # rrsim Configuration
//!
//! Default capacities and policy constants for the simulation, plus the
//! runtime [`SimConfig`] used to build a [`Kernel`](crate::kernel::Kernel).
//! The constants are the defaults; tests and the demo binary override the
//! capacities through `SimConfig`.

use crate::error::{SimError, SimResult};

/// RAM capacity in blocks (4 MiB worth of unit-sized blocks).
/// The memory map starts out as one Hole of exactly this size.
pub const RAM_CAPACITY: usize = 4_194_304;

/// Swap (disk) capacity in blocks. A swap-out that would push occupancy
/// past this limit fails and the process that triggered it is killed.
pub const SWAP_CAPACITY: usize = 67_108_864;

/// A new process requests at most `ram_capacity / PROCESS_MEMORY_DIVISOR`
/// blocks (exclusive upper bound).
pub const PROCESS_MEMORY_DIVISOR: usize = 256;

/// Exclusive upper bound for the initial remaining-cycle count of a new process.
pub const MAX_INITIAL_CYCLES: u64 = 1024;

/// Quantum granted to a process on its first turn. Doubles on every turn
/// the process does not finish.
pub const INITIAL_QUANTUM: u64 = 1;

/// Group id of the bootstrap `init` process.
pub const INIT_GROUP_ID: u32 = 1;

/// Group id of every user-created process.
pub const USER_GROUP_ID: u32 = 0;

/// Number of process table rows visible on one page.
pub const PAGE_ROWS: usize = 11;

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Runtime configuration for one simulation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    /// Total RAM in blocks.
    pub ram_capacity: usize,

    /// Total swap space in blocks.
    pub swap_capacity: usize,

    /// Seed for the process generator. `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl SimConfig {
    pub const fn new() -> Self {
        Self {
            ram_capacity: RAM_CAPACITY,
            swap_capacity: SWAP_CAPACITY,
            seed: None,
        }
    }

    pub const fn with_ram(mut self, ram_capacity: usize) -> Self {
        self.ram_capacity = ram_capacity;
        self
    }

    pub const fn with_swap(mut self, swap_capacity: usize) -> Self {
        self.swap_capacity = swap_capacity;
        self
    }

    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Exclusive upper bound for the memory a generated process requests.
    /// Never below 2, so the request range `1..bound` is never empty.
    #[inline]
    pub const fn max_process_memory(&self) -> usize {
        let bound = self.ram_capacity / PROCESS_MEMORY_DIVISOR;
        if bound < 2 {
            2
        } else {
            bound
        }
    }

    /// Reject configurations the memory manager cannot represent.
    pub fn validate(&self) -> SimResult<()> {
        if self.ram_capacity == 0 {
            return Err(SimError::InvalidConfig("ram capacity must be positive"));
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_constants() {
        let config = SimConfig::default();
        assert_eq!(config.ram_capacity, RAM_CAPACITY);
        assert_eq!(config.swap_capacity, SWAP_CAPACITY);
        assert_eq!(config.seed, None);
        assert_eq!(config.max_process_memory(), RAM_CAPACITY / 256);
    }

    #[test]
    fn test_small_ram_keeps_request_range_non_empty() {
        let config = SimConfig::new().with_ram(100);
        assert_eq!(config.max_process_memory(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_ram_rejected() {
        let config = SimConfig::new().with_ram(0);
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
    }
}
