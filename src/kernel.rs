//! # Kernel
//!
//! Top-level owner of one simulation and the API offered to a front end.
//!
//! A [`Kernel`] aggregates the process table, the memory manager and the
//! process generator. Nothing is global: every simulation is an ordinary
//! value, so tests can run many side by side.
//!
//! ## Tick Sequence
//!
//! ```text
//! front-end loop
//!   ├─► input:   create_process() / set_process_blocked()
//!   ├─► kernel.schedule()   ← pick subject, admit to RAM
//!   ├─► render:  processes() / memory_blocks() / cursor() / memory_stats()
//!   └─► kernel.perform()    ← run quantum, swap or remove, advance cursor
//! ```
//!
//! `tick()` runs both phases back to back when rendering is decoupled.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::SimConfig;
use crate::error::SimResult;
use crate::memory::{MemoryBlock, MemoryManager, MemoryStats};
use crate::process::Process;
use crate::scheduler::{ProcessTable, TickEvent};

/// One self-contained simulation.
pub struct Kernel {
    config: SimConfig,
    table: ProcessTable,
    memory: MemoryManager,
    rng: StdRng,
    ticks: u64,
}

impl Kernel {
    /// Build a simulation holding only `init`, with all RAM free.
    ///
    /// # Errors
    /// `InvalidConfig` if the configuration is rejected by
    /// [`SimConfig::validate`].
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(
            "[kernel] ram {} blocks, swap {} blocks, seed {:?}",
            config.ram_capacity, config.swap_capacity, config.seed
        );

        Ok(Self {
            config,
            table: ProcessTable::new(),
            memory: MemoryManager::new(config.ram_capacity, config.swap_capacity),
            rng,
            ticks: 0,
        })
    }

    // -----------------------------------------------------------------------
    // Mutating entry points
    // -----------------------------------------------------------------------

    /// Create a process with random demands. Returns its pid.
    pub fn create_process(&mut self) -> u32 {
        let max_memory = self.config.max_process_memory();
        self.table.add_process(&mut self.rng, max_memory)
    }

    /// Create a process with chosen demands. Returns its pid.
    ///
    /// # Errors
    /// `ZeroMemoryRequest` if `requested_memory` is 0.
    pub fn create_process_with(&mut self, requested_memory: usize, cycles: u64) -> SimResult<u32> {
        self.table.push(requested_memory, cycles)
    }

    /// Block or unblock the process at table row `index`.
    pub fn set_process_blocked(&mut self, index: usize, blocked: bool) -> SimResult<()> {
        self.table.set_blocked(index, blocked)
    }

    /// First half of a tick. Returns the pid admitted to run, if any.
    pub fn schedule(&mut self) -> Option<u32> {
        self.table.schedule(&mut self.memory)
    }

    /// Second half of a tick.
    pub fn perform(&mut self) -> TickEvent {
        let event = self.table.perform(&mut self.memory);
        self.ticks += 1;
        debug_assert!(self.memory.verify().is_ok(), "memory map corrupted");
        debug!("[kernel] tick {}: {:?}", self.ticks, event);
        event
    }

    /// A whole tick with nothing in between.
    pub fn tick(&mut self) -> TickEvent {
        self.schedule();
        self.perform()
    }

    pub fn scroll_up(&mut self) {
        self.table.scroll_up();
    }

    pub fn scroll_down(&mut self) {
        self.table.scroll_down();
    }

    // -----------------------------------------------------------------------
    // Read-only snapshot
    // -----------------------------------------------------------------------

    #[inline]
    pub fn processes(&self) -> &[Process] {
        self.table.processes()
    }

    #[inline]
    pub fn memory_blocks(&self) -> &[MemoryBlock] {
        self.memory.blocks()
    }

    #[inline]
    pub fn occupied_ram(&self) -> usize {
        self.memory.occupied_ram()
    }

    #[inline]
    pub fn occupied_swap(&self) -> usize {
        self.memory.occupied_swap()
    }

    /// Round-robin position, for the front end's cursor marker.
    #[inline]
    pub fn cursor(&self) -> Option<usize> {
        self.table.cursor()
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.memory.stats()
    }

    #[inline]
    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    #[inline]
    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    #[inline]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Completed ticks.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Default for Kernel {
    fn default() -> Self {
        let config = SimConfig::default();
        Self {
            config,
            table: ProcessTable::new(),
            memory: MemoryManager::new(config.ram_capacity, config.swap_capacity),
            rng: StdRng::from_entropy(),
            ticks: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
