//! # Scheduler
//!
//! The process table and its two-phase tick driver.
//!
//! ## Scheduling Algorithm
//!
//! Round-robin over the table in insertion order, one process per tick:
//! 1. **`schedule()`**: pick the process under the cursor as the tick's
//!    subject. `init` and blocked processes are left alone. Anything else
//!    must hold RAM to run: it keeps its block, or gets one first-fit, or
//!    (no Hole large enough) stays ready and simply misses its turn.
//! 2. **`perform()`**: if the subject was admitted, run one quantum. A
//!    finished process frees its memory and leaves the table. When RAM is
//!    more than half full the subject is swapped out; if swap is full too
//!    it is killed. Finally the cursor advances, compensating for any
//!    removal.
//!
//! ## Cursor Maintenance
//!
//! The cursor is an index into the table. Removing the subject shifts every
//! later process down by one, so the cursor is first stepped back and then
//! advanced modulo the new length: the process that followed the removed
//! one is next. An empty table leaves the cursor unset.

use log::{debug, error, info, trace, warn};
use rand::Rng;

use crate::config::{MAX_INITIAL_CYCLES, PAGE_ROWS};
use crate::error::{SimError, SimResult};
use crate::memory::{MemoryManager, ReleaseOutcome};
use crate::process::{Process, ProcessState, QuantumOutcome};

// ---------------------------------------------------------------------------
// Tick events
// ---------------------------------------------------------------------------

/// What `perform()` did with the tick's subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    /// No subject: the table is empty.
    Idle,
    /// The subject was not running (init, blocked, or not admitted).
    Skipped { pid: u32 },
    /// Ran a quantum and went back to the ready state holding its memory.
    Preempted { pid: u32 },
    /// Ran a quantum and was evicted to swap under RAM pressure.
    SwappedOut { pid: u32 },
    /// Finished its work and left the table.
    Finished { pid: u32 },
    /// Could not be swapped out (swap full) and was terminated.
    Killed { pid: u32 },
}

// ---------------------------------------------------------------------------
// Process table
// ---------------------------------------------------------------------------

/// Ordered process table with its round-robin cursor.
pub struct ProcessTable {
    processes: Vec<Process>,

    /// Next pid to hand out. Never decreases.
    next_pid: u32,

    /// Round-robin position. `None` until the table first has a process.
    cursor: Option<usize>,

    /// Index of the process chosen by the last `schedule()`, cleared by `perform()`.
    current: Option<usize>,

    /// First row of the visible page.
    first: usize,
}

impl ProcessTable {
    /// A table holding only the bootstrap `init` process.
    pub fn new() -> Self {
        let mut table = Self::empty();
        table.processes.push(Process::init());
        table.next_pid = 1;
        table
    }

    /// A table without the bootstrap process.
    pub fn empty() -> Self {
        Self {
            processes: Vec::new(),
            next_pid: 0,
            cursor: None,
            current: None,
            first: 0,
        }
    }

    /// Append a user process with the given demands. Returns its pid.
    ///
    /// # Errors
    /// `ZeroMemoryRequest` if `requested_memory` is 0: such a process could
    /// never be admitted to RAM.
    pub fn push(&mut self, requested_memory: usize, cycles: u64) -> SimResult<u32> {
        if requested_memory == 0 {
            return Err(SimError::ZeroMemoryRequest);
        }
        Ok(self.insert(requested_memory, cycles))
    }

    fn insert(&mut self, requested_memory: usize, cycles: u64) -> u32 {
        let pid = self.next_pid;
        self.next_pid += 1;
        let process = Process::new(pid, format!("proc{}", pid), requested_memory, cycles);
        info!(
            "[sched] created {} (pid {}, memory {}, cycles {})",
            process.name, pid, requested_memory, cycles
        );
        self.processes.push(process);
        pid
    }

    /// Append a user process with random demands: memory in
    /// `1..max_memory`, cycles in `0..MAX_INITIAL_CYCLES`.
    pub fn add_process<R: Rng + ?Sized>(&mut self, rng: &mut R, max_memory: usize) -> u32 {
        let memory = rng.gen_range(1..max_memory.max(2));
        let cycles = rng.gen_range(0..MAX_INITIAL_CYCLES);
        self.insert(memory, cycles)
    }

    /// Block or unblock the process at `index`.
    ///
    /// # Errors
    /// - `NoSuchProcess` if `index` is out of range
    /// - `InitProtected` when blocking `init`
    /// - `NotBlocked` when unblocking a process that is not blocked
    pub fn set_blocked(&mut self, index: usize, blocked: bool) -> SimResult<()> {
        let process = self
            .processes
            .get_mut(index)
            .ok_or(SimError::NoSuchProcess(index))?;

        if blocked {
            if process.is_init() {
                return Err(SimError::InitProtected);
            }
            process.state = ProcessState::Blocking;
            debug!("[sched] blocked pid {}", process.pid);
        } else {
            if !process.is_blocked() {
                return Err(SimError::NotBlocked(index));
            }
            process.state = ProcessState::Readiness;
            debug!("[sched] unblocked pid {}", process.pid);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Two-phase tick
    // -----------------------------------------------------------------------

    /// Phase 1: choose the tick's subject and try to admit it.
    ///
    /// Returns the pid of the process that will run this tick, if any.
    pub fn schedule(&mut self, memory: &mut MemoryManager) -> Option<u32> {
        if self.processes.is_empty() {
            self.cursor = None;
            self.current = None;
            return None;
        }

        let mut index = *self.cursor.get_or_insert(0);
        if index >= self.processes.len() {
            error!("[sched] cursor {} out of range, rewinding", index);
            index = 0;
            self.cursor = Some(0);
        }
        self.current = Some(index);

        let process = &mut self.processes[index];
        if process.is_init() || process.is_blocked() {
            trace!("[sched] pid {} not runnable ({})", process.pid, process.state);
            return None;
        }

        if !process.holds_memory() {
            let size = process.requested_memory;
            let block = if process.swapped {
                memory.allocate_from_swap(size)
            } else {
                memory.allocate(size)
            };
            match block {
                Some(id) => {
                    process.memory_block = Some(id);
                    process.swapped = false;
                }
                None => {
                    debug!("[sched] pid {} waits for {} blocks of ram", process.pid, size);
                    return None;
                }
            }
        }

        process.state = ProcessState::Execution;
        Some(process.pid)
    }

    /// Phase 2: run the subject for one quantum and settle its memory.
    pub fn perform(&mut self, memory: &mut MemoryManager) -> TickEvent {
        let index = match self.current.take() {
            Some(index) if index < self.processes.len() => index,
            _ => return TickEvent::Idle,
        };

        let process = &mut self.processes[index];
        let pid = process.pid;
        if process.state != ProcessState::Execution {
            self.advance(false);
            return TickEvent::Skipped { pid };
        }

        let mut remove = false;
        let mut event = TickEvent::Preempted { pid };

        if process.run_quantum() == QuantumOutcome::Finished {
            if let Some(id) = process.memory_block.take() {
                if let Err(err) = memory.release(id, false) {
                    error!("[sched] pid {} finished with a bad block: {}", pid, err);
                }
            }
            remove = true;
            event = TickEvent::Finished { pid };
        }

        if memory.is_under_pressure() {
            if let Some(id) = process.memory_block {
                match memory.release(id, true) {
                    Ok(ReleaseOutcome::SwapExhausted) => {
                        warn!("[sched] pid {} killed: swap exhausted", pid);
                        process.memory_block = None;
                        if let Err(err) = memory.release(id, false) {
                            error!("[sched] pid {} killed with a bad block: {}", pid, err);
                        }
                        remove = true;
                        event = TickEvent::Killed { pid };
                    }
                    Ok(_) => {
                        process.memory_block = None;
                        process.swapped = true;
                        event = TickEvent::SwappedOut { pid };
                    }
                    Err(err) => {
                        error!("[sched] pid {} holds a bad block: {}", pid, err);
                        process.memory_block = None;
                    }
                }
            }
        }

        if remove {
            let removed = self.processes.remove(index);
            info!(
                "[sched] removed {} (pid {}, cpu time {})",
                removed.name, removed.pid, removed.cpu_time
            );
            self.first = self.first.min(self.processes.len().saturating_sub(PAGE_ROWS));
        } else {
            self.processes[index].state = ProcessState::Readiness;
        }

        self.advance(remove);
        event
    }

    /// Step the cursor to the next process. After a removal the process
    /// that followed the removed one already sits at the cursor.
    fn advance(&mut self, removed: bool) {
        let len = self.processes.len();
        self.cursor = match self.cursor {
            _ if len == 0 => None,
            Some(cursor) if removed => Some(cursor % len),
            Some(cursor) => Some((cursor + 1) % len),
            None => Some(0),
        };
        trace!("[sched] cursor -> {:?}", self.cursor);
    }

    // -----------------------------------------------------------------------
    // Pagination
    // -----------------------------------------------------------------------

    pub fn scroll_up(&mut self) {
        self.first = self.first.saturating_sub(1);
    }

    /// Scroll while more than a page of rows lies below the offset.
    pub fn scroll_down(&mut self) {
        if self.processes.len().saturating_sub(self.first) > PAGE_ROWS {
            self.first += 1;
        }
    }

    #[inline]
    pub fn first(&self) -> usize {
        self.first
    }

    /// Rows on the current page.
    pub fn visible(&self) -> &[Process] {
        let start = self.first.min(self.processes.len());
        let end = (start + PAGE_ROWS).min(self.processes.len());
        &self.processes[start..end]
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    #[inline]
    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn index_of(&self, pid: u32) -> Option<usize> {
        self.processes.iter().position(|p| p.pid == pid)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    #[inline]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// The subject of the tick in progress, between `schedule()` and `perform()`.
    pub fn current(&self) -> Option<&Process> {
        self.current.and_then(|index| self.processes.get(index))
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tick(table: &mut ProcessTable, memory: &mut MemoryManager) -> TickEvent {
        table.schedule(memory);
        table.perform(memory)
    }

    #[test]
    fn test_new_table_holds_init() {
        let table = ProcessTable::new();
        assert_eq!(table.len(), 1);
        assert!(table.processes()[0].is_init());
        assert_eq!(table.cursor(), None);
    }

    #[test]
    fn test_pids_strictly_increase_and_are_not_reused() {
        let mut table = ProcessTable::empty();
        let mut memory = MemoryManager::new(1000, 1000);
        let a = table.push(10, 0).unwrap();
        let b = table.push(10, 0).unwrap();
        assert_eq!((a, b), (0, 1));
        tick(&mut table, &mut memory);
        assert_eq!(table.index_of(a), None);
        let c = table.push(10, 0).unwrap();
        assert_eq!(c, 2);
    }

    #[test]
    fn test_single_short_process_finishes_in_one_tick() {
        let mut table = ProcessTable::empty();
        let mut memory = MemoryManager::new(1000, 1000);
        let pid = table.push(200, 1).unwrap();

        assert_eq!(table.schedule(&mut memory), Some(pid));
        assert_eq!(memory.occupied_ram(), 200);
        assert_eq!(table.perform(&mut memory), TickEvent::Finished { pid });

        assert!(table.is_empty());
        assert_eq!(memory.occupied_ram(), 0);
        assert_eq!(table.cursor(), None);
        assert!(memory.verify().is_ok());
    }

    #[test]
    fn test_admission_failure_leaves_memory_unchanged() {
        let mut table = ProcessTable::empty();
        let mut memory = MemoryManager::new(1000, 1000);
        let first = table.push(600, 500).unwrap();
        let second = table.push(600, 500).unwrap();

        assert_eq!(table.schedule(&mut memory), Some(first));
        // Suspended mid-tick: keeps its block, skipped by perform.
        table.set_blocked(0, true).unwrap();
        assert_eq!(table.perform(&mut memory), TickEvent::Skipped { pid: first });
        assert_eq!(memory.occupied_ram(), 600);

        assert_eq!(table.schedule(&mut memory), None);
        assert_eq!(table.current().map(|p| p.pid), Some(second));
        assert!(!table.processes()[1].holds_memory());
        assert_eq!(table.processes()[1].state, ProcessState::Readiness);
        assert_eq!(memory.occupied_ram(), 600);

        assert_eq!(table.perform(&mut memory), TickEvent::Skipped { pid: second });
        assert_eq!(table.cursor(), Some(0));
    }

    #[test]
    fn test_quantum_growth_scenario() {
        let mut table = ProcessTable::empty();
        let mut memory = MemoryManager::new(1000, 1000);
        let pid = table.push(100, 10).unwrap();
        table.processes[0].quantum = 3;

        assert_eq!(tick(&mut table, &mut memory), TickEvent::Preempted { pid });
        let p = &table.processes()[0];
        assert_eq!((p.cycles_remaining, p.quantum, p.cpu_time), (7, 6, 3));
        assert_eq!(p.state, ProcessState::Readiness);
        assert!(p.holds_memory());

        tick(&mut table, &mut memory);
        let p = &table.processes()[0];
        assert_eq!((p.cycles_remaining, p.quantum, p.cpu_time), (1, 12, 9));

        assert_eq!(tick(&mut table, &mut memory), TickEvent::Finished { pid });
        assert!(table.is_empty());
        assert_eq!(memory.occupied_ram(), 0);
    }

    #[test]
    fn test_init_and_blocked_are_skipped() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(1000, 1000);
        let pid = table.push(100, 500).unwrap();
        table.set_blocked(1, true).unwrap();

        assert_eq!(tick(&mut table, &mut memory), TickEvent::Skipped { pid: 0 });
        assert_eq!(table.cursor(), Some(1));
        assert_eq!(tick(&mut table, &mut memory), TickEvent::Skipped { pid });
        assert_eq!(table.cursor(), Some(0));
        assert_eq!(memory.occupied_ram(), 0);
        assert_eq!(table.processes()[0].state, ProcessState::Readiness);
        assert_eq!(table.processes()[1].state, ProcessState::Blocking);
    }

    #[test]
    fn test_round_robin_visits_in_order() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(1000, 1000);
        let a = table.push(10, 500).unwrap();
        let b = table.push(10, 500).unwrap();

        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(table.schedule(&mut memory));
            table.perform(&mut memory);
        }
        assert_eq!(seen, vec![None, Some(a), Some(b), None, Some(a), Some(b)]);
    }

    #[test]
    fn test_removal_keeps_cursor_on_follower() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(1000, 1000);
        let a = table.push(10, 0).unwrap();
        let b = table.push(10, 500).unwrap();

        tick(&mut table, &mut memory); // init
        assert_eq!(tick(&mut table, &mut memory), TickEvent::Finished { pid: a });
        assert_eq!(table.cursor(), Some(1));
        assert_eq!(table.schedule(&mut memory), Some(b));
    }

    #[test]
    fn test_removal_of_last_row_wraps_cursor() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(1000, 1000);
        let a = table.push(10, 0).unwrap();

        tick(&mut table, &mut memory);
        assert_eq!(tick(&mut table, &mut memory), TickEvent::Finished { pid: a });
        assert_eq!(table.len(), 1);
        assert_eq!(table.cursor(), Some(0));
    }

    #[test]
    fn test_pressure_swaps_out_and_readmits() {
        let mut table = ProcessTable::empty();
        let mut memory = MemoryManager::new(1000, 1000);
        let pid = table.push(600, 100).unwrap();

        assert_eq!(tick(&mut table, &mut memory), TickEvent::SwappedOut { pid });
        let p = &table.processes()[0];
        assert!(!p.holds_memory());
        assert!(p.swapped);
        assert_eq!(p.state, ProcessState::Readiness);
        assert_eq!(memory.occupied_ram(), 0);
        assert_eq!(memory.occupied_swap(), 600);

        assert_eq!(table.schedule(&mut memory), Some(pid));
        assert_eq!(memory.occupied_ram(), 600);
        assert_eq!(memory.occupied_swap(), 0);
        assert!(!table.processes()[0].swapped);
    }

    #[test]
    fn test_swap_exhaustion_kills_and_frees() {
        let mut table = ProcessTable::empty();
        let mut memory = MemoryManager::new(1000, 100);
        let pid = table.push(600, 100).unwrap();
        let other = table.push(50, 100).unwrap();

        assert_eq!(tick(&mut table, &mut memory), TickEvent::Killed { pid });
        assert_eq!(table.len(), 1);
        assert_eq!(table.processes()[0].pid, other);
        assert_eq!(memory.occupied_ram(), 0);
        assert_eq!(memory.occupied_swap(), 0);
        assert_eq!(table.cursor(), Some(0));
        assert!(memory.verify().is_ok());
    }

    #[test]
    fn test_finished_under_pressure_is_not_swapped() {
        let mut table = ProcessTable::empty();
        let mut memory = MemoryManager::new(1000, 0);
        let big = table.push(600, 1000).unwrap();
        let small = table.push(100, 1).unwrap();

        table.schedule(&mut memory);
        table.set_blocked(0, true).unwrap();
        table.perform(&mut memory);
        assert_eq!(table.processes()[0].pid, big);
        assert!(memory.is_under_pressure());

        // Finishes with ram still over half full; nothing left to swap.
        assert_eq!(tick(&mut table, &mut memory), TickEvent::Finished { pid: small });
        assert_eq!(memory.occupied_swap(), 0);
        assert_eq!(memory.occupied_ram(), 600);
    }

    #[test]
    fn test_empty_table_ticks_are_idle() {
        let mut table = ProcessTable::empty();
        let mut memory = MemoryManager::new(1000, 1000);
        assert_eq!(table.schedule(&mut memory), None);
        assert_eq!(table.perform(&mut memory), TickEvent::Idle);
        assert_eq!(table.cursor(), None);
    }

    #[test]
    fn test_perform_without_schedule_is_idle() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(1000, 1000);
        assert_eq!(table.perform(&mut memory), TickEvent::Idle);
    }

    #[test]
    fn test_set_blocked_guards() {
        let mut table = ProcessTable::new();
        table.push(10, 10).unwrap();
        assert_eq!(table.set_blocked(0, true), Err(SimError::InitProtected));
        assert_eq!(table.set_blocked(5, true), Err(SimError::NoSuchProcess(5)));
        assert_eq!(table.set_blocked(1, false), Err(SimError::NotBlocked(1)));
        assert_eq!(table.set_blocked(1, true), Ok(()));
        assert_eq!(table.set_blocked(1, true), Ok(()));
        assert_eq!(table.set_blocked(1, false), Ok(()));
        assert_eq!(table.processes()[1].state, ProcessState::Readiness);
    }

    #[test]
    fn test_zero_memory_request_rejected() {
        let mut table = ProcessTable::new();
        assert_eq!(table.push(0, 1), Err(SimError::ZeroMemoryRequest));
        assert_eq!(table.len(), 1);
        // The rejected request does not consume a pid.
        assert_eq!(table.push(1, 1), Ok(1));
    }

    #[test]
    fn test_add_process_draws_in_range() {
        let mut table = ProcessTable::new();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            table.add_process(&mut rng, 16);
        }
        for p in &table.processes()[1..] {
            assert!((1..16).contains(&p.requested_memory));
            assert!(p.cycles_remaining < MAX_INITIAL_CYCLES);
            assert_eq!(p.quantum, 1);
            assert_eq!(p.name, format!("proc{}", p.pid));
        }
    }

    #[test]
    fn test_pagination() {
        let mut table = ProcessTable::new();
        for _ in 0..14 {
            table.push(1, 1).unwrap();
        }
        assert_eq!(table.visible().len(), PAGE_ROWS);
        table.scroll_up();
        assert_eq!(table.first(), 0);
        for _ in 0..10 {
            table.scroll_down();
        }
        // 15 rows, 11 per page: offset stops where 11 rows remain.
        assert_eq!(table.first(), 4);
        assert_eq!(table.visible().len(), PAGE_ROWS);
        assert_eq!(table.visible()[0].pid, 4);
    }

    #[test]
    fn test_removal_keeps_last_page_full() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(1000, 1000);
        for _ in 0..14 {
            table.push(1, 500).unwrap();
        }
        let short = table.push(1, 0).unwrap();
        for _ in 0..10 {
            table.scroll_down();
        }
        assert_eq!(table.first(), 5);

        // Run the rotation up to the last row, which finishes and leaves.
        while table.processes().last().map(|p| p.pid) == Some(short) {
            table.schedule(&mut memory);
            table.perform(&mut memory);
        }
        assert_eq!(table.len(), 15);
        assert_eq!(table.first(), 4);
        assert_eq!(table.visible().len(), PAGE_ROWS);
    }
}
