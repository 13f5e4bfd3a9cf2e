//! # Process Model
//!
//! Scheduling and accounting state for one simulated task.
//!
//! ## Quantum Growth
//!
//! Every turn a process is granted `quantum` cycles. If that is enough to
//! finish, it accrues exactly the cycles it had left and is done. If not,
//! it accrues the whole quantum and its quantum doubles, so long-running
//! work earns longer and longer slices (a cheap stand-in for multilevel
//! feedback queues).

use core::fmt;

use crate::config::{INITIAL_QUANTUM, INIT_GROUP_ID, USER_GROUP_ID};
use crate::memory::BlockId;

// ---------------------------------------------------------------------------
// Process state machine
// ---------------------------------------------------------------------------

/// Scheduling state of a process.
///
/// ```text
///                 schedule() + memory
///   ┌───────────┐ ──────────────────► ┌───────────┐
///   │ Readiness │                     │ Execution │ ── cycles == 0 ──► removed
///   └───────────┘ ◄────────────────── └───────────┘ ── swap full ───► removed
///     ▲      │      turn over / swapped out
///     │      │ block (external)
///     │      ▼
///   ┌───────────┐
///   │ Blocking  │
///   └───────────┘
///     unblock (external)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Running during the current tick.
    Execution,
    /// Eligible for selection.
    Readiness,
    /// Suspended by an external action. Never resumes on its own.
    Blocking,
}

impl ProcessState {
    pub const fn label(self) -> &'static str {
        match self {
            ProcessState::Execution => "Execution",
            ProcessState::Readiness => "Readiness",
            ProcessState::Blocking => "Blocking",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What one quantum of execution did to a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantumOutcome {
    /// The quantum covered the remaining work.
    Finished,
    /// Work remains; the quantum has been doubled.
    Preempted,
}

// ---------------------------------------------------------------------------
// Process
// ---------------------------------------------------------------------------

/// One entry of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    /// Unique, strictly increasing, never reused.
    pub pid: u32,

    pub name: String,

    /// Memory the process needs resident in RAM to run.
    pub requested_memory: usize,

    /// Block currently held in RAM. The memory manager owns the block;
    /// this is only a handle.
    pub memory_block: Option<BlockId>,

    /// True while the process image lives in swap (evicted, not yet re-admitted).
    pub swapped: bool,

    pub cycles_remaining: u64,

    /// Cycles granted on the next turn. Always at least 1.
    pub quantum: u64,

    /// Total cycles actually executed.
    pub cpu_time: u64,

    pub state: ProcessState,

    /// `INIT_GROUP_ID` marks the bootstrap process.
    pub group_id: u32,
}

impl Process {
    /// A fresh user process, ready and memory-less.
    pub fn new(pid: u32, name: String, requested_memory: usize, cycles: u64) -> Self {
        Self {
            pid,
            name,
            requested_memory,
            memory_block: None,
            swapped: false,
            cycles_remaining: cycles,
            quantum: INITIAL_QUANTUM,
            cpu_time: 0,
            state: ProcessState::Readiness,
            group_id: USER_GROUP_ID,
        }
    }

    /// The bootstrap process. Permanently resident, never executed.
    pub fn init() -> Self {
        Self {
            group_id: INIT_GROUP_ID,
            ..Self::new(0, String::from("init"), 0, 0)
        }
    }

    #[inline]
    pub fn is_init(&self) -> bool {
        self.group_id == INIT_GROUP_ID
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.state == ProcessState::Blocking
    }

    #[inline]
    pub fn holds_memory(&self) -> bool {
        self.memory_block.is_some()
    }

    /// Run one quantum and apply the growth policy.
    pub fn run_quantum(&mut self) -> QuantumOutcome {
        if self.cycles_remaining <= self.quantum {
            self.cpu_time += self.cycles_remaining;
            self.cycles_remaining = 0;
            QuantumOutcome::Finished
        } else {
            self.cycles_remaining -= self.quantum;
            self.cpu_time += self.quantum;
            self.quantum = self.quantum.saturating_mul(2);
            QuantumOutcome::Preempted
        }
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>5} {:<12} {:>9} {:<10} {:>9} {:>9} {:>7}",
            self.pid,
            self.name,
            self.requested_memory,
            self.state.label(),
            self.cpu_time,
            self.cycles_remaining,
            self.quantum
        )
    }
}
