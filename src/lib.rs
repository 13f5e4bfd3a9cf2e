//! # rrsim — Round-Robin Scheduler and Memory Manager Simulation
//!
//! A teaching model of two coupled operating-system subsystems: a process
//! scheduler doing round-robin dispatch with an exponentially growing
//! quantum, and a memory manager doing first-fit allocation with block
//! splitting, coalescing, and swap fallback.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │        Front end (demo binary, TUI, tests, ...)         │
//! ├────────────────────────────────────────────────────────┤
//! │      Kernel API (kernel.rs)  ·  SharedKernel (sync.rs)  │
//! │  create_process() · set_process_blocked() · tick()      │
//! ├───────────────────────────┬────────────────────────────┤
//! │  Scheduler                │  Memory Manager            │
//! │  scheduler.rs             │  memory.rs                 │
//! │  ─ schedule()             │  ─ allocate()   first-fit  │
//! │  ─ perform()              │  ─ release()    coalesce   │
//! │  ─ round-robin cursor     │  ─ ram / swap counters     │
//! ├───────────────────────────┴────────────────────────────┤
//! │        Process Model (process.rs) · Config · Errors     │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Coupling
//!
//! A process runs only while it holds a block of simulated RAM. The
//! scheduler asks the memory manager for one when a process comes up in
//! the rotation; if no Hole is big enough the process misses its turn.
//! After a turn, RAM more than half full pushes the process out to swap,
//! and a full swap kills it. The memory manager knows nothing about
//! processes: it hands out [`BlockId`](memory::BlockId)s and reports a
//! [`ReleaseOutcome`](memory::ReleaseOutcome) that the scheduler interprets.
//!
//! ## Threading
//!
//! The model is single-threaded and every tick runs to completion.
//! [`SharedKernel`](sync::SharedKernel) serializes access when a front end
//! needs more than one thread.

pub mod config;
pub mod error;
pub mod memory;
pub mod process;
pub mod scheduler;
pub mod kernel;
pub mod sync;

pub use crate::config::SimConfig;
pub use crate::error::{SimError, SimResult};
pub use crate::kernel::Kernel;
pub use crate::scheduler::TickEvent;
pub use crate::sync::SharedKernel;
