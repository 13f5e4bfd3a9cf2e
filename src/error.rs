//! # Errors
//!
//! Unified error type for API misuse. Conditions the simulation recovers
//! from on its own (admission failure, swap exhaustion) are outcomes, not
//! errors, and never show up here.

use core::fmt;

use crate::memory::BlockId;

/// Errors returned by the public simulation API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    /// The configuration cannot describe a working simulation.
    InvalidConfig(&'static str),
    /// The handle does not name any block in the memory map.
    UnknownBlock(BlockId),
    /// The block exists but is already a Hole.
    BlockNotOccupied(BlockId),
    /// No process at this table index.
    NoSuchProcess(usize),
    /// The `init` process cannot be blocked.
    InitProtected,
    /// Unblock requested for a process that is not blocked.
    NotBlocked(usize),
    /// A process must request at least one block of memory.
    ZeroMemoryRequest,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::InvalidConfig(reason) => write!(f, "invalid configuration: {}", reason),
            SimError::UnknownBlock(id) => write!(f, "unknown memory block {}", id),
            SimError::BlockNotOccupied(id) => write!(f, "memory block {} is not occupied", id),
            SimError::NoSuchProcess(index) => write!(f, "no process at index {}", index),
            SimError::InitProtected => write!(f, "the init process cannot be blocked"),
            SimError::NotBlocked(index) => write!(f, "process at index {} is not blocked", index),
            SimError::ZeroMemoryRequest => write!(f, "a process must request at least one block of memory"),
        }
    }
}

impl std::error::Error for SimError {}

/// Result alias used across the crate.
pub type SimResult<T> = Result<T, SimError>;
