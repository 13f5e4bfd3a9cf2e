//! # Memory Manager
//!
//! Segment-based model of simulated RAM. The address space is a sequence
//! of [`MemoryBlock`]s ordered by offset, each either a Hole or Occupied by
//! exactly one process.
//!
//! ## Allocation Policy
//!
//! First-fit: the sequence is scanned in address order and the first Hole
//! large enough wins. An exact fit flips the Hole to Occupied in place; a
//! larger Hole is split, the Occupied part taking the Hole's original offset.
//!
//! ```text
//!   before:  [ Occ 0..100 ][ Hole 100..1000          ]
//!   alloc(300)
//!   after:   [ Occ 0..100 ][ Occ 100..400 ][ Hole 400..1000 ]
//! ```
//!
//! ## Release and Coalescing
//!
//! A released block becomes a Hole and immediately absorbs whichever
//! immediate neighbours are Holes, so the map never holds two adjacent
//! Holes. Releasing "to swap" additionally moves the block's size into the
//! swap counter, and fails untouched if swap would overflow.
//!
//! ## Invariants
//!
//! - Blocks are contiguous, ordered by offset, and their sizes sum to the
//!   RAM capacity.
//! - Every block has `size > 0`.
//! - No two adjacent blocks are both Holes.
//! - `occupied_ram` equals the total size of Occupied blocks.

use core::fmt;

use log::{debug, trace, warn};

use crate::error::{SimError, SimResult};

// ---------------------------------------------------------------------------
// Block model
// ---------------------------------------------------------------------------

/// Stable handle to a block in the memory map.
///
/// Issued from a counter owned by the [`MemoryManager`] and never reused,
/// so a process can hold one across splits and merges of other blocks.
/// Releasing a block retires its handle: the resulting Hole is named by a
/// new id, and the old one is unknown to the map from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a segment is free or held by a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Hole,
    Occupied,
}

/// One contiguous segment of simulated RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBlock {
    pub id: BlockId,
    pub kind: BlockKind,
    /// First address covered by the segment.
    pub offset: usize,
    /// Length of the segment. Always positive.
    pub size: usize,
}

impl MemoryBlock {
    #[inline]
    pub fn is_hole(&self) -> bool {
        self.kind == BlockKind::Hole
    }

    /// One past the last address covered by the segment.
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Result of [`MemoryManager::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The block was freed outright.
    Released,
    /// The block was freed and its contents accounted to swap.
    ReleasedAndSwapped,
    /// Swap has no room for the block. Nothing changed.
    SwapExhausted,
}

/// Aggregate view of the memory map, for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub ram_capacity: usize,
    pub swap_capacity: usize,
    pub occupied_ram: usize,
    pub occupied_swap: usize,
    pub block_count: usize,
    pub hole_count: usize,
    pub largest_hole: usize,
}

// ---------------------------------------------------------------------------
// Memory manager
// ---------------------------------------------------------------------------

/// Owner of the memory map and the RAM/swap occupancy counters.
pub struct MemoryManager {
    blocks: Vec<MemoryBlock>,
    occupied_ram: usize,
    occupied_swap: usize,
    ram_capacity: usize,
    swap_capacity: usize,
    next_id: u64,
}

impl MemoryManager {
    /// Create a manager whose RAM is a single Hole of `ram_capacity` blocks.
    pub fn new(ram_capacity: usize, swap_capacity: usize) -> Self {
        let mut manager = Self {
            blocks: Vec::new(),
            occupied_ram: 0,
            occupied_swap: 0,
            ram_capacity,
            swap_capacity,
            next_id: 0,
        };
        if ram_capacity > 0 {
            let id = manager.issue_id();
            manager.blocks.push(MemoryBlock {
                id,
                kind: BlockKind::Hole,
                offset: 0,
                size: ram_capacity,
            });
        }
        manager
    }

    fn issue_id(&mut self) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        id
    }

    /// First-fit allocation of `size` blocks.
    ///
    /// Returns the handle of the newly Occupied block, or `None` when no
    /// Hole is large enough (or `size` is zero). `None` is admission
    /// control, not an error: the caller retries on a later tick.
    pub fn allocate(&mut self, size: usize) -> Option<BlockId> {
        if size == 0 {
            return None;
        }

        let index = self
            .blocks
            .iter()
            .position(|b| b.is_hole() && b.size >= size)?;

        // Fresh id even for an exact fit, so an Occupied handle is never reissued.
        let id = self.issue_id();
        let hole = &mut self.blocks[index];
        if hole.size == size {
            hole.id = id;
            hole.kind = BlockKind::Occupied;
        } else {
            let block = MemoryBlock {
                id,
                kind: BlockKind::Occupied,
                offset: hole.offset,
                size,
            };
            hole.offset += size;
            hole.size -= size;
            self.blocks.insert(index, block);
        }

        self.occupied_ram += size;
        debug!(
            "[mem] allocated {} at {} ({} blocks, ram {}/{})",
            id, self.blocks[index].offset, size, self.occupied_ram, self.ram_capacity
        );
        Some(id)
    }

    /// Allocate for a process whose image currently lives in swap.
    ///
    /// Same as [`allocate`](Self::allocate), and on success the process's
    /// swap reservation of `size` blocks is given back.
    pub fn allocate_from_swap(&mut self, size: usize) -> Option<BlockId> {
        let id = self.allocate(size)?;
        self.occupied_swap = self.occupied_swap.saturating_sub(size);
        debug!("[mem] swapped in {} (swap {}/{})", id, self.occupied_swap, self.swap_capacity);
        Some(id)
    }

    /// Turn an Occupied block back into a Hole.
    ///
    /// With `to_swap` the block's contents are accounted to swap; if swap
    /// cannot take them the map is left untouched and
    /// [`ReleaseOutcome::SwapExhausted`] is returned.
    ///
    /// # Errors
    /// `UnknownBlock` if `id` is not in the map, `BlockNotOccupied` if it
    /// already names a Hole.
    pub fn release(&mut self, id: BlockId, to_swap: bool) -> SimResult<ReleaseOutcome> {
        let index = self.position_of(id).ok_or(SimError::UnknownBlock(id))?;
        let block = self.blocks[index];
        if block.is_hole() {
            return Err(SimError::BlockNotOccupied(id));
        }

        if to_swap && self.occupied_swap + block.size > self.swap_capacity {
            warn!(
                "[mem] swap exhausted: {} needs {} blocks, swap {}/{}",
                id, block.size, self.occupied_swap, self.swap_capacity
            );
            return Ok(ReleaseOutcome::SwapExhausted);
        }

        // The freed Hole gets a fresh id so the released handle goes stale.
        let hole_id = self.issue_id();
        self.blocks[index].id = hole_id;
        self.blocks[index].kind = BlockKind::Hole;
        self.occupied_ram -= block.size;
        if to_swap {
            self.occupied_swap += block.size;
        }
        self.coalesce(index);

        debug!(
            "[mem] released {} ({} blocks, swap={}, ram {}/{})",
            id, block.size, to_swap, self.occupied_ram, self.ram_capacity
        );
        Ok(if to_swap {
            ReleaseOutcome::ReleasedAndSwapped
        } else {
            ReleaseOutcome::Released
        })
    }

    /// Merge the freshly released Hole at `index` with Hole neighbours.
    ///
    /// | predecessor | successor | result                          |
    /// |-------------|-----------|---------------------------------|
    /// | absent/Occ  | absent/Occ| unchanged                       |
    /// | absent/Occ  | Hole      | absorbs the successor           |
    /// | Hole        | absent/Occ| absorbs the predecessor         |
    /// | Hole        | Hole      | absorbs both, one block remains |
    fn coalesce(&mut self, index: usize) {
        let prev_hole = index > 0 && self.blocks[index - 1].is_hole();
        let next_hole = self.blocks.get(index + 1).map_or(false, |b| b.is_hole());

        if next_hole {
            let next = self.blocks.remove(index + 1);
            self.blocks[index].size += next.size;
        }
        if prev_hole {
            let prev = self.blocks.remove(index - 1);
            let merged = &mut self.blocks[index - 1];
            merged.offset = prev.offset;
            merged.size += prev.size;
        }

        if prev_hole || next_hole {
            trace!("[mem] coalesced (prev={}, next={}), {} blocks", prev_hole, next_hole, self.blocks.len());
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    /// The memory map in address order.
    #[inline]
    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> Option<&MemoryBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Sequence position of the block named by `id`.
    pub fn position_of(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    #[inline]
    pub fn occupied_ram(&self) -> usize {
        self.occupied_ram
    }

    #[inline]
    pub fn occupied_swap(&self) -> usize {
        self.occupied_swap
    }

    #[inline]
    pub fn ram_capacity(&self) -> usize {
        self.ram_capacity
    }

    #[inline]
    pub fn swap_capacity(&self) -> usize {
        self.swap_capacity
    }

    #[inline]
    pub fn free_ram(&self) -> usize {
        self.ram_capacity - self.occupied_ram
    }

    /// RAM is more than half full: finished turns should swap out.
    #[inline]
    pub fn is_under_pressure(&self) -> bool {
        self.occupied_ram * 2 > self.ram_capacity
    }

    pub fn stats(&self) -> MemoryStats {
        let holes = self.blocks.iter().filter(|b| b.is_hole());
        MemoryStats {
            ram_capacity: self.ram_capacity,
            swap_capacity: self.swap_capacity,
            occupied_ram: self.occupied_ram,
            occupied_swap: self.occupied_swap,
            block_count: self.blocks.len(),
            hole_count: holes.clone().count(),
            largest_hole: holes.map(|b| b.size).max().unwrap_or(0),
        }
    }

    /// Check every memory map invariant, naming the first one broken.
    pub fn verify(&self) -> Result<(), &'static str> {
        let mut expected_offset = 0;
        let mut occupied = 0;
        let mut prev_hole = false;

        for block in &self.blocks {
            if block.size == 0 {
                return Err("zero-sized block");
            }
            if block.offset != expected_offset {
                return Err("blocks not contiguous");
            }
            if block.is_hole() {
                if prev_hole {
                    return Err("adjacent holes");
                }
            } else {
                occupied += block.size;
            }
            prev_hole = block.is_hole();
            expected_offset = block.end();
        }

        if expected_offset != self.ram_capacity {
            return Err("block sizes do not sum to ram capacity");
        }
        if occupied != self.occupied_ram {
            return Err("occupied ram counter out of sync");
        }
        if self.occupied_swap > self.swap_capacity {
            return Err("swap over capacity");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
