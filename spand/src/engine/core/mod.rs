/*
 * Created on Fri Mar 01 2024
 *
 * This file is a part of Spantable
 * Spantable is a free and open-source memory allocator simulator written by
 * Sayan Nandan ("the Author") with the vision to provide predictable,
 * ordered-index-backed extent bookkeeping for allocation research and
 * teaching workloads.
 *
 * Copyright (c) 2024, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! The extent engine: three mutually consistent ordered tables describing a
//! single contiguous region, plus the split and merge primitives that keep
//! them that way across allocations and releases.
//!
//! The tables:
//! - `free_addr`: start address -> size, over free extents
//! - `free_size`: size -> {start addresses}, over the same free extents
//! - `alloc_addr`: start address -> size, over allocated extents
//!
//! `free_addr` and `free_size` must always describe the same extent set, so
//! every free-side mutation goes through [`ExtentEngine::insert_free`] /
//! [`ExtentEngine::remove_free`] and nothing else.

mod exec;
pub mod strategy;

#[cfg(test)]
mod tests;

pub use {
    exec::{MemPool, OpOutcome, ALLOC_FAILURE},
    strategy::Strategy,
};

use {
    super::{
        error::{AllocError, AllocResult},
        idx::{AddrTable, IndexBaseSpec, STOrdIndex, STOrdMultiIndex, SizeTable},
    },
    core::fmt,
};

/// A contiguous range `[start, start + size)` of the region, free or
/// allocated depending on which table it sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    start: u64,
    size: u64,
}

impl Extent {
    pub const fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }
    pub const fn start(&self) -> u64 {
        self.start
    }
    pub const fn size(&self) -> u64 {
        self.size
    }
    /// One past the last address
    pub const fn end(&self) -> u64 {
        self.start + self.size
    }
    pub const fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr < self.end()
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

/// Width of the key universe for a region of `total` bytes: `⌈log₂ total⌉`
fn universe_bits(total: u64) -> u32 {
    match total {
        0 | 1 => 0,
        n => u64::BITS - (n - 1).leading_zeros(),
    }
}

pub struct ExtentEngine {
    free_addr: AddrTable,
    free_size: SizeTable,
    alloc_addr: AddrTable,
    total: u64,
    merge_allocated: bool,
}

impl ExtentEngine {
    pub fn new(total: u64, merge_allocated: bool) -> Self {
        let bits = universe_bits(total);
        let mut slf = Self {
            free_addr: AddrTable::idx_init(bits),
            free_size: SizeTable::idx_init(bits),
            alloc_addr: AddrTable::idx_init(bits),
            total,
            merge_allocated,
        };
        // the whole region starts out as one free extent
        slf.insert_free(Extent::new(0, total));
        slf
    }
    pub fn total(&self) -> u64 {
        self.total
    }
    /// Free extents in ascending address order
    pub fn free_iter(&self) -> impl Iterator<Item = Extent> + '_ {
        self.free_addr
            .st_iter_kv()
            .map(|(start, &size)| Extent::new(start, size))
    }
    /// Allocated extents in ascending address order
    pub fn alloc_iter(&self) -> impl Iterator<Item = Extent> + '_ {
        self.alloc_addr
            .st_iter_kv()
            .map(|(start, &size)| Extent::new(start, size))
    }
    pub fn free_count(&self) -> usize {
        self.free_addr.idx_len()
    }
    pub fn alloc_count(&self) -> usize {
        self.alloc_addr.idx_len()
    }
    /// The free extent whose range covers `addr`, if any
    pub fn free_containing(&self, addr: u64) -> Option<Extent> {
        Self::containing(&self.free_addr, addr)
    }
    /// The allocated extent whose range covers `addr`, if any
    pub fn alloc_containing(&self, addr: u64) -> Option<Extent> {
        Self::containing(&self.alloc_addr, addr)
    }
    fn containing(table: &AddrTable, addr: u64) -> Option<Extent> {
        let ext = match table.st_get(addr) {
            Some(&size) => Extent::new(addr, size),
            None => {
                let (start, &size) = table.st_pred(addr)?;
                Extent::new(start, size)
            }
        };
        ext.contains(addr).then_some(ext)
    }
    /// The tightest free extent able to hold `size`: exact size class first,
    /// then the next larger one. Tie-break: smallest start address
    pub fn best_free(&self, size: u64) -> Option<Extent> {
        if let Some(starts) = self.free_size.st_get(size) {
            return starts.first().map(|start| Extent::new(start, size));
        }
        let (actual, starts) = self.free_size.st_succ(size)?;
        starts.first().map(|start| Extent::new(start, actual))
    }
    /// The largest free extent; among equals, the one at the smallest start
    pub fn max_free(&self) -> Option<Extent> {
        let (size, starts) = self.free_size.st_max()?;
        starts.first().map(|start| Extent::new(start, size))
    }

    /*
        mutation
    */

    /// Carve `[start, start + size)` out of the free extent covering it and
    /// hand it to the allocated table. Leading/trailing slack of the host
    /// extent returns to the free tables. Nothing is touched on error
    pub fn allocate(&mut self, start: u64, size: u64) -> AllocResult<()> {
        let end = start.checked_add(size).ok_or(AllocError::IllegalRequest)?;
        let host = self.free_containing(start).ok_or(AllocError::NoFit)?;
        if end > host.end() {
            return Err(AllocError::NoFit);
        }
        if size == 0 {
            // nothing to carve. Zero-sized extents must never reach the
            // tables: splitting here would leave two abutting free extents
            return Ok(());
        }
        self.remove_free(host);
        if start > host.start() {
            self.insert_free(Extent::new(host.start(), start - host.start()));
        }
        if host.end() > end {
            self.insert_free(Extent::new(end, host.end() - end));
        }
        self.alloc_addr.st_insert(start, size);
        if self.merge_allocated {
            self.merge_allocated_around(Extent::new(start, size));
        }
        self.verify_integrity();
        Ok(())
    }

    /// Return `[start, start + size)` to the free tables. The range must sit
    /// inside one allocated extent; that extent is split around it and the
    /// freed range coalesces with abutting free neighbors. Nothing is
    /// touched on error
    pub fn deallocate(&mut self, start: u64, size: u64) -> AllocResult<()> {
        let end = start
            .checked_add(size)
            .ok_or(AllocError::UntrackedRelease)?;
        let host = self
            .alloc_containing(start)
            .ok_or(AllocError::UntrackedRelease)?;
        if end > host.end() {
            return Err(AllocError::UntrackedRelease);
        }
        if size == 0 {
            // a zero-sized release is a validated no-op: there is nothing to
            // key the size table with
            return Ok(());
        }
        self.alloc_addr.st_delete(host.start());
        if start > host.start() {
            self.alloc_addr.st_insert(host.start(), start - host.start());
        }
        if host.end() > end {
            self.alloc_addr.st_insert(end, host.end() - end);
        }
        self.coalesce_free(Extent::new(start, size));
        self.verify_integrity();
        Ok(())
    }

    /// Both free tables, together, always
    fn insert_free(&mut self, ext: Extent) {
        self.free_addr.st_insert(ext.start(), ext.size());
        self.free_size.st_insert_one(ext.size(), ext.start());
    }
    fn remove_free(&mut self, ext: Extent) {
        self.free_addr.st_delete(ext.start());
        self.free_size.st_delete_one(ext.size(), ext.start());
    }

    /// Insert `ext` into the free tables, first folding in the free
    /// neighbors it abuts (either side, or both)
    fn coalesce_free(&mut self, ext: Extent) {
        let mut merged = ext;
        let pred = self
            .free_addr
            .st_pred(ext.start())
            .map(|(start, &size)| Extent::new(start, size));
        let succ = self
            .free_addr
            .st_succ(ext.start())
            .map(|(start, &size)| Extent::new(start, size));
        if let Some(before) = pred {
            if before.end() == merged.start() {
                self.remove_free(before);
                merged = Extent::new(before.start(), before.size() + merged.size());
            }
        }
        if let Some(after) = succ {
            if merged.end() == after.start() {
                self.remove_free(after);
                merged = Extent::new(merged.start(), merged.size() + after.size());
            }
        }
        self.insert_free(merged);
    }

    /// Fold abutting allocated neighbors into the freshly inserted extent,
    /// leaving a single allocated entry for the contiguous run. Releases can
    /// still carve arbitrary sub-ranges back out of the merged entry
    fn merge_allocated_around(&mut self, ext: Extent) {
        let mut merged = ext;
        let pred = self
            .alloc_addr
            .st_pred(ext.start())
            .map(|(start, &size)| Extent::new(start, size));
        let succ = self
            .alloc_addr
            .st_succ(ext.start())
            .map(|(start, &size)| Extent::new(start, size));
        if let Some(before) = pred {
            if before.end() == merged.start() {
                self.alloc_addr.st_delete(before.start());
                merged = Extent::new(before.start(), before.size() + merged.size());
            }
        }
        if let Some(after) = succ {
            if merged.end() == after.start() {
                self.alloc_addr.st_delete(after.start());
                merged = Extent::new(merged.start(), merged.size() + after.size());
            }
        }
        if merged != ext {
            self.alloc_addr.st_delete(ext.start());
            self.alloc_addr.st_insert(merged.start(), merged.size());
        }
    }

    /*
        integrity
    */

    /// Check every cross-table invariant. An inconsistency here is a bug in
    /// the engine, not bad input, hence the asserts. Debug builds run this
    /// after every mutation; release builds compile it out
    #[cfg(debug_assertions)]
    pub(crate) fn verify_integrity(&self) {
        let frees: Vec<Extent> = self.free_iter().collect();
        let allocs: Vec<Extent> = self.alloc_iter().collect();
        for ext in frees.iter().chain(allocs.iter()) {
            assert!(ext.end() <= self.total, "extent {ext} overruns the region");
        }
        for win in frees.windows(2) {
            assert!(
                win[0].end() < win[1].start(),
                "free extents {} and {} touch or overlap",
                win[0],
                win[1]
            );
        }
        for win in allocs.windows(2) {
            assert!(
                win[0].end() <= win[1].start(),
                "allocated extents {} and {} overlap",
                win[0],
                win[1]
            );
        }
        for free in &frees {
            for alloc in &allocs {
                assert!(
                    free.end() <= alloc.start() || alloc.end() <= free.start(),
                    "free {free} overlaps allocated {alloc}"
                );
            }
        }
        let covered: u64 = frees
            .iter()
            .chain(allocs.iter())
            .map(|ext| ext.size())
            .sum();
        assert_eq!(covered, self.total, "region coverage lost");
        // the two free tables must describe the same extent set
        let mut sized_entries = 0;
        for (size, starts) in self.free_size.st_iter_kv() {
            for &start in starts.iter() {
                assert_eq!(
                    self.free_addr.st_get(start),
                    Some(&size),
                    "free tables disagree on ({start}, {size})"
                );
            }
            sized_entries += starts.len();
        }
        assert_eq!(sized_entries, frees.len(), "free tables differ in size");
    }
    #[cfg(not(debug_assertions))]
    pub(crate) fn verify_integrity(&self) {}
}
