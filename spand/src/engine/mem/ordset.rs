/*
 * Created on Tue Feb 06 2024
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

use core::slice;

/// A sorted, duplicate-free set of `u64`s backed by a vec.
///
/// This is the value slot of the size multimap. Keeping it sorted buys two
/// things: membership ops are binary searches, and `first()` is always the
/// smallest element, which is the tie-break the placement strategies
/// advertise for equal-sized candidates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrdSet {
    e: Vec<u64>,
}

impl OrdSet {
    pub const fn new() -> Self {
        Self { e: Vec::new() }
    }
    pub fn of(v: u64) -> Self {
        Self { e: vec![v] }
    }
    pub fn len(&self) -> usize {
        self.e.len()
    }
    pub fn is_empty(&self) -> bool {
        self.e.is_empty()
    }
    pub fn contains(&self, v: u64) -> bool {
        self.e.binary_search(&v).is_ok()
    }
    /// Smallest element, if any
    pub fn first(&self) -> Option<u64> {
        self.e.first().copied()
    }
    /// Returns false if `v` was already present
    pub fn insert(&mut self, v: u64) -> bool {
        match self.e.binary_search(&v) {
            Ok(_) => false,
            Err(at) => {
                self.e.insert(at, v);
                true
            }
        }
    }
    /// Returns true if `v` was present and removed
    pub fn remove(&mut self, v: u64) -> bool {
        match self.e.binary_search(&v) {
            Ok(at) => {
                self.e.remove(at);
                true
            }
            Err(_) => false,
        }
    }
    /// Ascending iteration
    pub fn iter(&self) -> slice::Iter<'_, u64> {
        self.e.iter()
    }
    pub fn as_slice(&self) -> &[u64] {
        &self.e
    }
}
