/*
 * Created on Thu Feb 08 2024
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

//! Ordered indexes over a `u64` key universe.
//!
//! Two layers live here: the per-bucket AVL trees ([`tree`]) and the
//! stratified (two-level bucketed) indexes ([`strat`]) that dispatch to them
//! through a monotone partition of the key universe. The extent engine only
//! ever touches the stratified flavor; the trees are its bucket payload.
//!
//! Lookups that miss return `None`. No sentinel tuples anywhere in this
//! layer; the facade is the only place allowed to mint them.

mod strat;
mod tree;


use crate::engine::mem::OrdSet;

pub use {
    strat::{IndexSTStratMap, IndexSTStratMulti, KeyPartition, LinearPartition, Log2Partition},
    tree::{IndexSTOrdTree, IndexSTOrdTreeMulti},
};

// re-exports for the extent engine
/// Address-keyed table: start address -> extent size
pub type AddrTable = IndexSTStratMap<u64, LinearPartition>;
/// Size-keyed table: extent size -> set of start addresses
pub type SizeTable = IndexSTStratMulti<Log2Partition>;

/// The base spec for any index in this crate
pub trait IndexBaseSpec: Sized {
    /// Initialize an empty instance for a `bits`-wide key universe.
    ///
    /// Implementations that do not partition the universe are free to ignore
    /// the width.
    fn idx_init(bits: u32) -> Self;
    /// Number of keys currently held
    fn idx_len(&self) -> usize;
    fn idx_is_empty(&self) -> bool {
        self.idx_len() == 0
    }
}

/// An ordered single-threaded map over `u64` keys
pub trait STOrdIndex<V>: IndexBaseSpec {
    /// An iterator over the entries in ascending key order
    type IterOrdKV<'a>: Iterator<Item = (u64, &'a V)>
    where
        Self: 'a,
        V: 'a;
    /// Upsert. Returns true if the key was fresh, false if the value of an
    /// existing key was replaced
    fn st_insert(&mut self, key: u64, v: V) -> bool;
    fn st_get(&self, key: u64) -> Option<&V>;
    fn st_get_mut(&mut self, key: u64) -> Option<&mut V>;
    /// Returns true iff the key was present
    fn st_delete(&mut self, key: u64) -> bool;
    fn st_min(&self) -> Option<(u64, &V)>;
    fn st_max(&self) -> Option<(u64, &V)>;
    /// Smallest key strictly greater than `key` (which itself may or may not
    /// be present)
    fn st_succ(&self, key: u64) -> Option<(u64, &V)>;
    /// Largest key strictly less than `key`
    fn st_pred(&self, key: u64) -> Option<(u64, &V)>;
    fn st_iter_kv(&self) -> Self::IterOrdKV<'_>;
}

/// An ordered single-threaded multimap: every key holds a set of secondary
/// `u64`s. An empty set is never stored; draining a key's set removes the key
pub trait STOrdMultiIndex: IndexBaseSpec {
    /// An iterator over the entries in ascending key order
    type IterOrdKV<'a>: Iterator<Item = (u64, &'a OrdSet)>
    where
        Self: 'a;
    /// Append `v` to the set under `key` (created on first use). Returns
    /// false if the pair was already present
    fn st_insert_one(&mut self, key: u64, v: u64) -> bool;
    /// Remove `v` from the set under `key`; the key itself goes away when
    /// its set drains. Returns true iff the pair was present
    fn st_delete_one(&mut self, key: u64, v: u64) -> bool;
    /// Remove the key with its whole set
    fn st_delete_all(&mut self, key: u64) -> bool;
    fn st_get(&self, key: u64) -> Option<&OrdSet>;
    fn st_min(&self) -> Option<(u64, &OrdSet)>;
    fn st_max(&self) -> Option<(u64, &OrdSet)>;
    fn st_succ(&self, key: u64) -> Option<(u64, &OrdSet)>;
    fn st_pred(&self, key: u64) -> Option<(u64, &OrdSet)>;
    fn st_iter_kv(&self) -> Self::IterOrdKV<'_>;
}
