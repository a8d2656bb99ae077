/*
 * Created on Thu Feb 15 2024
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

use {
    super::{
        tree::IndexSTOrdTreeIterOrdKV, IndexBaseSpec, IndexSTOrdTree, IndexSTOrdTreeMulti,
        STOrdIndex, STOrdMultiIndex,
    },
    crate::engine::mem::{OrdSet, WordBitmap},
    core::marker::PhantomData,
};

/*
    The stratified index: a fixed array of lazily-built trees fronted by a
    monotone partition of the key universe and an occupancy bitmap. Because
    the partition is monotone, bucket order equals key order, so the ordered
    queries can hop across empty buckets with a bitmap scan instead of
    descending anything.

    Every occupied bucket holds a non-empty tree; draining a tree clears its
    slot and bitmap bit. The ordered queries rely on that.
*/

/// A monotone non-decreasing assignment of keys to bucket slots.
///
/// Monotonicity is the load-bearing property: if `a <= b` then
/// `slot(a) <= slot(b)`. Violate it and every cross-bucket scan is wrong.
pub trait KeyPartition {
    fn slot(key: u64, bits: u32, slots: usize) -> usize;
}

/// Uniform partition: `⌊k·B / 2^b⌋`. The fit for address keys
pub struct LinearPartition;

impl KeyPartition for LinearPartition {
    fn slot(key: u64, bits: u32, slots: usize) -> usize {
        // widen; key * slots can overflow u64 at the top of the universe
        let slot = ((key as u128 * slots as u128) >> bits) as usize;
        slot.min(slots - 1)
    }
}

/// Geometric partition: `⌊B·log₂(k) / b⌋`, with `k = 2^b` clamped down to
/// the top slot and keys below 2 pinned to slot 0. The fit for size keys,
/// which cluster at small values
pub struct Log2Partition;

impl KeyPartition for Log2Partition {
    fn slot(key: u64, bits: u32, slots: usize) -> usize {
        if bits == 0 || key <= 1 {
            return 0;
        }
        let cap = match 1u64.checked_shl(bits) {
            Some(limit) => limit - 1,
            None => u64::MAX,
        };
        let key = key.min(cap);
        let slot = (slots as f64 * (key as f64).log2() / bits as f64) as usize;
        slot.min(slots - 1)
    }
}

/// Bucket storage shared by both stratified flavors: the slot array plus the
/// occupancy bitmap, kept in lockstep
struct BucketArray<T> {
    slots: Box<[Option<T>]>,
    occupancy: WordBitmap,
}

impl<T> BucketArray<T> {
    fn new(slots: usize) -> Self {
        Self {
            slots: (0..slots).map(|_| None).collect(),
            occupancy: WordBitmap::new(slots),
        }
    }
    fn len(&self) -> usize {
        self.slots.len()
    }
    fn get(&self, slot: usize) -> Option<&T> {
        self.slots[slot].as_ref()
    }
    fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.slots[slot].as_mut()
    }
    fn or_init_with(&mut self, slot: usize, f: impl FnOnce() -> T) -> &mut T {
        let entry = &mut self.slots[slot];
        if entry.is_none() {
            self.occupancy.set(slot);
        }
        entry.get_or_insert_with(f)
    }
    fn clear(&mut self, slot: usize) {
        self.slots[slot] = None;
        self.occupancy.unset(slot);
    }
    fn first_occupied_from(&self, slot: usize) -> Option<usize> {
        self.occupancy.next_set(slot)
    }
    fn last_occupied_upto(&self, slot: usize) -> Option<usize> {
        self.occupancy.prev_set(slot)
    }
}

/// How many buckets a `bits`-wide universe gets: `2^(b/3)`
fn slot_count(bits: u32) -> usize {
    1usize << (bits / 3)
}

/// The stratified ordered map
pub struct IndexSTStratMap<V, P: KeyPartition> {
    buckets: BucketArray<IndexSTOrdTree<V>>,
    bits: u32,
    len: usize,
    _p: PhantomData<P>,
}

impl<V, P: KeyPartition> IndexSTStratMap<V, P> {
    #[inline(always)]
    fn slot_of(&self, key: u64) -> usize {
        P::slot(key, self.bits, self.buckets.len())
    }
    /// Number of occupied buckets (the bitmap population)
    #[cfg(test)]
    pub(super) fn occupied_buckets(&self) -> usize {
        let mut count = 0;
        let mut cursor = 0;
        while let Some(slot) = self.buckets.first_occupied_from(cursor) {
            count += 1;
            cursor = slot + 1;
        }
        count
    }
}

impl<V, P: KeyPartition> IndexBaseSpec for IndexSTStratMap<V, P> {
    fn idx_init(bits: u32) -> Self {
        Self {
            buckets: BucketArray::new(slot_count(bits)),
            bits,
            len: 0,
            _p: PhantomData,
        }
    }
    fn idx_len(&self) -> usize {
        self.len
    }
}

impl<V, P: KeyPartition> STOrdIndex<V> for IndexSTStratMap<V, P> {
    type IterOrdKV<'a>
        = IndexSTStratMapIterOrdKV<'a, V>
    where
        Self: 'a,
        V: 'a;
    fn st_insert(&mut self, key: u64, v: V) -> bool {
        let slot = self.slot_of(key);
        let tree = self
            .buckets
            .or_init_with(slot, || IndexSTOrdTree::idx_init(0));
        let fresh = tree.st_insert(key, v);
        self.len += fresh as usize;
        fresh
    }
    fn st_get(&self, key: u64) -> Option<&V> {
        self.buckets.get(self.slot_of(key))?.st_get(key)
    }
    fn st_get_mut(&mut self, key: u64) -> Option<&mut V> {
        let slot = self.slot_of(key);
        self.buckets.get_mut(slot)?.st_get_mut(key)
    }
    fn st_delete(&mut self, key: u64) -> bool {
        let slot = self.slot_of(key);
        let Some(tree) = self.buckets.get_mut(slot) else {
            return false;
        };
        let hit = tree.st_delete(key);
        if hit {
            self.len -= 1;
            if tree.idx_is_empty() {
                self.buckets.clear(slot);
            }
        }
        hit
    }
    fn st_min(&self) -> Option<(u64, &V)> {
        let slot = self.buckets.first_occupied_from(0)?;
        self.buckets.get(slot)?.st_min()
    }
    fn st_max(&self) -> Option<(u64, &V)> {
        let slot = self.buckets.last_occupied_upto(usize::MAX)?;
        self.buckets.get(slot)?.st_max()
    }
    fn st_succ(&self, key: u64) -> Option<(u64, &V)> {
        let slot = self.slot_of(key);
        if let Some(hit) = self.buckets.get(slot).and_then(|t| t.st_succ(key)) {
            return Some(hit);
        }
        // nothing above the key in its own bucket: the next occupied
        // bucket's minimum is the answer
        let next = self.buckets.first_occupied_from(slot + 1)?;
        self.buckets.get(next)?.st_min()
    }
    fn st_pred(&self, key: u64) -> Option<(u64, &V)> {
        let slot = self.slot_of(key);
        if let Some(hit) = self.buckets.get(slot).and_then(|t| t.st_pred(key)) {
            return Some(hit);
        }
        let prev = self.buckets.last_occupied_upto(slot.checked_sub(1)?)?;
        self.buckets.get(prev)?.st_max()
    }
    fn st_iter_kv(&self) -> Self::IterOrdKV<'_> {
        IndexSTStratMapIterOrdKV {
            buckets: &self.buckets,
            inner: None,
            cursor: 0,
        }
    }
}

/// Ascending iteration across bucket trees in slot order
pub struct IndexSTStratMapIterOrdKV<'a, V> {
    buckets: &'a BucketArray<IndexSTOrdTree<V>>,
    inner: Option<IndexSTOrdTreeIterOrdKV<'a, V>>,
    cursor: usize,
}

impl<'a, V> Iterator for IndexSTStratMapIterOrdKV<'a, V> {
    type Item = (u64, &'a V);
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(kv) = self.inner.as_mut().and_then(|it| it.next()) {
                return Some(kv);
            }
            let slot = self.buckets.first_occupied_from(self.cursor)?;
            self.inner = self.buckets.get(slot).map(|t| t.st_iter_kv());
            self.cursor = slot + 1;
        }
    }
}

/// The stratified ordered multimap
pub struct IndexSTStratMulti<P: KeyPartition> {
    buckets: BucketArray<IndexSTOrdTreeMulti>,
    bits: u32,
    len: usize,
    _p: PhantomData<P>,
}

impl<P: KeyPartition> IndexSTStratMulti<P> {
    #[inline(always)]
    fn slot_of(&self, key: u64) -> usize {
        P::slot(key, self.bits, self.buckets.len())
    }
}

impl<P: KeyPartition> IndexBaseSpec for IndexSTStratMulti<P> {
    fn idx_init(bits: u32) -> Self {
        Self {
            buckets: BucketArray::new(slot_count(bits)),
            bits,
            len: 0,
            _p: PhantomData,
        }
    }
    fn idx_len(&self) -> usize {
        self.len
    }
}

impl<P: KeyPartition> STOrdMultiIndex for IndexSTStratMulti<P> {
    type IterOrdKV<'a>
        = IndexSTStratMultiIterOrdKV<'a>
    where
        Self: 'a;
    fn st_insert_one(&mut self, key: u64, v: u64) -> bool {
        let slot = self.slot_of(key);
        let tree = self
            .buckets
            .or_init_with(slot, || IndexSTOrdTreeMulti::idx_init(0));
        let had_key = tree.st_get(key).is_some();
        let fresh = tree.st_insert_one(key, v);
        self.len += (!had_key) as usize;
        fresh
    }
    fn st_delete_one(&mut self, key: u64, v: u64) -> bool {
        let slot = self.slot_of(key);
        let Some(tree) = self.buckets.get_mut(slot) else {
            return false;
        };
        let hit = tree.st_delete_one(key, v);
        if hit && tree.st_get(key).is_none() {
            self.len -= 1;
            if tree.idx_is_empty() {
                self.buckets.clear(slot);
            }
        }
        hit
    }
    fn st_delete_all(&mut self, key: u64) -> bool {
        let slot = self.slot_of(key);
        let Some(tree) = self.buckets.get_mut(slot) else {
            return false;
        };
        let hit = tree.st_delete_all(key);
        if hit {
            self.len -= 1;
            if tree.idx_is_empty() {
                self.buckets.clear(slot);
            }
        }
        hit
    }
    fn st_get(&self, key: u64) -> Option<&OrdSet> {
        self.buckets.get(self.slot_of(key))?.st_get(key)
    }
    fn st_min(&self) -> Option<(u64, &OrdSet)> {
        let slot = self.buckets.first_occupied_from(0)?;
        self.buckets.get(slot)?.st_min()
    }
    fn st_max(&self) -> Option<(u64, &OrdSet)> {
        let slot = self.buckets.last_occupied_upto(usize::MAX)?;
        self.buckets.get(slot)?.st_max()
    }
    fn st_succ(&self, key: u64) -> Option<(u64, &OrdSet)> {
        let slot = self.slot_of(key);
        if let Some(hit) = self.buckets.get(slot).and_then(|t| t.st_succ(key)) {
            return Some(hit);
        }
        let next = self.buckets.first_occupied_from(slot + 1)?;
        self.buckets.get(next)?.st_min()
    }
    fn st_pred(&self, key: u64) -> Option<(u64, &OrdSet)> {
        let slot = self.slot_of(key);
        if let Some(hit) = self.buckets.get(slot).and_then(|t| t.st_pred(key)) {
            return Some(hit);
        }
        let prev = self.buckets.last_occupied_upto(slot.checked_sub(1)?)?;
        self.buckets.get(prev)?.st_max()
    }
    fn st_iter_kv(&self) -> Self::IterOrdKV<'_> {
        IndexSTStratMultiIterOrdKV {
            buckets: &self.buckets,
            inner: None,
            cursor: 0,
        }
    }
}

/// Ascending iteration across multimap bucket trees in slot order
pub struct IndexSTStratMultiIterOrdKV<'a> {
    buckets: &'a BucketArray<IndexSTOrdTreeMulti>,
    inner: Option<IndexSTOrdTreeIterOrdKV<'a, OrdSet>>,
    cursor: usize,
}

impl<'a> Iterator for IndexSTStratMultiIterOrdKV<'a> {
    type Item = (u64, &'a OrdSet);
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(kv) = self.inner.as_mut().and_then(|it| it.next()) {
                return Some(kv);
            }
            let slot = self.buckets.first_occupied_from(self.cursor)?;
            self.inner = self.buckets.get(slot).map(|t| t.st_iter_kv());
            self.cursor = slot + 1;
        }
    }
}
