/*
 * Created on Sat Feb 10 2024
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
    super::{IndexBaseSpec, STOrdIndex, STOrdMultiIndex},
    crate::engine::mem::OrdSet,
    core::cmp::Ordering,
};

/*
    The per-bucket ordered map. An AVL tree over boxed links; the stratified
    layer above assumes roughly logarithmic bucket depth, so the rotations are
    not optional. All the recursive plumbing lives in free functions that take
    and return links, which keeps ownership moves explicit and the borrow
    checker quiet.
*/

type Link<V> = Option<Box<Node<V>>>;

#[derive(Debug)]
struct Node<V> {
    key: u64,
    v: V,
    h: u8,
    l: Link<V>,
    r: Link<V>,
}

impl<V> Node<V> {
    fn new(key: u64, v: V) -> Self {
        Self {
            key,
            v,
            h: 1,
            l: None,
            r: None,
        }
    }
}

#[inline(always)]
fn height<V>(link: &Link<V>) -> u8 {
    link.as_ref().map_or(0, |n| n.h)
}

#[inline(always)]
fn fix_height<V>(n: &mut Node<V>) {
    n.h = 1 + height(&n.l).max(height(&n.r));
}

#[inline(always)]
fn balance_of<V>(n: &Node<V>) -> i16 {
    height(&n.l) as i16 - height(&n.r) as i16
}

fn rotate_right<V>(mut n: Box<Node<V>>) -> Box<Node<V>> {
    match n.l.take() {
        Some(mut pivot) => {
            n.l = pivot.r.take();
            fix_height(&mut n);
            pivot.r = Some(n);
            fix_height(&mut pivot);
            pivot
        }
        None => n,
    }
}

fn rotate_left<V>(mut n: Box<Node<V>>) -> Box<Node<V>> {
    match n.r.take() {
        Some(mut pivot) => {
            n.r = pivot.l.take();
            fix_height(&mut n);
            pivot.l = Some(n);
            fix_height(&mut pivot);
            pivot
        }
        None => n,
    }
}

fn rebalance<V>(mut n: Box<Node<V>>) -> Box<Node<V>> {
    fix_height(&mut n);
    let bf = balance_of(&n);
    if bf > 1 {
        if n.l.as_ref().is_some_and(|l| balance_of(l) < 0) {
            n.l = n.l.take().map(rotate_left);
        }
        rotate_right(n)
    } else if bf < -1 {
        if n.r.as_ref().is_some_and(|r| balance_of(r) > 0) {
            n.r = n.r.take().map(rotate_right);
        }
        rotate_left(n)
    } else {
        n
    }
}

/// Upsert; the bool is true when a fresh node was created
fn put<V>(link: Link<V>, key: u64, v: V) -> (Box<Node<V>>, bool) {
    match link {
        None => (Box::new(Node::new(key, v)), true),
        Some(mut n) => {
            let fresh = match key.cmp(&n.key) {
                Ordering::Less => {
                    let (child, fresh) = put(n.l.take(), key, v);
                    n.l = Some(child);
                    fresh
                }
                Ordering::Greater => {
                    let (child, fresh) = put(n.r.take(), key, v);
                    n.r = Some(child);
                    fresh
                }
                Ordering::Equal => {
                    n.v = v;
                    false
                }
            };
            (rebalance(n), fresh)
        }
    }
}

/// Detach the minimum node of the subtree, rebalancing the path behind it.
/// The detached node comes back childless
fn take_min<V>(mut n: Box<Node<V>>) -> (Link<V>, Box<Node<V>>) {
    match n.l.take() {
        Some(l) => {
            let (rest, min) = take_min(l);
            n.l = rest;
            (Some(rebalance(n)), min)
        }
        None => {
            let rest = n.r.take();
            (rest, n)
        }
    }
}

/// Delete `key`, returning the evicted value. A node with two children is
/// replaced by its in-order successor pulled out of the right subtree
fn remove<V>(link: Link<V>, key: u64) -> (Link<V>, Option<V>) {
    let Some(mut n) = link else {
        return (None, None);
    };
    let evicted = match key.cmp(&n.key) {
        Ordering::Less => {
            let (child, evicted) = remove(n.l.take(), key);
            n.l = child;
            evicted
        }
        Ordering::Greater => {
            let (child, evicted) = remove(n.r.take(), key);
            n.r = child;
            evicted
        }
        Ordering::Equal => {
            return match (n.l.take(), n.r.take()) {
                (None, rest) => (rest, Some(n.v)),
                (rest, None) => (rest, Some(n.v)),
                (l, Some(r)) => {
                    let (rest, mut succ) = take_min(r);
                    succ.l = l;
                    succ.r = rest;
                    (Some(rebalance(succ)), Some(n.v))
                }
            };
        }
    };
    (Some(rebalance(n)), evicted)
}

/// The per-bucket ordered map: an AVL tree keyed by `u64`
#[derive(Debug)]
pub struct IndexSTOrdTree<V> {
    root: Link<V>,
    len: usize,
}

impl<V> IndexBaseSpec for IndexSTOrdTree<V> {
    fn idx_init(_bits: u32) -> Self {
        Self { root: None, len: 0 }
    }
    fn idx_len(&self) -> usize {
        self.len
    }
}

impl<V> STOrdIndex<V> for IndexSTOrdTree<V> {
    type IterOrdKV<'a>
        = IndexSTOrdTreeIterOrdKV<'a, V>
    where
        Self: 'a,
        V: 'a;
    fn st_insert(&mut self, key: u64, v: V) -> bool {
        let (root, fresh) = put(self.root.take(), key, v);
        self.root = Some(root);
        self.len += fresh as usize;
        fresh
    }
    fn st_get(&self, key: u64) -> Option<&V> {
        let mut cur = self.root.as_deref();
        while let Some(n) = cur {
            match key.cmp(&n.key) {
                Ordering::Less => cur = n.l.as_deref(),
                Ordering::Greater => cur = n.r.as_deref(),
                Ordering::Equal => return Some(&n.v),
            }
        }
        None
    }
    fn st_get_mut(&mut self, key: u64) -> Option<&mut V> {
        let mut cur = self.root.as_deref_mut();
        while let Some(n) = cur {
            match key.cmp(&n.key) {
                Ordering::Less => cur = n.l.as_deref_mut(),
                Ordering::Greater => cur = n.r.as_deref_mut(),
                Ordering::Equal => return Some(&mut n.v),
            }
        }
        None
    }
    fn st_delete(&mut self, key: u64) -> bool {
        let (root, evicted) = remove(self.root.take(), key);
        self.root = root;
        let hit = evicted.is_some();
        self.len -= hit as usize;
        hit
    }
    fn st_min(&self) -> Option<(u64, &V)> {
        let mut n = self.root.as_deref()?;
        while let Some(l) = n.l.as_deref() {
            n = l;
        }
        Some((n.key, &n.v))
    }
    fn st_max(&self) -> Option<(u64, &V)> {
        let mut n = self.root.as_deref()?;
        while let Some(r) = n.r.as_deref() {
            n = r;
        }
        Some((n.key, &n.v))
    }
    fn st_succ(&self, key: u64) -> Option<(u64, &V)> {
        let mut cur = self.root.as_deref();
        let mut succ = None;
        while let Some(n) = cur {
            if key < n.key {
                // candidate; anything closer sits in the left subtree
                succ = Some(n);
                cur = n.l.as_deref();
            } else {
                cur = n.r.as_deref();
            }
        }
        succ.map(|n| (n.key, &n.v))
    }
    fn st_pred(&self, key: u64) -> Option<(u64, &V)> {
        let mut cur = self.root.as_deref();
        let mut pred = None;
        while let Some(n) = cur {
            if key > n.key {
                pred = Some(n);
                cur = n.r.as_deref();
            } else {
                cur = n.l.as_deref();
            }
        }
        pred.map(|n| (n.key, &n.v))
    }
    fn st_iter_kv(&self) -> Self::IterOrdKV<'_> {
        IndexSTOrdTreeIterOrdKV::new(&self.root)
    }
}

#[cfg(test)]
impl<V> IndexSTOrdTree<V> {
    /// Walk the whole tree checking the AVL shape invariants
    pub(super) fn assert_balanced(&self) {
        fn walk<V>(link: &Link<V>) -> u8 {
            match link {
                None => 0,
                Some(n) => {
                    let lh = walk(&n.l);
                    let rh = walk(&n.r);
                    assert!((lh as i16 - rh as i16).abs() <= 1, "unbalanced at {}", n.key);
                    assert_eq!(n.h, 1 + lh.max(rh), "stale height at {}", n.key);
                    n.h
                }
            }
        }
        walk(&self.root);
    }
}

/// Ascending in-order iteration over a tree, driven by an explicit spine
/// stack
pub struct IndexSTOrdTreeIterOrdKV<'a, V> {
    spine: Vec<&'a Node<V>>,
}

impl<'a, V> IndexSTOrdTreeIterOrdKV<'a, V> {
    fn new(root: &'a Link<V>) -> Self {
        let mut slf = Self { spine: Vec::new() };
        slf.descend(root.as_deref());
        slf
    }
    fn descend(&mut self, mut cur: Option<&'a Node<V>>) {
        while let Some(n) = cur {
            self.spine.push(n);
            cur = n.l.as_deref();
        }
    }
}

impl<'a, V> Iterator for IndexSTOrdTreeIterOrdKV<'a, V> {
    type Item = (u64, &'a V);
    fn next(&mut self) -> Option<Self::Item> {
        let n = self.spine.pop()?;
        self.descend(n.r.as_deref());
        Some((n.key, &n.v))
    }
}

/// The per-bucket ordered multimap: the same tree with [`OrdSet`] value
/// slots. An empty set is never stored
#[derive(Debug)]
pub struct IndexSTOrdTreeMulti {
    tree: IndexSTOrdTree<OrdSet>,
}

impl IndexBaseSpec for IndexSTOrdTreeMulti {
    fn idx_init(bits: u32) -> Self {
        Self {
            tree: IndexSTOrdTree::idx_init(bits),
        }
    }
    fn idx_len(&self) -> usize {
        self.tree.idx_len()
    }
}

impl STOrdMultiIndex for IndexSTOrdTreeMulti {
    type IterOrdKV<'a>
        = IndexSTOrdTreeIterOrdKV<'a, OrdSet>
    where
        Self: 'a;
    fn st_insert_one(&mut self, key: u64, v: u64) -> bool {
        match self.tree.st_get_mut(key) {
            Some(set) => set.insert(v),
            None => {
                self.tree.st_insert(key, OrdSet::of(v));
                true
            }
        }
    }
    fn st_delete_one(&mut self, key: u64, v: u64) -> bool {
        let Some(set) = self.tree.st_get_mut(key) else {
            return false;
        };
        let hit = set.remove(v);
        if hit && set.is_empty() {
            self.tree.st_delete(key);
        }
        hit
    }
    fn st_delete_all(&mut self, key: u64) -> bool {
        self.tree.st_delete(key)
    }
    fn st_get(&self, key: u64) -> Option<&OrdSet> {
        self.tree.st_get(key)
    }
    fn st_min(&self) -> Option<(u64, &OrdSet)> {
        self.tree.st_min()
    }
    fn st_max(&self) -> Option<(u64, &OrdSet)> {
        self.tree.st_max()
    }
    fn st_succ(&self, key: u64) -> Option<(u64, &OrdSet)> {
        self.tree.st_succ(key)
    }
    fn st_pred(&self, key: u64) -> Option<(u64, &OrdSet)> {
        self.tree.st_pred(key)
    }
    fn st_iter_kv(&self) -> Self::IterOrdKV<'_> {
        self.tree.st_iter_kv()
    }
}
