/*
 * Created on Mon Feb 05 2024
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

const SHIFT: usize = u64::BITS.trailing_zeros() as usize;
const MASK: usize = u64::BITS as usize - 1;

/// A fixed-width bitmap over `u64` words with directional scans.
///
/// The scans skip clear words in one comparison each, so walking across a
/// mostly-empty map costs `O(len / 64)` in the worst case and usually far
/// less. Bit indexes out of range are a caller bug and will panic in the
/// word lookup.
#[derive(Debug, Clone)]
pub struct WordBitmap {
    words: Box<[u64]>,
    len: usize,
}

impl WordBitmap {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(u64::BITS as usize)].into_boxed_slice(),
            len,
        }
    }
    pub const fn len(&self) -> usize {
        self.len
    }
    #[inline(always)]
    pub fn set(&mut self, idx: usize) {
        self.words[idx >> SHIFT] |= 1 << (idx & MASK);
    }
    #[inline(always)]
    pub fn unset(&mut self, idx: usize) {
        self.words[idx >> SHIFT] &= !(1 << (idx & MASK));
    }
    #[inline(always)]
    pub fn test(&self, idx: usize) -> bool {
        self.words[idx >> SHIFT] & (1 << (idx & MASK)) != 0
    }
    pub fn any_set(&self) -> bool {
        self.words.iter().any(|w| *w != 0)
    }
    /// Index of the first set bit at or above `from`
    pub fn next_set(&self, from: usize) -> Option<usize> {
        if from >= self.len {
            return None;
        }
        let mut widx = from >> SHIFT;
        // drop the bits below `from` in the first word
        let mut word = self.words[widx] & (u64::MAX << (from & MASK));
        loop {
            if word != 0 {
                let idx = (widx << SHIFT) + word.trailing_zeros() as usize;
                return (idx < self.len).then_some(idx);
            }
            widx += 1;
            if widx == self.words.len() {
                return None;
            }
            word = self.words[widx];
        }
    }
    /// Index of the last set bit at or below `upto`
    pub fn prev_set(&self, upto: usize) -> Option<usize> {
        let upto = upto.min(self.len.checked_sub(1)?);
        let mut widx = upto >> SHIFT;
        // drop the bits above `upto` in the first word
        let mut word = self.words[widx] & (u64::MAX >> (MASK - (upto & MASK)));
        loop {
            if word != 0 {
                return Some((widx << SHIFT) + MASK - word.leading_zeros() as usize);
            }
            if widx == 0 {
                return None;
            }
            widx -= 1;
            word = self.words[widx];
        }
    }
}
