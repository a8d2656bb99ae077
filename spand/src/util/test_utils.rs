/*
 * Created on Wed Feb 07 2024
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

use rand::{distributions::uniform::SampleUniform, Rng};

/// Generates a random boolean with the given probability of being true
pub fn random_bool(p: f64, rng: &mut impl Rng) -> bool {
    rng.gen_bool(p)
}

/// Generate a random number in `[min, max)`
pub fn random_number<T: SampleUniform + PartialOrd>(min: T, max: T, rng: &mut impl Rng) -> T {
    rng.gen_range(min..max)
}

/// Pick one element of a slice
pub fn random_elem<'a, T>(v: &'a [T], rng: &mut impl Rng) -> Option<&'a T> {
    if v.is_empty() {
        None
    } else {
        v.get(random_number(0, v.len(), rng))
    }
}
