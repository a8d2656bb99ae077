/*
 * Created on Fri Feb 02 2024
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

#[cfg(test)]
pub mod test_utils;

use std::process;

const EXITCODE_ONE: i32 = 0x01;

pub fn exit_error() -> ! {
    process::exit(EXITCODE_ONE)
}

/// Returns a Result with the provided error
#[inline(never)]
#[cold]
pub fn err<T, E>(e: impl Into<E>) -> Result<T, E> {
    Err(e.into())
}
