/*
 * Created on Sun Feb 04 2024
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
    super::{config::ConfigError, trace::TraceError},
    core::fmt,
};

pub type AllocResult<T> = Result<T, AllocError>;
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
/// Why an allocator operation refused to run. These never escape the
/// facade: `MemPool` folds them into its sentinel returns
pub enum AllocError {
    /// no free extent can hold the request
    NoFit,
    /// parameters out of range for the region
    IllegalRequest,
    /// the released range is not contained in any single allocated extent
    UntrackedRelease,
}

#[derive(Debug)]
/// A driver-level failure: anything that stops a run before or outside the
/// allocator itself
pub enum RuntimeError {
    /// bad or conflicting configuration
    Config(ConfigError),
    /// malformed trace input
    Trace(TraceError),
    /// underlying I/O failure
    Io(std::io::Error),
}

enum_impls! {
    RuntimeError => {
        ConfigError as Config,
        TraceError as Trace,
        std::io::Error as Io,
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::Trace(e) => write!(f, "trace error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}
