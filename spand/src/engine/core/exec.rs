/*
 * Created on Wed Mar 13 2024
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
    super::{strategy::Strategy, ExtentEngine},
    crate::engine::{
        config::Configuration,
        trace::{OpKind, TraceOp},
    },
    core::fmt,
};

/// The sentinel a failed request reports. This is the only place in the
/// crate where absence turns into `-1`; everything below the facade speaks
/// `Option`/`Result`
pub const ALLOC_FAILURE: i64 = -1;

/// The public face of the allocator: validates operations, routes requests
/// through the configured placement strategy and hands the winners to the
/// extent engine.
///
/// `MemPool` is strictly single-threaded; a caller that shards a trace
/// across threads owns the serialization problem.
pub struct MemPool {
    engine: ExtentEngine,
    strategy: Strategy,
}

/// What one trace operation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome {
    /// A request resolved to this start address, or to [`ALLOC_FAILURE`]
    Requested(i64),
    /// Whether a release went through
    Released(bool),
}

impl OpOutcome {
    pub const fn ok(&self) -> bool {
        match self {
            Self::Requested(addr) => *addr != ALLOC_FAILURE,
            Self::Released(done) => *done,
        }
    }
}

impl fmt::Display for OpOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested(addr) if *addr == ALLOC_FAILURE => f.write_str("request failed"),
            Self::Requested(addr) => write!(f, "allocated at {addr}"),
            Self::Released(true) => f.write_str("released"),
            Self::Released(false) => f.write_str("release refused"),
        }
    }
}

impl MemPool {
    pub fn new(config: &Configuration) -> Self {
        Self::with_strategy(
            config.total_memory(),
            config.strategy(),
            config.merge_allocated(),
        )
    }
    pub fn with_strategy(total: u64, strategy: Strategy, merge_allocated: bool) -> Self {
        Self {
            engine: ExtentEngine::new(total, merge_allocated),
            strategy,
        }
    }
    pub fn engine(&self) -> &ExtentEngine {
        &self.engine
    }
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Structural validation. Requests need an in-range size, and either a
    /// free extent covering the wanted address range or (strategy requests)
    /// any free extent large enough. Releases are bounds-checked only: the
    /// containment question belongs to the deallocation path
    pub fn is_valid_op(&self, op: &TraceOp) -> bool {
        match op.kind() {
            OpKind::Request => {
                let Some(size) = self.checked_field(op.size()) else {
                    return false;
                };
                match op.addr() {
                    Some(addr) if addr < 0 => false,
                    Some(addr) => self.addr_request_fits(addr as u64, size),
                    None => self.engine.max_free().is_some_and(|ext| ext.size() >= size),
                }
            }
            OpKind::Release => {
                self.checked_field(op.addr()).is_some() && self.checked_field(op.size()).is_some()
            }
        }
    }

    /// Serve a request, returning the placed start address or
    /// [`ALLOC_FAILURE`]
    pub fn request(&mut self, op: &TraceOp) -> i64 {
        if op.kind() != OpKind::Request || !self.is_valid_op(op) {
            return ALLOC_FAILURE;
        }
        // both unwrapped by validation above
        let Some(size) = self.checked_field(op.size()) else {
            return ALLOC_FAILURE;
        };
        let start = match op.addr() {
            Some(addr) => addr as u64,
            None => match self.strategy.find(&self.engine, size) {
                Some(ext) => ext.start(),
                None => return ALLOC_FAILURE,
            },
        };
        match self.engine.allocate(start, size) {
            Ok(()) => start as i64,
            Err(_) => ALLOC_FAILURE,
        }
    }

    /// Serve a release. `false` when validation or the deallocation itself
    /// refuses the range
    pub fn release(&mut self, op: &TraceOp) -> bool {
        if op.kind() != OpKind::Release || !self.is_valid_op(op) {
            return false;
        }
        let (Some(addr), Some(size)) = (op.addr(), op.size()) else {
            return false;
        };
        self.engine.deallocate(addr as u64, size as u64).is_ok()
    }

    /// Dispatch one trace record
    pub fn run(&mut self, op: &TraceOp) -> OpOutcome {
        match op.kind() {
            OpKind::Request => OpOutcome::Requested(self.request(op)),
            OpKind::Release => OpOutcome::Released(self.release(op)),
        }
    }

    /// A present, non-negative field bounded by the region capacity
    fn checked_field(&self, field: Option<i64>) -> Option<u64> {
        let value = field?;
        (value >= 0 && value as u64 <= self.engine.total()).then_some(value as u64)
    }
    fn addr_request_fits(&self, addr: u64, size: u64) -> bool {
        self.engine
            .free_containing(addr)
            .is_some_and(|host| host.end() - addr >= size)
    }
}
