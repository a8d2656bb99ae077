/*
 * Created on Thu Mar 21 2024
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

//! Trace input: one operation per non-blank line, three comma-separated
//! fields `op,size,addr`. `op` is 1 for a request and 0 for a release; an
//! empty field means "unspecified". Whitespace around fields is fine.
//!
//! Fields stay signed here. The facade owns the decision of what a negative
//! or missing value means; the parser only guarantees the line was
//! well-formed.

use {
    super::error::RuntimeResult,
    core::fmt,
    std::{fs, path::Path},
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum OpKind {
    Release = 0,
    Request = 1,
}

/// One trace record
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TraceOp {
    kind: OpKind,
    size: Option<i64>,
    addr: Option<i64>,
}

impl TraceOp {
    pub const fn new(kind: OpKind, size: Option<i64>, addr: Option<i64>) -> Self {
        Self { kind, size, addr }
    }
    /// A strategy-placed request
    pub const fn request(size: i64) -> Self {
        Self::new(OpKind::Request, Some(size), None)
    }
    /// A request pinned to an explicit address
    pub const fn request_at(size: i64, addr: i64) -> Self {
        Self::new(OpKind::Request, Some(size), Some(addr))
    }
    pub const fn release(addr: i64, size: i64) -> Self {
        Self::new(OpKind::Release, Some(size), Some(addr))
    }
    pub const fn kind(&self) -> OpKind {
        self.kind
    }
    pub const fn size(&self) -> Option<i64> {
        self.size
    }
    pub const fn addr(&self) -> Option<i64> {
        self.addr
    }
}

impl fmt::Display for TraceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind {
            OpKind::Request => "request",
            OpKind::Release => "release",
        };
        write!(f, "{name}(size=")?;
        match self.size {
            Some(size) => write!(f, "{size}")?,
            None => write!(f, "_")?,
        }
        match self.addr {
            Some(addr) => write!(f, ", addr={addr})"),
            None => write!(f, ")"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
/// A malformed trace line, reported with its 1-based line number
pub enum TraceError {
    /// not exactly three comma-separated fields
    FieldCount { line: usize, count: usize },
    /// a field that should be an integer is not
    BadInt { line: usize },
    /// an op code other than 0 or 1
    BadOpKind { line: usize },
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldCount { line, count } => {
                write!(f, "line {line}: expected 3 fields, found {count}")
            }
            Self::BadInt { line } => write!(f, "line {line}: invalid integer field"),
            Self::BadOpKind { line } => write!(f, "line {line}: op code must be 0 or 1"),
        }
    }
}

/// Parse a whole trace. Blank (or whitespace-only) lines are skipped
pub fn parse(raw: &str) -> Result<Vec<TraceOp>, TraceError> {
    let mut ops = Vec::new();
    for (at, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        ops.push(parse_record(line, at + 1)?);
    }
    Ok(ops)
}

pub fn read_from_file(path: impl AsRef<Path>) -> RuntimeResult<Vec<TraceOp>> {
    let raw = fs::read_to_string(path)?;
    Ok(parse(&raw)?)
}

fn parse_record(line: &str, at: usize) -> Result<TraceOp, TraceError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 3 {
        return Err(TraceError::FieldCount {
            line: at,
            count: fields.len(),
        });
    }
    let (kind, size, addr) = (fields[0], fields[1], fields[2]);
    let kind = match kind.parse::<i64>() {
        Ok(1) => OpKind::Request,
        Ok(0) => OpKind::Release,
        Ok(_) => return Err(TraceError::BadOpKind { line: at }),
        Err(_) => return Err(TraceError::BadInt { line: at }),
    };
    Ok(TraceOp::new(
        kind,
        int_field(size, at)?,
        int_field(addr, at)?,
    ))
}

fn int_field(field: &str, at: usize) -> Result<Option<i64>, TraceError> {
    if field.is_empty() {
        return Ok(None);
    }
    field
        .parse::<i64>()
        .map(Some)
        .map_err(|_| TraceError::BadInt { line: at })
}
