/*
 * Created on Tue Mar 05 2024
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
    super::{Extent, ExtentEngine},
    core::{fmt, str::FromStr},
    serde::Deserialize,
};

/// The placement policy: which free extent services a request.
///
/// Ties between equal-sized candidates always go to the smallest start
/// address, so a trace replays identically run over run.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Deserialize)]
pub enum Strategy {
    /// Lowest-address free extent that fits
    #[default]
    #[serde(rename = "first-fit")]
    FirstFit,
    /// Smallest free extent that fits
    #[serde(rename = "best-fit")]
    BestFit,
    /// Largest free extent, whatever the request
    #[serde(rename = "worst-fit")]
    WorstFit,
}

impl Strategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FirstFit => "first-fit",
            Self::BestFit => "best-fit",
            Self::WorstFit => "worst-fit",
        }
    }
    /// Pick the free extent a request of `size` bytes should carve into.
    /// `None` when no candidate can hold it
    pub fn find(self, engine: &ExtentEngine, size: u64) -> Option<Extent> {
        match self {
            // address order across buckets is key order, so the first hit of
            // the ordered walk is the lowest-address fit
            Self::FirstFit => engine.free_iter().find(|ext| ext.size() >= size),
            Self::BestFit => engine.best_free(size),
            Self::WorstFit => engine.max_free().filter(|ext| ext.size() >= size),
        }
    }
}

impl FromStr for Strategy {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-fit" => Ok(Self::FirstFit),
            "best-fit" => Ok(Self::BestFit),
            "worst-fit" => Ok(Self::WorstFit),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
