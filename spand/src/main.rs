/*
 * Created on Thu Feb 01 2024
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

//! # Spantable
//!
//! `spand` replays a trace of memory request/release operations against a
//! simulated fixed-capacity region, keeping the free and allocated extents
//! in stratified ordered indexes so that placement, split and coalesce all
//! run on ordered lookups. See the `engine` module for the interesting
//! parts.

use {
    crate::engine::{
        config::{self, ConfigReturn, Configuration},
        core::MemPool,
        error::RuntimeResult,
        trace,
    },
    libspan::{URL, VERSION},
    std::{env, time::Instant},
};

mod engine;
mod util;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
use jemallocator::Jemalloc;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
#[global_allocator]
/// Jemallocator - this is the default memory allocator for platforms other than msvc
static GLOBAL: Jemalloc = Jemalloc;

fn main() {
    env_logger::Builder::new()
        .parse_filters(&env::var("SPAN_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();
    println!("Spantable v{} | {}", VERSION, URL);
    let config = match config::check_configuration() {
        Ok(ConfigReturn::Config(config)) => config,
        Ok(ConfigReturn::HelpMessage(msg)) => {
            println!("{msg}");
            return;
        }
        Err(e) => {
            log::error!("{e}");
            util::exit_error()
        }
    };
    if let Err(e) = replay(config) {
        log::error!("{e}");
        util::exit_error()
    }
}

/// Run the configured trace to completion and report what happened
fn replay(config: Configuration) -> RuntimeResult<()> {
    let Some(path) = config.trace().map(ToOwned::to_owned) else {
        log::error!("no trace supplied. run `spand --help` for usage");
        util::exit_error()
    };
    log::info!(
        "replaying `{path}` with {} over a {} byte region (merge allocated: {})",
        config.strategy(),
        config.total_memory(),
        config.merge_allocated()
    );
    let ops = trace::read_from_file(&path)?;
    log::info!("loaded {} operations", ops.len());
    let mut pool = MemPool::new(&config);
    let started = Instant::now();
    let (mut served, mut refused) = (0usize, 0usize);
    for (at, op) in ops.iter().enumerate() {
        let outcome = pool.run(op);
        if outcome.ok() {
            served += 1;
        } else {
            refused += 1;
        }
        log::debug!("op {}: {op} -> {outcome}", at + 1);
    }
    log::info!(
        "replayed {} operations in {:.2?} ({served} served, {refused} refused)",
        ops.len(),
        started.elapsed()
    );
    let engine = pool.engine();
    log::info!(
        "final state: {} free extents, {} allocated extents, largest free block: {}",
        engine.free_count(),
        engine.alloc_count(),
        engine.max_free().map_or(0, |ext| ext.size())
    );
    Ok(())
}
