/*
 * Created on Sun Mar 17 2024
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
    super::{ExtentEngine, MemPool, Strategy, ALLOC_FAILURE},
    crate::engine::trace::TraceOp,
};

const TOTAL: u64 = 1024;

fn pool(strategy: Strategy) -> MemPool {
    MemPool::with_strategy(TOTAL, strategy, true)
}
fn frees(pool: &MemPool) -> Vec<(u64, u64)> {
    pool.engine()
        .free_iter()
        .map(|ext| (ext.start(), ext.size()))
        .collect()
}
fn allocs(pool: &MemPool) -> Vec<(u64, u64)> {
    pool.engine()
        .alloc_iter()
        .map(|ext| (ext.start(), ext.size()))
        .collect()
}

mod engine {
    use {
        super::super::universe_bits,
        super::*,
        crate::engine::error::AllocError,
    };

    #[test]
    fn universe_width() {
        assert_eq!(universe_bits(1), 0);
        assert_eq!(universe_bits(2), 1);
        assert_eq!(universe_bits(1024), 10);
        assert_eq!(universe_bits(1025), 11);
        assert_eq!(universe_bits(u64::MAX), 64);
    }
    #[test]
    fn fresh_engine_is_one_free_extent() {
        let engine = ExtentEngine::new(TOTAL, true);
        let all: Vec<_> = engine.free_iter().collect();
        assert_eq!(all.len(), 1);
        assert_eq!((all[0].start(), all[0].size()), (0, TOTAL));
        assert_eq!(engine.alloc_count(), 0);
        engine.verify_integrity();
    }
    #[test]
    fn containing_queries() {
        let mut engine = ExtentEngine::new(TOTAL, true);
        engine.allocate(100, 50).unwrap();
        // free: [0,100) and [150,1024)
        assert_eq!(engine.free_containing(0).map(|e| e.start()), Some(0));
        assert_eq!(engine.free_containing(99).map(|e| e.start()), Some(0));
        assert_eq!(engine.free_containing(100), None);
        assert_eq!(engine.free_containing(149), None);
        assert_eq!(engine.free_containing(150).map(|e| e.start()), Some(150));
        assert_eq!(engine.alloc_containing(120).map(|e| e.start()), Some(100));
        assert_eq!(engine.alloc_containing(150), None);
    }
    #[test]
    fn allocate_rejects_uncovered_ranges() {
        let mut engine = ExtentEngine::new(TOTAL, true);
        engine.allocate(0, 100).unwrap();
        multi_assert_eq!(
            engine.allocate(50, 10),          // inside an allocation
            engine.allocate(2000, 1),         // outside the region
            engine.allocate(1000, 100)        // overruns the region
            => Err(AllocError::NoFit)
        );
        // failed attempts must not have touched anything
        assert_eq!(engine.free_count(), 1);
        engine.verify_integrity();
    }
    #[test]
    fn deallocate_rejects_untracked_ranges() {
        let mut engine = ExtentEngine::new(TOTAL, true);
        engine.allocate(0, 100).unwrap();
        multi_assert_eq!(
            engine.deallocate(500, 10),       // free space
            engine.deallocate(50, 100),       // overruns the allocation
            engine.deallocate(100, 1)         // one past the end
            => Err(AllocError::UntrackedRelease)
        );
        engine.verify_integrity();
    }
}

mod scenarios {
    use super::*;

    #[test]
    fn trailing_split() {
        let mut pool = pool(Strategy::FirstFit);
        assert_eq!(pool.request(&TraceOp::request(100)), 0);
        assert_eq!(frees(&pool), [(100, 924)]);
        assert!(pool.release(&TraceOp::release(0, 100)));
        assert_eq!(frees(&pool), [(0, 1024)]);
    }
    #[test]
    fn two_block_coalesce() {
        let mut pool = pool(Strategy::FirstFit);
        assert_eq!(pool.request(&TraceOp::request(100)), 0);
        assert_eq!(pool.request(&TraceOp::request(100)), 100);
        assert!(pool.release(&TraceOp::release(0, 100)));
        assert!(pool.release(&TraceOp::release(100, 100)));
        assert_eq!(frees(&pool), [(0, 1024)]);
    }
    #[test]
    fn best_fit_picks_tight() {
        let mut pool = pool(Strategy::BestFit);
        assert_eq!(pool.request(&TraceOp::request(100)), 0);
        assert_eq!(pool.request(&TraceOp::request(50)), 100);
        assert_eq!(pool.request(&TraceOp::request(200)), 150);
        assert!(pool.release(&TraceOp::release(100, 50)));
        assert!(pool.release(&TraceOp::release(0, 100)));
        assert_eq!(frees(&pool), [(0, 150), (350, 674)]);
        // 150 is the smallest fit for 50, and its slot starts at 0
        assert_eq!(pool.request(&TraceOp::request(50)), 0);
        // nothing can hold 700 anymore
        assert_eq!(pool.request(&TraceOp::request(700)), ALLOC_FAILURE);
    }
    #[test]
    fn worst_fit_picks_largest() {
        let mut pool = pool(Strategy::WorstFit);
        // free: (0,100), (200,300), (600,424)
        assert_eq!(pool.request(&TraceOp::request_at(100, 100)), 100);
        assert_eq!(pool.request(&TraceOp::request_at(100, 500)), 500);
        assert_eq!(frees(&pool), [(0, 100), (200, 300), (600, 424)]);
        assert_eq!(pool.request(&TraceOp::request(50)), 600);
    }
    #[test]
    fn explicit_addr_inside_free_extent() {
        let mut pool = pool(Strategy::FirstFit);
        assert_eq!(pool.request(&TraceOp::request_at(100, 500)), 500);
        assert_eq!(frees(&pool), [(0, 500), (600, 424)]);
    }
    #[test]
    fn explicit_addr_rejection() {
        let mut pool = pool(Strategy::FirstFit);
        assert_eq!(pool.request(&TraceOp::request_at(100, 0)), 0);
        // 25 sits in the allocated range now
        assert_eq!(pool.request(&TraceOp::request_at(50, 25)), ALLOC_FAILURE);
        assert_eq!(frees(&pool), [(100, 924)]);
    }
}

mod facade {
    use super::*;

    #[test]
    fn request_needs_a_size() {
        let mut pool = pool(Strategy::FirstFit);
        let no_size = TraceOp::new(crate::engine::trace::OpKind::Request, None, None);
        assert_eq!(pool.request(&no_size), ALLOC_FAILURE);
    }
    #[test]
    fn out_of_range_parameters_are_refused() {
        let mut pool = pool(Strategy::FirstFit);
        multi_assert_eq!(
            pool.request(&TraceOp::request(-1)),
            pool.request(&TraceOp::request(TOTAL as i64 + 1)),
            pool.request(&TraceOp::request_at(10, -3)),
            pool.request(&TraceOp::request_at(10, TOTAL as i64 + 1))
            => ALLOC_FAILURE
        );
        assert!(!pool.release(&TraceOp::release(-1, 10)));
        assert!(!pool.release(&TraceOp::release(0, TOTAL as i64 + 1)));
        assert!(!pool.release(&TraceOp::new(
            crate::engine::trace::OpKind::Release,
            None,
            Some(0)
        )));
        assert_eq!(frees(&pool), [(0, 1024)]);
    }
    #[test]
    fn release_of_unallocated_is_refused() {
        let mut pool = pool(Strategy::FirstFit);
        assert!(!pool.release(&TraceOp::release(0, 10)));
        assert_eq!(pool.request(&TraceOp::request(100)), 0);
        // overruns the allocated extent
        assert!(!pool.release(&TraceOp::release(50, 100)));
        assert_eq!(frees(&pool), [(100, 924)]);
        assert_eq!(allocs(&pool), [(0, 100)]);
    }
    #[test]
    fn release_carves_a_subrange() {
        let mut pool = pool(Strategy::FirstFit);
        assert_eq!(pool.request(&TraceOp::request(300)), 0);
        assert!(pool.release(&TraceOp::release(100, 50)));
        assert_eq!(allocs(&pool), [(0, 100), (150, 150)]);
        assert_eq!(frees(&pool), [(100, 50), (300, 724)]);
    }
    #[test]
    fn allocated_merge_is_configurable() {
        let mut merging = MemPool::with_strategy(TOTAL, Strategy::FirstFit, true);
        merging.request(&TraceOp::request(100));
        merging.request(&TraceOp::request(100));
        assert_eq!(allocs(&merging), [(0, 200)]);
        // the paired release still works against the merged parent
        assert!(merging.release(&TraceOp::release(0, 100)));
        assert!(merging.release(&TraceOp::release(100, 100)));
        assert_eq!(frees(&merging), [(0, 1024)]);

        let mut tracking = MemPool::with_strategy(TOTAL, Strategy::FirstFit, false);
        tracking.request(&TraceOp::request(100));
        tracking.request(&TraceOp::request(100));
        assert_eq!(allocs(&tracking), [(0, 100), (100, 100)]);
        assert!(tracking.release(&TraceOp::release(0, 100)));
        assert!(tracking.release(&TraceOp::release(100, 100)));
        assert_eq!(frees(&tracking), [(0, 1024)]);
    }
    #[test]
    fn zero_sized_ops_are_validated_noops() {
        let mut pool = pool(Strategy::FirstFit);
        assert_eq!(pool.request(&TraceOp::request(0)), 0);
        assert_eq!(frees(&pool), [(0, 1024)]);
        assert_eq!(pool.request(&TraceOp::request(100)), 0);
        assert_eq!(pool.request(&TraceOp::request_at(0, 500)), 500);
        assert_eq!(frees(&pool), [(100, 924)]);
        assert!(pool.release(&TraceOp::release(50, 0)));
        assert_eq!(allocs(&pool), [(0, 100)]);
    }
    #[test]
    fn run_dispatches_by_kind() {
        use super::super::OpOutcome;
        let mut pool = pool(Strategy::FirstFit);
        assert_eq!(
            pool.run(&TraceOp::request(64)),
            OpOutcome::Requested(0)
        );
        assert_eq!(
            pool.run(&TraceOp::release(0, 64)),
            OpOutcome::Released(true)
        );
        assert_eq!(
            pool.run(&TraceOp::release(0, 64)),
            OpOutcome::Released(false)
        );
    }
}

mod strategy {
    use super::*;

    /// free: (0,100), (200,300), (600,424)
    fn fragmented(strategy: Strategy) -> MemPool {
        let mut pool = pool(strategy);
        assert_eq!(pool.request(&TraceOp::request_at(100, 100)), 100);
        assert_eq!(pool.request(&TraceOp::request_at(100, 500)), 500);
        assert_eq!(frees(&pool), [(0, 100), (200, 300), (600, 424)]);
        pool
    }

    #[test]
    fn first_fit_takes_the_lowest_address() {
        let mut pool = fragmented(Strategy::FirstFit);
        // (0,100) is too small: the next candidate in address order wins,
        // even though (600,424) is no worse a fit
        assert_eq!(pool.request(&TraceOp::request(150)), 200);
        assert_eq!(pool.request(&TraceOp::request(50)), 0);
    }
    #[test]
    fn best_fit_never_picks_a_looser_candidate() {
        let mut pool = fragmented(Strategy::BestFit);
        let request = 250;
        let tightest = pool
            .engine()
            .free_iter()
            .filter(|ext| ext.size() >= request)
            .map(|ext| ext.size())
            .min()
            .unwrap();
        let got = pool.request(&TraceOp::request(request as i64));
        assert_eq!(got, 200);
        // the block it carved was the tightest candidate
        assert_eq!(tightest, 300);
    }
    #[test]
    fn worst_fit_always_takes_the_largest() {
        let mut pool = fragmented(Strategy::WorstFit);
        assert_eq!(pool.request(&TraceOp::request(10)), 600);
        // largest is now (200,300)
        assert_eq!(pool.request(&TraceOp::request(10)), 200);
    }
    #[test]
    fn when_worst_fit_fails_every_strategy_fails() {
        for strategy in [Strategy::FirstFit, Strategy::BestFit, Strategy::WorstFit] {
            let mut pool = fragmented(strategy);
            assert_eq!(
                pool.request(&TraceOp::request(450)),
                ALLOC_FAILURE,
                "{strategy}"
            );
        }
    }
    #[test]
    fn equal_sizes_break_ties_on_the_smallest_address() {
        let mut pool = pool(Strategy::BestFit);
        // free: (0,100), (200,100), (400,624): two equal candidates
        assert_eq!(pool.request(&TraceOp::request_at(100, 100)), 100);
        assert_eq!(pool.request(&TraceOp::request_at(100, 300)), 300);
        assert_eq!(frees(&pool), [(0, 100), (200, 100), (400, 624)]);
        assert_eq!(pool.request(&TraceOp::request(100)), 0);
    }
}

mod properties {
    use {
        super::*,
        crate::util::test_utils,
        rand::Rng,
    };

    /// The multiset of free extents, as the ordered address walk sees it
    fn snapshot(pool: &MemPool) -> Vec<(u64, u64)> {
        frees(pool)
    }

    #[test]
    fn request_release_round_trip() {
        for strategy in [Strategy::FirstFit, Strategy::BestFit, Strategy::WorstFit] {
            let mut pool = pool(strategy);
            // fragment things a little first
            assert_eq!(pool.request(&TraceOp::request_at(100, 100)), 100);
            assert_eq!(pool.request(&TraceOp::request_at(60, 700)), 700);
            let before = snapshot(&pool);
            let addr = pool.request(&TraceOp::request(57));
            assert_ne!(addr, ALLOC_FAILURE);
            assert!(pool.release(&TraceOp::release(addr, 57)));
            assert_eq!(snapshot(&pool), before, "{strategy}");
        }
    }
    #[test]
    fn full_drain_restores_the_initial_state() {
        let mut rng = rand::thread_rng();
        let mut pool = pool(Strategy::FirstFit);
        let mut live: Vec<(i64, i64)> = Vec::new();
        for _ in 0..512 {
            if test_utils::random_bool(0.6, &mut rng) || live.is_empty() {
                let size = test_utils::random_number(1i64, 64, &mut rng);
                let addr = pool.request(&TraceOp::request(size));
                if addr != ALLOC_FAILURE {
                    live.push((addr, size));
                }
            } else {
                let at = test_utils::random_number(0, live.len(), &mut rng);
                let (addr, size) = live.swap_remove(at);
                assert!(pool.release(&TraceOp::release(addr, size)));
            }
        }
        for (addr, size) in live {
            assert!(pool.release(&TraceOp::release(addr, size)));
        }
        assert_eq!(frees(&pool), [(0, TOTAL)]);
        assert_eq!(pool.engine().alloc_count(), 0);
    }
    #[test]
    fn invariants_hold_under_random_traffic() {
        let mut rng = rand::thread_rng();
        for strategy in [Strategy::FirstFit, Strategy::BestFit, Strategy::WorstFit] {
            let merge = test_utils::random_bool(0.5, &mut rng);
            let mut pool = MemPool::with_strategy(TOTAL, strategy, merge);
            let mut live: Vec<(i64, i64)> = Vec::new();
            for _ in 0..2048 {
                if test_utils::random_bool(0.55, &mut rng) {
                    let size = test_utils::random_number(0i64, 96, &mut rng);
                    let addr = pool.request(&TraceOp::request(size));
                    if addr != ALLOC_FAILURE && size > 0 {
                        live.push((addr, size));
                    }
                } else if let Some(&(addr, size)) =
                    test_utils::random_elem(&live, &mut rng)
                {
                    // sometimes release a strict sub-range, sometimes all
                    let (addr, size) = if size > 2 && rng.gen_bool(0.25) {
                        let cut = test_utils::random_number(1, size, &mut rng);
                        (addr, cut)
                    } else {
                        live.retain(|e| *e != (addr, size));
                        (addr, size)
                    };
                    // a sub-range release may hit an already-released hole;
                    // both outcomes are legal, the invariants must hold
                    // either way
                    let _ = pool.release(&TraceOp::release(addr, size));
                } else {
                    // nothing live: poke the error paths
                    assert!(!pool.release(&TraceOp::release(512, 1)));
                }
                pool.engine().verify_integrity();
                check_coverage(&pool);
            }
        }
    }
    /// The extent walks must cover the region exactly, always
    fn check_coverage(pool: &MemPool) {
        let free: u64 = pool.engine().free_iter().map(|e| e.size()).sum();
        let alloc: u64 = pool.engine().alloc_iter().map(|e| e.size()).sum();
        assert_eq!(free + alloc, TOTAL);
        // and the free walk is strictly ordered with gaps
        let list = frees(pool);
        for win in list.windows(2) {
            assert!(win[0].0 + win[0].1 < win[1].0);
        }
    }
    #[test]
    fn failed_ops_leave_state_untouched() {
        let mut pool = pool(Strategy::BestFit);
        assert_eq!(pool.request(&TraceOp::request(500)), 0);
        let free_before = frees(&pool);
        let alloc_before = allocs(&pool);
        assert_eq!(pool.request(&TraceOp::request(600)), ALLOC_FAILURE);
        assert_eq!(pool.request(&TraceOp::request_at(10, 250)), ALLOC_FAILURE);
        assert!(!pool.release(&TraceOp::release(999, 100)));
        assert!(!pool.release(&TraceOp::release(400, 200)));
        assert_eq!(frees(&pool), free_before);
        assert_eq!(allocs(&pool), alloc_before);
    }
}
