#[macro_use]
mod common;

use std::sync::Barrier;
use std::thread;

use approx::assert_abs_diff_eq;
use lsqbridge::{Bridge, LinkedEngine, RegistryScope};

use common::CountingEngine;

#[test]
fn engine_is_initialized_once_across_threads() {
    isolated_scope!(Scope);
    let bridge = Bridge::<CountingEngine, Scope>::new(CountingEngine::default());
    let barrier = Barrier::new(8);

    thread::scope(|s| {
        for i in 0..8 {
            let bridge = &bridge;
            let barrier = &barrier;
            s.spawn(move || {
                let target = i as f64;
                barrier.wait();
                let mut params = vec![target + 0.5];
                bridge
                    .adjust(
                        &mut params,
                        1,
                        move |x, r| {
                            r[0] = target - x[0];
                            Ok(())
                        },
                        &[],
                    )
                    .unwrap();
                assert_abs_diff_eq!(params[0], target, epsilon = 1e-6);
            });
        }
    });

    let engine = bridge.engine();
    assert_eq!(CountingEngine::count(&engine.inits), 1);
    assert_eq!(CountingEngine::count(&engine.optimized), 8);
    assert_eq!(CountingEngine::count(&engine.deleted), 8);
    assert!(Scope::registry().is_empty());
}

#[test]
fn concurrent_solves_do_not_cross_talk() {
    isolated_scope!(Scope);
    let bridge = Bridge::<LinkedEngine, Scope>::new(LinkedEngine);

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..20 {
                let mut params = vec![0.5];
                bridge
                    .adjust(
                        &mut params,
                        1,
                        |x, r| {
                            assert_eq!((x.len(), r.len()), (1, 1));
                            r[0] = 10.0 - x[0];
                            Ok(())
                        },
                        &[],
                    )
                    .unwrap();
                assert_abs_diff_eq!(params[0], 10.0, epsilon = 1e-6);
            }
        });
        s.spawn(|| {
            for _ in 0..20 {
                let mut params = vec![0.0, 0.0];
                bridge
                    .adjust(
                        &mut params,
                        3,
                        |x, r| {
                            assert_eq!((x.len(), r.len()), (2, 3));
                            r[0] = x[0] - 1.0;
                            r[1] = x[1] + 2.0;
                            r[2] = x[0] + x[1] + 1.0;
                            Ok(())
                        },
                        &[],
                    )
                    .unwrap();
                assert_abs_diff_eq!(params[0], 1.0, epsilon = 1e-6);
                assert_abs_diff_eq!(params[1], -2.0, epsilon = 1e-6);
            }
        });
    });

    assert!(Scope::registry().is_empty());
    assert_eq!(Scope::registry().lookup_misses(), 0);
}
