#[macro_use]
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use approx::assert_abs_diff_eq;
use lsqbridge::{
    AdjustError, BoundKind, Bridge, CostError, RegistryScope, SolverOption, ValidationError,
};
use lsqbridge_engine::ffi::{LSQ_EVALUATION_FAILED, LSQ_SOLVER_FAILED};

use common::{CountingEngine, NullConfigEngine, ScriptedEngine};

fn hello_world(x: &[f64], r: &mut [f64]) -> Result<(), CostError> {
    r[0] = 0.5 * (10.0 - x[0]).powi(2);
    Ok(())
}

#[test]
fn hello_world_converges_to_ten() {
    let mut params = vec![0.5];
    lsqbridge::adjust(&mut params, 1, hello_world, &[]).unwrap();
    assert_abs_diff_eq!(params[0], 10.0, epsilon = 1e-3);
}

#[test]
fn success_releases_registration_and_config() {
    isolated_scope!(Scope);
    let bridge = Bridge::<CountingEngine, Scope>::new(CountingEngine::default());

    let mut params = vec![0.5];
    bridge.adjust(&mut params, 1, hello_world, &[]).unwrap();

    assert_abs_diff_eq!(params[0], 10.0, epsilon = 1e-3);
    assert!(Scope::registry().is_empty());
    let engine = bridge.engine();
    assert_eq!(CountingEngine::count(&engine.inits), 1);
    assert_eq!(CountingEngine::count(&engine.optimized), 1);
    assert_eq!(CountingEngine::count(&engine.created), 1);
    assert_eq!(CountingEngine::count(&engine.deleted), 1);
}

#[test]
fn out_of_range_bound_never_reaches_the_engine() {
    isolated_scope!(Scope);
    let bridge = Bridge::<CountingEngine, Scope>::new(CountingEngine::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let spy = Arc::clone(&calls);

    let mut params = vec![0.5];
    let err = bridge
        .adjust(
            &mut params,
            1,
            move |x, r| {
                spy.fetch_add(1, Ordering::SeqCst);
                hello_world(x, r)
            },
            &[SolverOption::UpperBound(3, 1.0)],
        )
        .unwrap_err();

    assert!(matches!(
        err,
        AdjustError::Validation(ValidationError::ParamIndexOutOfRange {
            index: 3,
            kind: BoundKind::Upper,
            num_params: 1,
        })
    ));
    assert_eq!(params, [0.5]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(Scope::registry().is_empty());
    let engine = bridge.engine();
    assert_eq!(CountingEngine::count(&engine.optimized), 0);
    assert_eq!(CountingEngine::count(&engine.created), 0);
}

#[test]
fn empty_parameters_and_zero_residuals_are_rejected() {
    isolated_scope!(Scope);
    let bridge = Bridge::<CountingEngine, Scope>::new(CountingEngine::default());

    let err = bridge.adjust(&mut [], 1, hello_world, &[]).unwrap_err();
    assert!(matches!(
        err,
        AdjustError::Validation(ValidationError::EmptyParameters)
    ));

    let err = bridge.adjust(&mut [1.0], 0, hello_world, &[]).unwrap_err();
    assert!(matches!(
        err,
        AdjustError::Validation(ValidationError::NoResiduals)
    ));

    assert!(Scope::registry().is_empty());
    assert_eq!(CountingEngine::count(&bridge.engine().optimized), 0);
}

#[test]
fn negative_step_size_is_rejected() {
    isolated_scope!(Scope);
    let bridge = Bridge::<CountingEngine, Scope>::new(CountingEngine::default());

    let err = bridge
        .adjust(
            &mut [0.5],
            1,
            hello_world,
            &[SolverOption::RelativeStepSize(-1.0)],
        )
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(CountingEngine::count(&bridge.engine().optimized), 0);
}

#[test]
fn failing_cost_surfaces_its_error_as_the_cause() {
    isolated_scope!(Scope);
    let bridge = Bridge::<CountingEngine, Scope>::new(CountingEngine::default());

    let mut params = vec![0.5];
    let err = bridge
        .adjust(&mut params, 1, |_, _| Err("boom".into()), &[])
        .unwrap_err();

    match err {
        AdjustError::Execution { status, cause } => {
            assert_eq!(status, LSQ_EVALUATION_FAILED);
            assert_eq!(cause.unwrap().to_string(), "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(Scope::registry().is_empty());
    let engine = bridge.engine();
    assert_eq!(
        CountingEngine::count(&engine.created),
        CountingEngine::count(&engine.deleted)
    );
}

#[test]
fn panicking_cost_is_contained() {
    isolated_scope!(Scope);
    let bridge = Bridge::<CountingEngine, Scope>::new(CountingEngine::default());

    let err = bridge
        .adjust(&mut [0.5], 1, |_, _| panic!("cost exploded"), &[])
        .unwrap_err();

    match err {
        AdjustError::Execution { cause, .. } => {
            let cause = cause.unwrap().to_string();
            assert!(cause.contains("cost exploded"), "{cause}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(Scope::registry().is_empty());
}

#[test]
fn nonzero_status_without_cost_error_has_no_cause() {
    isolated_scope!(Scope);
    let engine = ScriptedEngine::with_status(LSQ_SOLVER_FAILED);
    let bridge = Bridge::<ScriptedEngine, Scope>::new(engine);

    let err = bridge.adjust(&mut [0.5], 1, hello_world, &[]).unwrap_err();

    match err {
        AdjustError::Execution { status, cause } => {
            assert_eq!(status, LSQ_SOLVER_FAILED);
            assert!(cause.is_none());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(Scope::registry().is_empty());
}

#[test]
fn stale_handle_is_counted_and_reported_by_the_engine() {
    isolated_scope!(Scope);
    let bridge = Bridge::<ScriptedEngine, Scope>::new(ScriptedEngine {
        status: LSQ_EVALUATION_FAILED,
        handle_offset: 1000,
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let spy = Arc::clone(&calls);

    let err = bridge
        .adjust(
            &mut [0.5],
            1,
            move |x, r| {
                spy.fetch_add(1, Ordering::SeqCst);
                hello_world(x, r)
            },
            &[],
        )
        .unwrap_err();

    assert!(err.is_execution());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(Scope::registry().lookup_misses(), 1);
    assert!(Scope::registry().is_empty());
}

#[test]
fn error_from_a_rejected_step_does_not_fail_a_converged_solve() {
    isolated_scope!(Scope);
    let bridge = Bridge::<CountingEngine, Scope>::new(CountingEngine::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    // Initial evaluation and the two-point Jacobian come first; the first
    // trial step fails and is retried with a larger damping.
    let mut params = vec![0.5];
    bridge
        .adjust(
            &mut params,
            1,
            move |x, r| {
                if counter.fetch_add(1, Ordering::SeqCst) == 3 {
                    return Err("transient".into());
                }
                hello_world(x, r)
            },
            &[],
        )
        .unwrap();

    assert_abs_diff_eq!(params[0], 10.0, epsilon = 1e-3);
    assert!(calls.load(Ordering::SeqCst) > 4);
}

#[test]
fn bounds_are_respected() {
    let mut params = vec![0.5];
    lsqbridge::adjust(
        &mut params,
        1,
        |x, r| {
            r[0] = 10.0 - x[0];
            Ok(())
        },
        &[SolverOption::LowerBound(0, 12.0)],
    )
    .unwrap();
    assert_abs_diff_eq!(params[0], 12.0, epsilon = 1e-9);

    let mut params = vec![0.5];
    lsqbridge::adjust(
        &mut params,
        1,
        |x, r| {
            r[0] = 10.0 - x[0];
            Ok(())
        },
        &[
            SolverOption::UpperBound(0, 8.0),
            SolverOption::UpperBound(0, 5.0),
        ],
    )
    .unwrap();
    assert_abs_diff_eq!(params[0], 5.0, epsilon = 1e-9);
}

#[test]
fn explicit_step_size_still_converges() {
    let mut params = vec![0.5, -1.0];
    lsqbridge::adjust(
        &mut params,
        3,
        |x, r| {
            r[0] = x[0] - 1.0;
            r[1] = x[1] + 2.0;
            r[2] = x[0] + x[1] + 1.0;
            Ok(())
        },
        &[SolverOption::RelativeStepSize(1e-4)],
    )
    .unwrap();
    assert_abs_diff_eq!(params[0], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(params[1], -2.0, epsilon = 1e-6);
}

#[test]
fn failed_config_allocation_releases_the_handle() {
    isolated_scope!(Scope);
    let bridge = Bridge::<NullConfigEngine, Scope>::new(NullConfigEngine::default());

    let err = bridge
        .adjust(&mut [0.5], 1, hello_world, &[SolverOption::LowerBound(0, 1.0)])
        .unwrap_err();

    assert!(matches!(err, AdjustError::ConfigAllocation));
    assert!(Scope::registry().is_empty());
    assert_eq!(bridge.engine().optimized.load(Ordering::SeqCst), 0);
}

#[test]
fn many_residuals_over_few_parameters_solve_quickly() {
    let ts: Vec<f64> = (0..5000).map(|i| i as f64 * 1e-3).collect();
    let num_residuals = ts.len();

    let started = Instant::now();
    let mut params = vec![0.0, 0.0];
    lsqbridge::adjust(
        &mut params,
        num_residuals,
        move |p, r| {
            for (ri, t) in r.iter_mut().zip(&ts) {
                *ri = p[0] * t + p[1] - (2.0 * t + 1.0);
            }
            Ok(())
        },
        &[],
    )
    .unwrap();

    assert_abs_diff_eq!(params[0], 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(params[1], 1.0, epsilon = 1e-6);
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "took {:?}",
        started.elapsed()
    );
}
