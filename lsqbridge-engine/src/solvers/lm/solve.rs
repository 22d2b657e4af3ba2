use crate::numerics::linalg::{
    dot, jj_t_plus_lambda, jt_j_plus_lambda, jt_mul_vec, norm2, norm_inf, solve_linear_inplace,
};
use crate::solvers::numeric_diff::{CentralDifference, NumericDiffOptions};

use super::types::{LevenbergMarquardt, LevenbergMarquardtResult, Termination};
use super::workspace::LmWorkspace;

/// Source of residuals and Jacobians for the LM loop.
trait Evaluator {
    fn residual(&mut self, x: &[f64], r: &mut [f64]) -> bool;
    fn jacobian(&mut self, x: &[f64], j: &mut [f64]) -> bool;
}

struct Analytic<R, JF> {
    residual_fn: R,
    jacobian_fn: JF,
}

impl<R, JF> Evaluator for Analytic<R, JF>
where
    R: FnMut(&[f64], &mut [f64]) -> bool,
    JF: FnMut(&[f64], &mut [f64]) -> bool,
{
    fn residual(&mut self, x: &[f64], r: &mut [f64]) -> bool {
        (self.residual_fn)(x, r)
    }

    fn jacobian(&mut self, x: &[f64], j: &mut [f64]) -> bool {
        (self.jacobian_fn)(x, j)
    }
}

struct Numeric<R> {
    residual_fn: R,
    diff: CentralDifference,
}

impl<R> Evaluator for Numeric<R>
where
    R: FnMut(&[f64], &mut [f64]) -> bool,
{
    fn residual(&mut self, x: &[f64], r: &mut [f64]) -> bool {
        (self.residual_fn)(x, r)
    }

    fn jacobian(&mut self, x: &[f64], j: &mut [f64]) -> bool {
        self.diff.jacobian(x, &mut self.residual_fn, j)
    }
}

fn unstarted(m: usize, n: usize) -> LevenbergMarquardtResult {
    LevenbergMarquardtResult {
        num_params: n,
        num_residuals: m,
        initial_cost: f64::NAN,
        cost: f64::NAN,
        iters: 0,
        successful_steps: 0,
        unsuccessful_steps: 0,
        residual_evaluations: 0,
        jacobian_evaluations: 0,
        r_norm: f64::NAN,
        dx_norm: f64::NAN,
        termination: Termination::NoConvergence,
    }
}

impl LevenbergMarquardt {
    fn progress(&self, it: usize, cost: f64, lambda: f64, dx_norm: f64, note: &str) {
        if self.progress_to_stdout {
            println!(
                "[lm] iter {:>6} | cost {:>13.6e} | dx {:>13.6e} | lambda {:>9.3e} | note {}",
                it, cost, dx_norm, lambda, note
            );
        }
    }

    fn run<E, P>(
        &self,
        m: usize,
        x: &mut [f64],
        eval: &mut E,
        project: &mut P,
    ) -> LevenbergMarquardtResult
    where
        E: Evaluator,
        P: FnMut(&mut [f64]),
    {
        let n = x.len();
        assert!(m > 0 && n > 0);

        let lambda_up = if self.lambda_up > 1.0 {
            self.lambda_up
        } else {
            10.0
        };
        let lambda_down = if (0.0..1.0).contains(&self.lambda_down) {
            self.lambda_down
        } else {
            0.5
        };

        let mut lambda = self.lambda.max(1e-12);
        let mut out = unstarted(m, n);
        let Some(mut ws) = LmWorkspace::try_new(m, n) else {
            out.termination = Termination::AllocationFailed;
            return out;
        };

        project(x);
        out.residual_evaluations += 1;
        if !eval.residual(x, &mut ws.r) {
            out.termination = Termination::InitialEvaluationFailed;
            return out;
        }
        let mut cost = 0.5 * dot(&ws.r, &ws.r);
        if !cost.is_finite() {
            out.termination = Termination::NonFiniteCost;
            return out;
        }
        out.initial_cost = cost;
        out.cost = cost;
        out.r_norm = norm2(&ws.r);
        self.progress(0, cost, lambda, 0.0, "initial");

        let mut jacobian_stale = true;
        for it in 0..self.max_iters {
            out.iters = it;

            if jacobian_stale {
                out.jacobian_evaluations += 1;
                if !eval.jacobian(x, &mut ws.j) || !ws.j.iter().all(|v| v.is_finite()) {
                    out.termination = Termination::JacobianEvaluationFailed;
                    return out;
                }
                // g = J^T r  (gradient of 0.5||r||^2)
                jt_mul_vec(&ws.j, m, n, &ws.r, &mut ws.g);
                jacobian_stale = false;
            }

            if norm_inf(&ws.g) <= self.gradient_tolerance {
                out.termination = Termination::GradientTolerance;
                return out;
            }

            // m <= n: A = J J^T + lambda I ; y = A^{-1} r ; dx = J^T y
            // m >  n: A = J^T J + lambda I ; dx = A^{-1} J^T r
            let residual_space = ws.residual_space();
            if residual_space {
                jj_t_plus_lambda(&ws.j, m, n, lambda, &mut ws.a);
                ws.y.copy_from_slice(&ws.r);
            } else {
                jt_j_plus_lambda(&ws.j, m, n, lambda, &mut ws.a);
                ws.y.copy_from_slice(&ws.g);
            }
            if !solve_linear_inplace(&mut ws.a, &mut ws.y, ws.dim) {
                lambda *= lambda_up;
                out.unsuccessful_steps += 1;
                self.progress(it, cost, lambda, f64::NAN, "linear_solve_failed");
                continue;
            }
            if residual_space {
                jt_mul_vec(&ws.j, m, n, &ws.y, &mut ws.dx);
            } else {
                ws.dx.copy_from_slice(&ws.y);
            }

            for i in 0..n {
                ws.x_trial[i] = x[i] - ws.dx[i];
            }
            project(&mut ws.x_trial);

            let step_norm = ws
                .x_trial
                .iter()
                .zip(x.iter())
                .map(|(xt, xi)| (xt - xi) * (xt - xi))
                .sum::<f64>()
                .sqrt();
            out.dx_norm = step_norm;
            let x_norm = norm2(x);
            if step_norm <= self.parameter_tolerance * (x_norm + self.parameter_tolerance) {
                out.termination = Termination::ParameterTolerance;
                return out;
            }

            out.residual_evaluations += 1;
            let cost_trial = if eval.residual(&ws.x_trial, &mut ws.r_trial) {
                let c = 0.5 * dot(&ws.r_trial, &ws.r_trial);
                c.is_finite().then_some(c)
            } else {
                None
            };

            match cost_trial {
                Some(cost_trial) if cost_trial < cost => {
                    let relative_decrease = (cost - cost_trial) / cost;
                    x.copy_from_slice(&ws.x_trial);
                    ws.r.copy_from_slice(&ws.r_trial);
                    cost = cost_trial;
                    out.cost = cost;
                    out.r_norm = norm2(&ws.r);
                    out.successful_steps += 1;
                    lambda = (lambda * lambda_down).max(1e-12);
                    jacobian_stale = true;
                    self.progress(it + 1, cost, lambda, step_norm, "accepted");

                    if relative_decrease <= self.function_tolerance {
                        out.iters = it + 1;
                        out.termination = Termination::FunctionTolerance;
                        return out;
                    }
                }
                Some(_) => {
                    lambda *= lambda_up;
                    out.unsuccessful_steps += 1;
                    self.progress(it + 1, cost, lambda, step_norm, "rejected");
                }
                None => {
                    lambda *= lambda_up;
                    out.unsuccessful_steps += 1;
                    self.progress(it + 1, cost, lambda, step_norm, "trial_evaluation_failed");
                }
            }
        }

        out.iters = self.max_iters;
        out.termination = Termination::NoConvergence;
        out
    }

    /// Solve with a caller-supplied Jacobian.
    ///
    /// - m: residual dimension
    /// - x: initial guess (len = n), overwritten with the estimate
    /// - residual_fn(x, r): fill r (len = m); return `false` if it cannot
    /// - jacobian_fn(x, J): fill J (len = m*n), row-major (i-th row, k-th col => J[i*n+k])
    /// - project(x): projection after each step (bounds etc). If not needed, pass |_x| {}
    pub fn solve_with_fn<R, JF, P>(
        &self,
        m: usize,
        x: &mut [f64],
        residual_fn: R,
        jacobian_fn: JF,
        mut project: P,
    ) -> LevenbergMarquardtResult
    where
        R: FnMut(&[f64], &mut [f64]) -> bool,
        JF: FnMut(&[f64], &mut [f64]) -> bool,
        P: FnMut(&mut [f64]),
    {
        let mut eval = Analytic {
            residual_fn,
            jacobian_fn,
        };
        self.run(m, x, &mut eval, &mut project)
    }

    /// Solve with a central-difference Jacobian built from `residual_fn`.
    pub fn solve_numeric_diff<R, P>(
        &self,
        m: usize,
        x: &mut [f64],
        residual_fn: R,
        options: NumericDiffOptions,
        mut project: P,
    ) -> LevenbergMarquardtResult
    where
        R: FnMut(&[f64], &mut [f64]) -> bool,
        P: FnMut(&mut [f64]),
    {
        let Some(diff) = CentralDifference::try_new(options, m, x.len()) else {
            let mut out = unstarted(m, x.len());
            out.termination = Termination::AllocationFailed;
            return out;
        };
        let mut eval = Numeric { residual_fn, diff };
        self.run(m, x, &mut eval, &mut project)
    }
}
