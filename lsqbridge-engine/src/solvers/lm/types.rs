use std::fmt;

/// Why the solver stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// max |J^T r| fell below `gradient_tolerance`.
    GradientTolerance,
    /// The (projected) step became negligible relative to x.
    ParameterTolerance,
    /// An accepted step reduced the cost by a negligible relative amount.
    FunctionTolerance,
    /// `max_iters` reached; x holds the best estimate found.
    NoConvergence,
    /// Residuals could not be evaluated at the initial point.
    InitialEvaluationFailed,
    /// Jacobian could not be evaluated at an accepted point.
    JacobianEvaluationFailed,
    /// Cost at the initial point is not finite.
    NonFiniteCost,
    /// Solver buffers for this problem size could not be allocated.
    AllocationFailed,
}

impl Termination {
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            Self::GradientTolerance | Self::ParameterTolerance | Self::FunctionTolerance
        )
    }

    /// `x` is still a usable estimate (converged or ran out of iterations).
    pub fn is_usable(&self) -> bool {
        self.is_converged() || *self == Self::NoConvergence
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::GradientTolerance => "CONVERGENCE (gradient tolerance reached)",
            Self::ParameterTolerance => "CONVERGENCE (parameter tolerance reached)",
            Self::FunctionTolerance => "CONVERGENCE (function tolerance reached)",
            Self::NoConvergence => "NO_CONVERGENCE (maximum number of iterations reached)",
            Self::InitialEvaluationFailed => {
                "FAILURE (residual evaluation failed at initial point)"
            }
            Self::JacobianEvaluationFailed => "FAILURE (jacobian evaluation failed)",
            Self::NonFiniteCost => "FAILURE (initial cost is not finite)",
            Self::AllocationFailed => "FAILURE (solver workspace could not be allocated)",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug)]
pub struct LevenbergMarquardtResult {
    pub num_params: usize,
    pub num_residuals: usize,
    pub initial_cost: f64,
    pub cost: f64, // 0.5 * ||r||^2
    pub iters: usize,
    pub successful_steps: usize,
    pub unsuccessful_steps: usize,
    pub residual_evaluations: usize,
    pub jacobian_evaluations: usize,
    pub r_norm: f64,
    pub dx_norm: f64,
    pub termination: Termination,
}

impl LevenbergMarquardtResult {
    pub fn converged(&self) -> bool {
        self.termination.is_converged()
    }

    /// Multi-line report printed when the caller asks for a summary.
    pub fn full_report(&self) -> String {
        format!(
            "Solver Summary\n\
             \n\
             {:<28}{:>12}\n\
             {:<28}{:>12}\n\
             \n\
             {:<28}{:>12.6e}\n\
             {:<28}{:>12.6e}\n\
             {:<28}{:>12.6e}\n\
             \n\
             {:<28}{:>12}\n\
             {:<28}{:>12}\n\
             {:<28}{:>12}\n\
             {:<28}{:>12}\n\
             {:<28}{:>12}\n\
             \n\
             Termination: {}\n",
            "Parameters",
            self.num_params,
            "Residuals",
            self.num_residuals,
            "Initial cost",
            self.initial_cost,
            "Final cost",
            self.cost,
            "Change",
            self.initial_cost - self.cost,
            "Iterations",
            self.iters,
            "Successful steps",
            self.successful_steps,
            "Unsuccessful steps",
            self.unsuccessful_steps,
            "Residual evaluations",
            self.residual_evaluations,
            "Jacobian evaluations",
            self.jacobian_evaluations,
            self.termination,
        )
    }
}

#[derive(Clone, Debug)]
pub struct LevenbergMarquardt {
    pub lambda: f64,      // initial damping
    pub lambda_up: f64,   // multiply lambda on rejected step
    pub lambda_down: f64, // multiply lambda on accepted step
    pub max_iters: usize,
    pub gradient_tolerance: f64,  // stop if max|J^T r| <= tol
    pub parameter_tolerance: f64, // stop if ||dx|| <= tol * (||x|| + tol)
    pub function_tolerance: f64,  // stop if accepted |dcost| / cost <= tol
    pub progress_to_stdout: bool,
}

impl LevenbergMarquardt {
    pub fn new() -> Self {
        Self {
            lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.5,
            max_iters: 50,
            gradient_tolerance: 1e-10,
            parameter_tolerance: 1e-8,
            function_tolerance: 1e-6,
            progress_to_stdout: false,
        }
    }
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self::new()
    }
}
