//! Solver options and the validated configuration built from them.

use std::ffi::c_int;
use std::fmt;

use crate::error::ValidationError;

/// Which side of a parameter a bound limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoundKind {
    Lower,
    Upper,
}

impl fmt::Display for BoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lower => "lower",
            Self::Upper => "upper",
        })
    }
}

/// A lower or upper limit on one parameter.
///
/// Can only be constructed against a parameter count, so the index is always
/// in range for the configuration that holds it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundConstraint {
    param_index: usize,
    kind: BoundKind,
    value: f64,
}

impl BoundConstraint {
    pub fn new(
        param_index: usize,
        kind: BoundKind,
        value: f64,
        num_params: usize,
    ) -> Result<Self, ValidationError> {
        if param_index >= num_params {
            return Err(ValidationError::ParamIndexOutOfRange {
                index: param_index,
                kind,
                num_params,
            });
        }
        if value.is_nan() {
            return Err(ValidationError::NonFiniteBound {
                index: param_index,
                kind,
            });
        }
        Ok(Self {
            param_index,
            kind,
            value,
        })
    }

    pub fn param_index(&self) -> usize {
        self.param_index
    }

    pub fn kind(&self) -> BoundKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Option applied, in order, to the configuration of one `adjust` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SolverOption {
    /// Relative step size for numeric differentiation. The linked engine only
    /// honors values above its default of 1e-6; smaller ones keep the default.
    RelativeStepSize(f64),
    /// Native progress output and a summary report on stdout. Does not change
    /// what `adjust` returns.
    VerboseOutput(bool),
    /// Lower bound `(param_index, value)`.
    LowerBound(usize, f64),
    /// Upper bound `(param_index, value)`.
    UpperBound(usize, f64),
}

/// Validated, immutable solver configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverConfig {
    num_params: usize,
    num_residuals: usize,
    relative_step_size: f64,
    progress_to_stdout: bool,
    print_summary: bool,
    bounds: Vec<BoundConstraint>,
}

impl SolverConfig {
    pub fn num_params(&self) -> usize {
        self.num_params
    }

    pub fn num_residuals(&self) -> usize {
        self.num_residuals
    }

    pub fn relative_step_size(&self) -> f64 {
        self.relative_step_size
    }

    pub fn progress_to_stdout(&self) -> bool {
        self.progress_to_stdout
    }

    pub fn print_summary(&self) -> bool {
        self.print_summary
    }

    /// Bounds in the order they were supplied. Repeated entries for the same
    /// parameter are all kept; the engine decides which one applies.
    pub fn bounds(&self) -> &[BoundConstraint] {
        &self.bounds
    }
}

/// Applies options to a configuration, stopping at the first invalid one.
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    config: SolverConfig,
}

fn check_width(what: &'static str, value: usize) -> Result<(), ValidationError> {
    if c_int::try_from(value).is_err() {
        return Err(ValidationError::DimensionTooLarge { what, value });
    }
    Ok(())
}

impl ConfigBuilder {
    pub fn new(num_params: usize, num_residuals: usize) -> Result<Self, ValidationError> {
        if num_params == 0 {
            return Err(ValidationError::EmptyParameters);
        }
        if num_residuals == 0 {
            return Err(ValidationError::NoResiduals);
        }
        check_width("num_params", num_params)?;
        check_width("num_residuals", num_residuals)?;

        Ok(Self {
            config: SolverConfig {
                num_params,
                num_residuals,
                relative_step_size: 0.0,
                progress_to_stdout: false,
                print_summary: false,
                bounds: Vec::new(),
            },
        })
    }

    pub fn apply(&mut self, option: SolverOption) -> Result<&mut Self, ValidationError> {
        let config = &mut self.config;
        match option {
            SolverOption::RelativeStepSize(rel) => {
                if !rel.is_finite() || rel < 0.0 {
                    return Err(ValidationError::InvalidStepSize(rel));
                }
                config.relative_step_size = rel;
            }
            SolverOption::VerboseOutput(on) => {
                config.progress_to_stdout = on;
                config.print_summary = on;
            }
            SolverOption::LowerBound(index, value) => {
                let bound =
                    BoundConstraint::new(index, BoundKind::Lower, value, config.num_params)?;
                config.bounds.push(bound);
            }
            SolverOption::UpperBound(index, value) => {
                let bound =
                    BoundConstraint::new(index, BoundKind::Upper, value, config.num_params)?;
                config.bounds.push(bound);
            }
        }
        Ok(self)
    }

    pub fn apply_all<'a, I>(mut self, options: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = &'a SolverOption>,
    {
        for option in options {
            self.apply(*option)?;
        }
        Ok(self)
    }

    pub fn build(self) -> SolverConfig {
        self.config
    }
}
