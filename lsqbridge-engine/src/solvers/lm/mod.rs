mod solve;
mod types;
mod workspace;

pub use types::{LevenbergMarquardt, LevenbergMarquardtResult, Termination};
