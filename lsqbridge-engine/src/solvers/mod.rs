pub mod bounds;
pub mod lm;
pub mod numeric_diff;
