pub(crate) mod adjust;
pub(crate) mod callbacks;
