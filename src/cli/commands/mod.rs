//! CLI command implementations

pub mod batch;
pub mod check;
pub mod completions;
pub mod difficulty;
pub mod generate;
pub mod limits;
