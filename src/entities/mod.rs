//! Entity type definitions

pub mod task;

pub use task::{Plan, PlanDefaults, Task, TaskMode};
