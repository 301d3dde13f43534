//! Core module - chart math, generators and task orchestration

pub mod capability;
pub mod config;
pub mod constants;
pub mod difficulty;
pub mod generator;
pub mod limits;
pub mod resolution;
pub mod rules;
pub mod service;
pub mod tolerance;

pub use capability::{estimate_cpk, subgroup_stats, CapabilityEstimate};
pub use config::GeneratorConfig;
pub use difficulty::{evaluate_difficulty, DifficultyAssessment, DifficultyTier, Feasibility};
pub use generator::{
    generate_reference_range, generate_standard, GenerationError, GenerationMode,
    GenerationRequest, Generator, ReferenceRangeGenerator, SearchSettings, SpcData,
    StandardGenerator,
};
pub use limits::{compute_control_limits, round_half_up, ControlLimits, LimitsError};
pub use resolution::{Resolution, ResolutionError};
pub use rules::{check_rules, in_control, Violation};
pub use service::{run_task, KeepTarget, TargetAdjuster, TaskError, TaskReport};
pub use tolerance::{ReferenceRange, Tolerance, ToleranceError, ToleranceKind};
