//! Task orchestration
//!
//! Turns one inspection task into chart data: parse the callouts, check
//! how reachable the target is, derive limits, search, and fall back to the
//! standard search when the reference band yields nothing.

use std::path::Path;

use rand::RngCore;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::config::GeneratorConfig;
use crate::core::difficulty::{evaluate_difficulty, DifficultyAssessment, Feasibility};
use crate::core::generator::{
    GenerationError, GenerationMode, GenerationRequest, Generator, ReferenceRangeGenerator,
    SpcData, StandardGenerator,
};
use crate::core::limits::{compute_control_limits, ControlLimits, LimitsError};
use crate::core::tolerance::{ReferenceRange, Tolerance, ToleranceKind};
use crate::entities::task::{Task, TaskMode};
use crate::parse::{parse_reference_range, parse_tolerance, ParseError};

/// Per-segment character caps for output names
const PRODUCT_CAP: usize = 50;
const PROCESS_CAP: usize = 20;
const ITEM_CAP: usize = 20;

/// Characters that cannot appear in file names on common filesystems
const UNSAFE_CHARS: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Tolerance '{0}' has no numeric specification to chart")]
    NoSpecification(String),

    #[error("Tolerance '{0}' is not a valid band")]
    InvalidTolerance(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Limits(#[from] LimitsError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Decides what to do when the target Cpk is outside the reachable interval
pub trait TargetAdjuster {
    /// Target to use instead of `assessment.target_cpk`
    fn adjust(&mut self, assessment: &DifficultyAssessment) -> f64;
}

/// Never changes the target
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepTarget;

impl TargetAdjuster for KeepTarget {
    fn adjust(&mut self, assessment: &DifficultyAssessment) -> f64 {
        assessment.target_cpk
    }
}

/// Everything known about one task after it ran
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: String,
    pub tolerance: Tolerance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceRange>,
    pub limits: ControlLimits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<DifficultyAssessment>,
    /// Target before any adjustment
    pub requested_cpk: f64,
    /// Target the limits and search actually used
    pub target_cpk: f64,
    pub attempt_budget: usize,
    /// `None` when no candidate was found
    pub data: Option<SpcData>,
}

impl TaskReport {
    pub fn mode(&self) -> Option<GenerationMode> {
        self.data.as_ref().map(|d| d.mode)
    }

    pub fn uses_reference(&self) -> bool {
        self.reference.is_some()
    }
}

/// Run one task end to end
///
/// `Ok` with `data: None` means the search ran out of attempts; errors are
/// reserved for input that cannot be charted at all.
pub fn run_task(
    task: &Task,
    mode: TaskMode,
    config: &GeneratorConfig,
    adjuster: &mut dyn TargetAdjuster,
    rng: &mut dyn RngCore,
) -> Result<TaskReport, TaskError> {
    let tolerance = parse_tolerance(&task.theory)?;
    if tolerance.kind == ToleranceKind::None {
        return Err(TaskError::NoSpecification(task.theory.clone()));
    }
    if !tolerance.is_valid() {
        return Err(TaskError::InvalidTolerance(task.theory.clone()));
    }

    let reference = match (mode, task.reference_text()) {
        (TaskMode::Reference, Some(text)) => Some(parse_reference_range(text)?),
        _ => None,
    };

    let requested_cpk = task.target_cpk.unwrap_or(config.target_cpk);
    let mut target_cpk = requested_cpk;

    let difficulty = reference.map(|r| evaluate_difficulty(&tolerance, &r, requested_cpk));
    if let Some(assessment) = &difficulty {
        info!(
            task = %task.label(),
            cpk_lower = assessment.cpk_lower,
            cpk_upper = assessment.cpk_upper,
            tier = %assessment.tier,
            "reference band difficulty"
        );
        if assessment.feasibility != Feasibility::Within {
            let adjusted = adjuster.adjust(assessment);
            if adjusted.is_finite() && adjusted > 0.0 {
                if adjusted != requested_cpk {
                    info!(from = requested_cpk, to = adjusted, "target Cpk adjusted");
                }
                target_cpk = adjusted;
            } else {
                warn!(adjusted, "ignoring unusable target adjustment");
            }
        }
    }

    let limits = compute_control_limits(&tolerance, target_cpk, reference.map(|r| r.center()))?;

    let base = if reference.is_some() {
        config.reference_attempts
    } else {
        config.standard_attempts
    };
    let attempt_budget = match &difficulty {
        Some(a) if config.adapt_attempts_to_difficulty => a.tier.recommended_attempts(base),
        _ => base,
    };

    let request = GenerationRequest {
        tolerance: &tolerance,
        limits: &limits,
        target_cpk,
        resolution: task.resolution,
        max_attempts: attempt_budget,
    };
    let settings = config.search_settings();

    let data = match reference {
        Some(band) => {
            match ReferenceRangeGenerator::new(band, settings).generate(&request, rng)? {
                Some(data) => Some(data),
                None => {
                    warn!(task = %task.label(), "reference search found nothing, one more standard pass");
                    let retry = GenerationRequest {
                        max_attempts: (attempt_budget / 2).max(1),
                        ..request
                    };
                    StandardGenerator::new(settings)
                        .generate(&retry, rng)?
                        .map(|mut data| {
                            data.mode = GenerationMode::StandardFallback;
                            data
                        })
                }
            }
        }
        None => StandardGenerator::new(settings).generate(&request, rng)?,
    };

    if data.is_none() {
        warn!(task = %task.label(), attempts = attempt_budget, "no candidate found");
    }

    Ok(TaskReport {
        task: task.label(),
        tolerance,
        reference,
        limits,
        difficulty,
        requested_cpk,
        target_cpk,
        attempt_budget,
        data,
    })
}

/// Strip unsafe characters and cap the length in characters
pub fn sanitize_segment(text: &str, max_chars: usize) -> String {
    text.trim()
        .chars()
        .filter(|c| !UNSAFE_CHARS.contains(c) && !c.is_control())
        .take(max_chars)
        .collect::<String>()
        .trim()
        .replace(char::is_whitespace, "_")
}

/// `{MM}_{product}_{process}_{item}[_ref]_spc`
pub fn output_stem(task: &Task, month: u32, reference: bool) -> String {
    let segment = |text: &str, cap: usize, fallback: &str| {
        let s = sanitize_segment(text, cap);
        if s.is_empty() {
            fallback.to_string()
        } else {
            s
        }
    };
    format!(
        "{:02}_{}_{}_{}{}_spc",
        month,
        segment(&task.product_model, PRODUCT_CAP, "product"),
        segment(&task.process, PROCESS_CAP, "process"),
        segment(&task.inspection_item, ITEM_CAP, "item"),
        if reference { "_ref" } else { "" }
    )
}

/// First of `stem`, `stem_1`, `stem_2`, ... with no existing file for any extension
pub fn unique_stem(dir: &Path, stem: &str, extensions: &[&str]) -> String {
    let taken = |candidate: &str| {
        extensions
            .iter()
            .any(|ext| dir.join(format!("{}.{}", candidate, ext)).exists())
    };
    if !taken(stem) {
        return stem.to_string();
    }
    (1..)
        .map(|n| format!("{}_{}", stem, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| stem.to_string())
}
