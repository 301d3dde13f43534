//! Constrained random search for chart data
//!
//! A generator proposes 25 subgroup means and ranges, expands them into a
//! 5×25 matrix of measurements, quantizes it, and scores the result exactly
//! the way the finished chart would: recomputed X̄/R, within-subgroup Cpk and
//! the run rules. The first candidate inside the Cpk window with a clean rule
//! check wins; otherwise the closest clean candidate is returned.

mod reference;
mod standard;
mod subgroup;

pub use reference::ReferenceRangeGenerator;
pub use standard::StandardGenerator;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::capability::{estimate_cpk, subgroup_stats};
use crate::core::constants::{
    DEFAULT_CPK_WINDOW, LIMIT_DECIMALS, MIN_POINTS_IN_REFERENCE, MIN_SUBGROUP_POINTS_IN_REFERENCE,
    SUBGROUP_ATTEMPTS,
};
use crate::core::limits::ControlLimits;
use crate::core::resolution::{max_decimal_places, quantize_matrix, Resolution};
use crate::core::rules::check_rules;
use crate::core::tolerance::{ReferenceRange, Tolerance, ToleranceError};

/// Row-major measurement matrix: 5 rows (measurement position) × 25 columns (subgroup)
pub type Matrix = Vec<Vec<f64>>;

/// Progress is logged every this many attempts
const PROGRESS_INTERVAL: usize = 500;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Control limits are degenerate (sigma {sigma}, R̄ {r_bar}, UCL {ucl}, LCL {lcl})")]
    DegenerateLimits {
        sigma: f64,
        r_bar: f64,
        ucl: f64,
        lcl: f64,
    },

    #[error("Target Cpk must be a positive number, got {0}")]
    InvalidTarget(f64),

    #[error("Tolerance {0} has no specification limit to measure capability against")]
    NoSpecificationLimits(String),

    #[error("Reference range is not usable: {0}")]
    Reference(#[from] ToleranceError),

    #[error("Sampling distribution rejected its parameters: {0}")]
    Sampling(String),
}

/// Which search produced the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Standard,
    ReferenceRange,
    /// Reference search came up empty and the standard search filled in
    StandardFallback,
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationMode::Standard => write!(f, "standard"),
            GenerationMode::ReferenceRange => write!(f, "reference range"),
            GenerationMode::StandardFallback => write!(f, "standard (fallback)"),
        }
    }
}

/// One generated chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpcData {
    /// Candidate before quantization
    pub raw: Matrix,
    /// What gets written to the sheet
    pub quantized: Matrix,
    /// Subgroup means recomputed from `quantized`
    pub x_bar: Vec<f64>,
    /// Subgroup ranges recomputed from `quantized`
    pub ranges: Vec<f64>,
    pub cpk: f64,
    pub r_bar: f64,
    pub sigma_within: f64,
    pub grand_mean: f64,
    /// Display precision of the quantized data
    pub max_decimal_places: u32,
    /// True when the Cpk landed inside the window; false for best-effort data
    pub accepted: bool,
    pub mode: GenerationMode,
    /// Attempts spent, including any fallback search
    pub attempts: usize,
}

/// Search tuning shared by both generators
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchSettings {
    /// Accepted |cpk − target|
    pub cpk_window: f64,
    /// Redraws per subgroup before the deterministic repair kicks in
    pub subgroup_attempts: usize,
    /// Raw points that must land inside the reference band
    pub min_points_in_reference: usize,
    /// Points per subgroup pushed into the reference band
    pub min_subgroup_points_in_reference: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            cpk_window: DEFAULT_CPK_WINDOW,
            subgroup_attempts: SUBGROUP_ATTEMPTS,
            min_points_in_reference: MIN_POINTS_IN_REFERENCE,
            min_subgroup_points_in_reference: MIN_SUBGROUP_POINTS_IN_REFERENCE,
        }
    }
}

/// Inputs for one generation call
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub tolerance: &'a Tolerance,
    pub limits: &'a ControlLimits,
    pub target_cpk: f64,
    pub resolution: Option<Resolution>,
    pub max_attempts: usize,
}

impl GenerationRequest<'_> {
    /// Refuse inputs that would divide by zero further down
    fn validate(&self) -> Result<(), GenerationError> {
        if !self.target_cpk.is_finite() || self.target_cpk <= 0.0 {
            return Err(GenerationError::InvalidTarget(self.target_cpk));
        }
        if self.tolerance.usl.is_none() && self.tolerance.lsl.is_none() {
            return Err(GenerationError::NoSpecificationLimits(
                self.tolerance.to_string(),
            ));
        }
        let l = self.limits;
        if !l.is_sane() || l.r_bar <= 0.0 || l.uclr <= 0.0 {
            return Err(GenerationError::DegenerateLimits {
                sigma: l.sigma,
                r_bar: l.r_bar,
                ucl: l.ucl,
                lcl: l.lcl,
            });
        }
        Ok(())
    }

    /// Decimals used for planned means and ranges
    fn planning_decimals(&self) -> u32 {
        self.resolution
            .map_or(LIMIT_DECIMALS, |r| r.decimals().max(LIMIT_DECIMALS))
    }
}

/// Polymorphic entry point over the standard and reference-range searches
///
/// `Ok(None)` means the budget ran out without a single clean candidate;
/// errors are reserved for inputs no search could satisfy.
pub trait Generator {
    fn generate(
        &self,
        request: &GenerationRequest<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Option<SpcData>, GenerationError>;
}

/// Why an attempt did not end the search
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttemptOutcome {
    Accepted,
    /// Run rules fired; never retained
    RuleViolations(usize),
    /// Clean rule check, Cpk outside the window; eligible as best-so-far
    CpkMiss { cpk: f64 },
    /// Reference band requirements not met
    OutsideReference {
        x_bar_outside: usize,
        points_inside: usize,
    },
    /// σ collapsed or the plan could not be built
    Degenerate,
}

/// Counts of attempt outcomes, for the closing log line
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct OutcomeTally {
    pub violations: usize,
    pub cpk_misses: usize,
    pub outside_reference: usize,
    pub degenerate: usize,
}

impl OutcomeTally {
    pub(crate) fn record(&mut self, outcome: &AttemptOutcome) {
        match outcome {
            AttemptOutcome::Accepted => {}
            AttemptOutcome::RuleViolations(_) => self.violations += 1,
            AttemptOutcome::CpkMiss { .. } => self.cpk_misses += 1,
            AttemptOutcome::OutsideReference { .. } => self.outside_reference += 1,
            AttemptOutcome::Degenerate => self.degenerate += 1,
        }
    }
}

/// Closest-to-target clean candidate seen so far
#[derive(Debug, Default)]
pub struct Best {
    kept: Option<(f64, SpcData)>,
}

impl Best {
    /// Keep `candidate` if it is strictly closer to `target` than what is held
    pub fn offer(self, candidate: SpcData, target: f64) -> Self {
        let distance = (candidate.cpk - target).abs();
        match self.kept {
            Some((held, _)) if held <= distance => self,
            _ => Self {
                kept: Some((distance, candidate)),
            },
        }
    }

    pub fn distance(&self) -> Option<f64> {
        self.kept.as_ref().map(|(d, _)| *d)
    }

    pub fn into_inner(self) -> Option<SpcData> {
        self.kept.map(|(_, data)| data)
    }
}

/// Reference band requirements applied when scoring
#[derive(Debug, Clone, Copy)]
pub(crate) struct BandRequirement {
    pub band: ReferenceRange,
    pub min_points: usize,
}

/// Quantize a candidate and score it like the finished chart
pub(crate) fn score_candidate(
    raw: Matrix,
    request: &GenerationRequest<'_>,
    settings: &SearchSettings,
    band: Option<&BandRequirement>,
    mode: GenerationMode,
    rng: &mut dyn RngCore,
) -> (SpcData, AttemptOutcome) {
    let quantized = quantize_matrix(&raw, request.resolution, rng);
    let estimate = estimate_cpk(&quantized, request.tolerance, request.resolution);
    let (x_bar, ranges) = subgroup_stats(&quantized).unwrap_or_default();

    let mut outcome = if estimate.is_degenerate() || x_bar.is_empty() {
        AttemptOutcome::Degenerate
    } else {
        let violations = check_rules(&x_bar, &ranges, request.limits);
        if violations.is_empty() {
            AttemptOutcome::CpkMiss { cpk: estimate.cpk }
        } else {
            AttemptOutcome::RuleViolations(violations.len())
        }
    };

    if let (Some(req), AttemptOutcome::CpkMiss { .. }) = (band, &outcome) {
        let x_bar_outside = x_bar.iter().filter(|&&x| !req.band.contains(x)).count();
        let points_inside = quantized
            .iter()
            .flatten()
            .filter(|&&v| req.band.contains(v))
            .count();
        if x_bar_outside > 0 || points_inside < req.min_points {
            outcome = AttemptOutcome::OutsideReference {
                x_bar_outside,
                points_inside,
            };
        }
    }

    let accepted = match outcome {
        AttemptOutcome::CpkMiss { cpk } => (cpk - request.target_cpk).abs() <= settings.cpk_window,
        _ => false,
    };
    if accepted {
        outcome = AttemptOutcome::Accepted;
    }

    let data = SpcData {
        max_decimal_places: max_decimal_places(&quantized),
        raw,
        quantized,
        x_bar,
        ranges,
        cpk: estimate.cpk,
        r_bar: estimate.r_bar,
        sigma_within: estimate.sigma_within,
        grand_mean: estimate.grand_mean,
        accepted,
        mode,
        attempts: 0,
    };
    (data, outcome)
}

pub(crate) fn log_progress(attempt: usize, best: &Best, tally: &OutcomeTally) {
    if attempt > 0 && attempt % PROGRESS_INTERVAL == 0 {
        tracing::debug!(
            attempt,
            best_distance = ?best.distance(),
            violations = tally.violations,
            cpk_misses = tally.cpk_misses,
            outside_reference = tally.outside_reference,
            "still searching"
        );
    }
}

/// Standard search with default settings
pub fn generate_standard(
    tolerance: &Tolerance,
    limits: &ControlLimits,
    target_cpk: f64,
    resolution: Option<Resolution>,
    max_attempts: usize,
    rng: &mut dyn RngCore,
) -> Result<Option<SpcData>, GenerationError> {
    let request = GenerationRequest {
        tolerance,
        limits,
        target_cpk,
        resolution,
        max_attempts,
    };
    StandardGenerator::default().generate(&request, rng)
}

/// Reference-range search with default settings
#[allow(clippy::too_many_arguments)]
pub fn generate_reference_range(
    tolerance: &Tolerance,
    limits: &ControlLimits,
    target_cpk: f64,
    resolution: Option<Resolution>,
    ref_lower: f64,
    ref_upper: f64,
    max_attempts: usize,
    rng: &mut dyn RngCore,
) -> Result<Option<SpcData>, GenerationError> {
    let band = ReferenceRange::new(ref_lower, ref_upper)?;
    let request = GenerationRequest {
        tolerance,
        limits,
        target_cpk,
        resolution,
        max_attempts,
    };
    ReferenceRangeGenerator::new(band, SearchSettings::default()).generate(&request, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::limits::{compute_control_limits, derive_control_limits};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn data_with_cpk(cpk: f64) -> SpcData {
        SpcData {
            raw: vec![],
            quantized: vec![],
            x_bar: vec![],
            ranges: vec![],
            cpk,
            r_bar: 0.0,
            sigma_within: 0.0,
            grand_mean: 0.0,
            max_decimal_places: 0,
            accepted: false,
            mode: GenerationMode::Standard,
            attempts: 0,
        }
    }

    #[test]
    fn test_best_keeps_closest() {
        let best = Best::default()
            .offer(data_with_cpk(1.5), 1.33)
            .offer(data_with_cpk(1.35), 1.33)
            .offer(data_with_cpk(1.2), 1.33);
        assert_eq!(best.into_inner().map(|d| d.cpk), Some(1.35));
    }

    #[test]
    fn test_best_ignores_ties() {
        let best = Best::default()
            .offer(data_with_cpk(1.5), 1.25)
            .offer(data_with_cpk(1.0), 1.25);
        assert_eq!(best.distance(), Some(0.25));
        assert_eq!(best.into_inner().map(|d| d.cpk), Some(1.5));
    }

    #[test]
    fn test_empty_best_yields_none() {
        assert!(Best::default().into_inner().is_none());
    }

    #[test]
    fn test_degenerate_limits_are_rejected() {
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        let limits = derive_control_limits(&tol, 0.0, None);
        let mut rng = StdRng::seed_from_u64(1);
        let err = generate_standard(&tol, &limits, 1.33, None, 10, &mut rng);
        assert!(matches!(err, Err(GenerationError::DegenerateLimits { .. })));
    }

    #[test]
    fn test_invalid_target_is_rejected() {
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        let limits = compute_control_limits(&tol, 1.33, None).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let err = generate_standard(&tol, &limits, -1.0, None, 10, &mut rng);
        assert!(matches!(err, Err(GenerationError::InvalidTarget(_))));
    }

    #[test]
    fn test_inverted_reference_band_is_an_error() {
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        let limits = compute_control_limits(&tol, 1.33, Some(9.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let err = generate_reference_range(&tol, &limits, 1.33, None, 9.2, 8.8, 10, &mut rng);
        assert!(matches!(err, Err(GenerationError::Reference(_))));
    }

    #[test]
    fn test_score_flat_candidate_is_degenerate() {
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        let limits = compute_control_limits(&tol, 1.33, None).unwrap();
        let request = GenerationRequest {
            tolerance: &tol,
            limits: &limits,
            target_cpk: 1.33,
            resolution: None,
            max_attempts: 1,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let flat = vec![vec![9.0; 25]; 5];
        let (data, outcome) = score_candidate(
            flat,
            &request,
            &SearchSettings::default(),
            None,
            GenerationMode::Standard,
            &mut rng,
        );
        assert_eq!(outcome, AttemptOutcome::Degenerate);
        assert!(!data.accepted);
        assert_eq!(data.cpk, 0.0);
    }
}
