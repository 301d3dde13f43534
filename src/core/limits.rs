//! Control limit derivation for X̄-R charts
//!
//! Limits are derived backwards from a tolerance and the Cpk the process
//! is supposed to show: σ = tolerance range / (6 × Cpk). The X̄ chart gets
//! the center line plus 1σ/2σ/3σ zone boundaries, the R chart gets
//! R̄ = d2·σ with D3/D4 limits.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::constants::{D2, D3, D4, LIMIT_DECIMALS};
use crate::core::tolerance::{Tolerance, ToleranceKind};

/// Invalid input for limit derivation
#[derive(Debug, Error, PartialEq)]
pub enum LimitsError {
    #[error("Tolerance {tolerance} is not valid for a {kind} specification")]
    InvalidTolerance {
        tolerance: String,
        kind: ToleranceKind,
    },

    #[error("Tolerance has no specification limits; control limits cannot be derived")]
    NoLimits,

    #[error("Target Cpk must be a positive number, got {0}")]
    InvalidTargetCpk(f64),

    #[error("Derived limits are not usable (UCL {ucl} / LCL {lcl}, UCLR {uclr} / LCLR {lclr}, sigma {sigma})")]
    Degenerate {
        ucl: f64,
        lcl: f64,
        uclr: f64,
        lclr: f64,
        sigma: f64,
    },
}

/// X̄ and R chart limits
///
/// Everything except `sigma` and `r_bar` is rounded half-up to three
/// decimals, matching what gets printed on the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlLimits {
    /// Center line
    pub cl: f64,
    /// CL + 3σ
    pub ucl: f64,
    /// CL − 3σ
    pub lcl: f64,
    /// CL + 1σ (upper edge of zone C)
    pub ucl1: f64,
    /// CL + 2σ (upper edge of zone B)
    pub ucl2: f64,
    /// CL − 1σ
    pub lcl1: f64,
    /// CL − 2σ
    pub lcl2: f64,
    /// R chart center line (rounded R̄)
    pub clr: f64,
    /// D4 · R̄
    pub uclr: f64,
    /// D3 · R̄
    pub lclr: f64,
    /// Process sigma at full precision
    pub sigma: f64,
    /// Average range at full precision
    pub r_bar: f64,
}

impl ControlLimits {
    /// UCL > LCL, UCLR > LCLR and σ > 0
    pub fn is_sane(&self) -> bool {
        self.ucl > self.lcl && self.uclr > self.lclr && self.sigma > 0.0
    }

    /// Width of the X̄ chart between the 3σ limits
    pub fn span(&self) -> f64 {
        self.ucl - self.lcl
    }
}

/// Round half away from zero to `places` decimals
///
/// The scaled value is first snapped to 1e-6 so that binary noise such as
/// 2.675 × 100 = 267.49999999999997 still rounds up.
pub fn round_half_up(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    let scaled = value * factor;
    let snapped = (scaled * 1e6).round() / 1e6;
    snapped.round() / factor
}

/// Tolerance range used for σ: USL−LSL, USL alone, or CL−LSL
fn effective_range(tolerance: &Tolerance, cl: f64) -> f64 {
    match (tolerance.usl, tolerance.lsl) {
        (Some(usl), Some(lsl)) => usl - lsl,
        (Some(usl), None) => usl,
        (None, lsl) => cl - lsl.unwrap_or(0.0),
    }
}

/// Derive limits without validating them
///
/// `center` overrides the tolerance-derived center line (reference-range
/// mode). A non-positive target yields σ = 0, which [`ControlLimits::is_sane`]
/// rejects.
pub fn derive_control_limits(
    tolerance: &Tolerance,
    target_cpk: f64,
    center: Option<f64>,
) -> ControlLimits {
    let cl = center.or_else(|| tolerance.center()).unwrap_or(0.0);
    let range = effective_range(tolerance, cl);

    let sigma = if target_cpk > 0.0 {
        range / (6.0 * target_cpk)
    } else {
        0.0
    };

    let r_bar = sigma * D2;
    let round = |v: f64| round_half_up(v, LIMIT_DECIMALS);

    ControlLimits {
        cl: round(cl),
        ucl: round(cl + 3.0 * sigma),
        lcl: round(cl - 3.0 * sigma),
        ucl1: round(cl + sigma),
        ucl2: round(cl + 2.0 * sigma),
        lcl1: round(cl - sigma),
        lcl2: round(cl - 2.0 * sigma),
        clr: round(r_bar),
        uclr: round(D4 * r_bar),
        lclr: round(D3 * r_bar),
        sigma,
        r_bar,
    }
}

/// Compute control limits, rejecting inputs that cannot produce a usable chart
pub fn compute_control_limits(
    tolerance: &Tolerance,
    target_cpk: f64,
    center: Option<f64>,
) -> Result<ControlLimits, LimitsError> {
    if !target_cpk.is_finite() || target_cpk <= 0.0 {
        return Err(LimitsError::InvalidTargetCpk(target_cpk));
    }
    if tolerance.kind == ToleranceKind::None {
        return Err(LimitsError::NoLimits);
    }
    if !tolerance.is_valid() {
        return Err(LimitsError::InvalidTolerance {
            tolerance: tolerance.to_string(),
            kind: tolerance.kind,
        });
    }

    let limits = derive_control_limits(tolerance, target_cpk, center);
    if !limits.is_sane() {
        return Err(LimitsError::Degenerate {
            ucl: limits.ucl,
            lcl: limits.lcl,
            uclr: limits.uclr,
            lclr: limits.lclr,
            sigma: limits.sigma,
        });
    }

    debug!(
        cl = limits.cl,
        ucl = limits.ucl,
        lcl = limits.lcl,
        sigma = limits.sigma,
        r_bar = limits.r_bar,
        "control limits derived"
    );
    Ok(limits)
}
