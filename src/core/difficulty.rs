//! Feasibility of a target Cpk for data confined to a reference band
//!
//! The band bounds how spread out the data can be. Reading the band as a
//! full ±3σ spread gives the tightest σ, reading it as one average range
//! gives the loosest; both are scored at the band center.

use serde::Serialize;

use crate::core::constants::{D2, FEASIBILITY_SLACK};
use crate::core::tolerance::{ReferenceRange, Tolerance};

/// Relative width below which the achievable interval counts as tight
const TIGHT_INTERVAL: f64 = 0.15;

/// How hard a target is to hit with a given reference band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    Low,
    Medium,
    High,
}

impl DifficultyTier {
    /// Scale a base attempt budget to the difficulty
    pub fn recommended_attempts(&self, base: usize) -> usize {
        match self {
            DifficultyTier::Low => (base / 2).max(1),
            DifficultyTier::Medium => base,
            DifficultyTier::High => base.saturating_mul(3) / 2,
        }
    }
}

impl std::fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DifficultyTier::Low => write!(f, "low"),
            DifficultyTier::Medium => write!(f, "medium"),
            DifficultyTier::High => write!(f, "high"),
        }
    }
}

/// Where the target sits relative to the achievable interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Feasibility {
    Below,
    Within,
    Above,
}

impl std::fmt::Display for Feasibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feasibility::Below => write!(f, "below the achievable range"),
            Feasibility::Within => write!(f, "within the achievable range"),
            Feasibility::Above => write!(f, "above the achievable range"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DifficultyAssessment {
    pub cpk_lower: f64,
    pub cpk_upper: f64,
    pub tier: DifficultyTier,
    pub feasibility: Feasibility,
    pub target_cpk: f64,
}

impl DifficultyAssessment {
    /// Midpoint of the achievable interval, offered as a replacement target
    pub fn suggested_target(&self) -> f64 {
        (self.cpk_lower + self.cpk_upper) / 2.0
    }
}

/// Cpk at the band center for a given σ, against whichever limits exist
fn cpk_at(tolerance: &Tolerance, center: f64, sigma: f64) -> f64 {
    let ppu = tolerance.usl.map(|usl| (usl - center) / (3.0 * sigma));
    let ppl = tolerance.lsl.map(|lsl| (center - lsl) / (3.0 * sigma));
    match (ppu, ppl) {
        (Some(u), Some(l)) => u.min(l),
        (Some(u), None) => u,
        (None, Some(l)) => l,
        (None, None) => 0.0,
    }
}

/// Achievable Cpk interval and difficulty tier for a reference band
pub fn evaluate_difficulty(
    tolerance: &Tolerance,
    reference: &ReferenceRange,
    target_cpk: f64,
) -> DifficultyAssessment {
    let width = reference.width();
    let center = reference.center();

    let (cpk_lower, cpk_upper) = if width > 0.0 {
        (
            cpk_at(tolerance, center, width / D2),
            cpk_at(tolerance, center, width / 6.0),
        )
    } else {
        (0.0, 0.0)
    };

    let feasibility = if target_cpk < cpk_lower - FEASIBILITY_SLACK {
        Feasibility::Below
    } else if target_cpk > cpk_upper + FEASIBILITY_SLACK {
        Feasibility::Above
    } else {
        Feasibility::Within
    };

    DifficultyAssessment {
        cpk_lower,
        cpk_upper,
        tier: classify(cpk_lower, cpk_upper, target_cpk),
        feasibility,
        target_cpk,
    }
}

fn classify(lower: f64, upper: f64, target: f64) -> DifficultyTier {
    let span = upper - lower;
    if target <= lower || target >= upper || span < TIGHT_INTERVAL * target {
        return DifficultyTier::High;
    }
    let position = (target - lower) / span;
    if (0.25..=0.75).contains(&position) {
        DifficultyTier::Low
    } else {
        DifficultyTier::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_for_double_sided_band() {
        let tol = Tolerance::double(53.005, 52.985).unwrap();
        let band = ReferenceRange::new(52.992, 52.999).unwrap();
        let a = evaluate_difficulty(&tol, &band, 1.33);

        // center 52.9955: distances 0.0095 / 0.0105, nearest is USL
        let expected_lower = 0.0095 / (3.0 * 0.007 / D2);
        let expected_upper = 0.0095 / (3.0 * 0.007 / 6.0);
        assert!((a.cpk_lower - expected_lower).abs() < 1e-9);
        assert!((a.cpk_upper - expected_upper).abs() < 1e-9);
        assert!(a.cpk_lower < a.cpk_upper);
        assert_eq!(a.feasibility, Feasibility::Within);
    }

    #[test]
    fn test_target_outside_interval_is_high() {
        let tol = Tolerance::double(53.005, 52.985).unwrap();
        let band = ReferenceRange::new(52.992, 52.999).unwrap();

        let above = evaluate_difficulty(&tol, &band, 10.0);
        assert_eq!(above.tier, DifficultyTier::High);
        assert_eq!(above.feasibility, Feasibility::Above);

        let below = evaluate_difficulty(&tol, &band, 0.2);
        assert_eq!(below.tier, DifficultyTier::High);
        assert_eq!(below.feasibility, Feasibility::Below);
    }

    #[test]
    fn test_mid_interval_target_is_low() {
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        let band = ReferenceRange::new(8.8, 9.2).unwrap();
        let a = evaluate_difficulty(&tol, &band, 1.0);
        let mid = a.suggested_target();
        let at_mid = evaluate_difficulty(&tol, &band, mid);
        assert_eq!(at_mid.tier, DifficultyTier::Low);

        let near_edge = a.cpk_lower + 0.1 * (a.cpk_upper - a.cpk_lower);
        assert_eq!(
            evaluate_difficulty(&tol, &band, near_edge).tier,
            DifficultyTier::Medium
        );
    }

    #[test]
    fn test_one_sided_and_unbounded() {
        let band = ReferenceRange::new(0.01, 0.02).unwrap();
        let upper = evaluate_difficulty(&Tolerance::upper_only(0.05), &band, 1.5);
        assert!((upper.cpk_upper - 0.035 / (3.0 * 0.01 / 6.0)).abs() < 1e-9);

        let lower = evaluate_difficulty(&Tolerance::lower_only(0.0), &band, 1.5);
        assert!((lower.cpk_lower - 0.015 / (3.0 * 0.01 / D2)).abs() < 1e-9);

        let none = evaluate_difficulty(&Tolerance::none(), &band, 1.5);
        assert_eq!((none.cpk_lower, none.cpk_upper), (0.0, 0.0));
        assert_eq!(none.tier, DifficultyTier::High);
    }

    #[test]
    fn test_recommended_attempts() {
        assert_eq!(DifficultyTier::Low.recommended_attempts(4000), 2000);
        assert_eq!(DifficultyTier::Medium.recommended_attempts(4000), 4000);
        assert_eq!(DifficultyTier::High.recommended_attempts(4000), 6000);
        assert_eq!(DifficultyTier::Low.recommended_attempts(1), 1);
    }
}
