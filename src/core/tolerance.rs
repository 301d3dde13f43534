//! Specification bands - tolerances and reference distribution ranges

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which specification limits a tolerance carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceKind {
    /// Both USL and LSL
    Double,
    /// Upper limit only (flatness, roughness, "≤0.05")
    Upper,
    /// Lower limit only ("min25")
    Lower,
    /// No numeric specification ("OK", thread callouts)
    None,
}

impl std::fmt::Display for ToleranceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToleranceKind::Double => write!(f, "double"),
            ToleranceKind::Upper => write!(f, "upper"),
            ToleranceKind::Lower => write!(f, "lower"),
            ToleranceKind::None => write!(f, "none"),
        }
    }
}

/// Errors raised when a band violates its invariants
#[derive(Debug, Error, PartialEq)]
pub enum ToleranceError {
    #[error("Lower bound {lower} must be below upper bound {upper}")]
    Inverted { lower: f64, upper: f64 },

    #[error("Reference upper bound {upper} exceeds the tolerance USL {usl}")]
    ReferenceAboveUsl { upper: f64, usl: f64 },

    #[error("Reference lower bound {lower} is below the tolerance LSL {lsl}")]
    ReferenceBelowLsl { lower: f64, lsl: f64 },

    #[error("Bound is not a finite number: {0}")]
    NotFinite(f64),
}

/// A parsed specification band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Upper specification limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usl: Option<f64>,

    /// Lower specification limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lsl: Option<f64>,

    pub kind: ToleranceKind,

    /// Source text the tolerance was parsed from, if any
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw: String,
}

impl Tolerance {
    /// Double-sided tolerance; fails unless `usl > lsl`
    pub fn double(usl: f64, lsl: f64) -> Result<Self, ToleranceError> {
        check_finite(usl)?;
        check_finite(lsl)?;
        if usl <= lsl {
            return Err(ToleranceError::Inverted {
                lower: lsl,
                upper: usl,
            });
        }
        Ok(Self {
            usl: Some(usl),
            lsl: Some(lsl),
            kind: ToleranceKind::Double,
            raw: String::new(),
        })
    }

    pub fn upper_only(usl: f64) -> Self {
        Self {
            usl: Some(usl),
            lsl: None,
            kind: ToleranceKind::Upper,
            raw: String::new(),
        }
    }

    pub fn lower_only(lsl: f64) -> Self {
        Self {
            usl: None,
            lsl: Some(lsl),
            kind: ToleranceKind::Lower,
            raw: String::new(),
        }
    }

    pub fn none() -> Self {
        Self {
            usl: None,
            lsl: None,
            kind: ToleranceKind::None,
            raw: String::new(),
        }
    }

    /// Attach the source text
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = raw.into();
        self
    }

    /// Nominal process center implied by the tolerance
    ///
    /// Midpoint for double-sided bands, USL/2 for upper-only and
    /// LSL×1.5 for lower-only. Undefined without bounds.
    pub fn center(&self) -> Option<f64> {
        match (self.usl, self.lsl) {
            (Some(usl), Some(lsl)) => Some((usl + lsl) / 2.0),
            (Some(usl), None) => Some(usl / 2.0),
            (None, Some(lsl)) => Some(lsl * 1.5),
            (None, None) => None,
        }
    }

    /// USL − LSL when both bounds are present
    pub fn width(&self) -> Option<f64> {
        match (self.usl, self.lsl) {
            (Some(usl), Some(lsl)) => Some(usl - lsl),
            _ => None,
        }
    }

    /// Check the bounds agree with the variant tag
    pub fn is_valid(&self) -> bool {
        match self.kind {
            ToleranceKind::Double => matches!((self.usl, self.lsl), (Some(u), Some(l)) if u > l),
            ToleranceKind::Upper => self.usl.is_some(),
            ToleranceKind::Lower => self.lsl.is_some(),
            ToleranceKind::None => true,
        }
    }

    /// True when the value lies inside whichever limits exist
    pub fn contains(&self, value: f64) -> bool {
        self.usl.is_none_or(|usl| value <= usl) && self.lsl.is_none_or(|lsl| value >= lsl)
    }
}

impl std::fmt::Display for Tolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.usl, self.lsl) {
            (Some(usl), Some(lsl)) => write!(f, "[{}, {}]", lsl, usl),
            (Some(usl), None) => write!(f, "≤ {}", usl),
            (None, Some(lsl)) => write!(f, "≥ {}", lsl),
            (None, None) => write!(f, "(no limits)"),
        }
    }
}

/// Narrow band inside the tolerance where real production data clusters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub lower: f64,
    pub upper: f64,
}

impl ReferenceRange {
    pub fn new(lower: f64, upper: f64) -> Result<Self, ToleranceError> {
        check_finite(lower)?;
        check_finite(upper)?;
        if lower >= upper {
            return Err(ToleranceError::Inverted { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    pub fn center(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Inclusive membership test
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Verify the band does not poke outside the tolerance on either side
    pub fn check_within(&self, tolerance: &Tolerance) -> Result<(), ToleranceError> {
        if let Some(usl) = tolerance.usl {
            if self.upper > usl {
                return Err(ToleranceError::ReferenceAboveUsl {
                    upper: self.upper,
                    usl,
                });
            }
        }
        if let Some(lsl) = tolerance.lsl {
            if self.lower < lsl {
                return Err(ToleranceError::ReferenceBelowLsl {
                    lower: self.lower,
                    lsl,
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for ReferenceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.lower, self.upper)
    }
}

fn check_finite(value: f64) -> Result<(), ToleranceError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ToleranceError::NotFinite(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_center_and_width() {
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        assert_eq!(tol.center(), Some(9.0));
        assert_eq!(tol.width(), Some(2.0));
        assert!(tol.is_valid());
    }

    #[test]
    fn test_double_rejects_inverted_bounds() {
        assert!(Tolerance::double(8.0, 10.0).is_err());
        assert!(Tolerance::double(8.0, 8.0).is_err());
    }

    #[test]
    fn test_one_sided_centers() {
        assert_eq!(Tolerance::upper_only(0.05).center(), Some(0.025));
        assert_eq!(Tolerance::lower_only(20.0).center(), Some(30.0));
        assert_eq!(Tolerance::upper_only(0.05).width(), None);
        assert_eq!(Tolerance::none().center(), None);
    }

    #[test]
    fn test_is_valid_checks_variant_bounds() {
        let mut tol = Tolerance::upper_only(1.0);
        tol.usl = None;
        assert!(!tol.is_valid());

        let inverted = Tolerance {
            usl: Some(1.0),
            lsl: Some(2.0),
            kind: ToleranceKind::Double,
            raw: String::new(),
        };
        assert!(!inverted.is_valid());
        assert!(Tolerance::none().is_valid());
    }

    #[test]
    fn test_reference_range_invariants() {
        assert!(ReferenceRange::new(1.0, 1.0).is_err());
        assert!(ReferenceRange::new(2.0, 1.0).is_err());
        let band = ReferenceRange::new(52.992, 52.999).unwrap();
        assert!((band.center() - 52.9955).abs() < 1e-9);
        assert!((band.width() - 0.007).abs() < 1e-9);
        assert!(band.contains(52.992));
        assert!(band.contains(52.999));
        assert!(!band.contains(53.0));
    }

    #[test]
    fn test_reference_range_must_fit_tolerance() {
        let tol = Tolerance::double(53.0, 52.99).unwrap();
        let inside = ReferenceRange::new(52.992, 52.999).unwrap();
        assert!(inside.check_within(&tol).is_ok());

        let above = ReferenceRange::new(52.995, 53.01).unwrap();
        assert!(matches!(
            above.check_within(&tol),
            Err(ToleranceError::ReferenceAboveUsl { .. })
        ));

        let below = ReferenceRange::new(52.98, 52.995).unwrap();
        assert!(matches!(
            below.check_within(&tol),
            Err(ToleranceError::ReferenceBelowLsl { .. })
        ));
    }

    #[test]
    fn test_tolerance_serialization_roundtrip() {
        let tol = Tolerance::double(3.6, 3.4).unwrap().with_raw("φ3.5±0.1");
        let yaml = serde_yml::to_string(&tol).unwrap();
        assert!(yaml.contains("kind: double"));
        let parsed: Tolerance = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(parsed, tol);
    }
}
