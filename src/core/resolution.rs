//! Instrument resolution and quantization
//!
//! Generated values are snapped to what the measuring instrument could
//! actually display. Decimal resolutions round half-up; the 0.02 gauge
//! reads in even hundredths, so odd hundredths are nudged by ±0.01.

use rand::{Rng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::core::limits::round_half_up;

/// Decimal powers recognised as plain rounding
const DECIMAL_POWERS: [(f64, u32); 5] = [
    (0.1, 1),
    (0.01, 2),
    (0.001, 3),
    (0.0001, 4),
    (0.00001, 5),
];

#[derive(Debug, Error, PartialEq)]
pub enum ResolutionError {
    #[error("Resolution '{0}' is not a positive number")]
    Invalid(String),
}

/// Smallest increment an instrument can distinguish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 0.1, 0.01, ... 0.00001: round to the matching decimal places
    Decimal(u32),
    /// 0.02: two decimals, even hundredths preferred
    EvenHundredths,
    /// Any other increment, rounded to the places it is written with;
    /// the step is `units` × 10^-`places` (0.005 is 5 units at 3 places)
    Places { places: u32, units: u64 },
}

impl Resolution {
    /// Decimal places a quantized value carries
    pub fn decimals(&self) -> u32 {
        match self {
            Resolution::Decimal(places) | Resolution::Places { places, .. } => *places,
            Resolution::EvenHundredths => 2,
        }
    }

    /// Step size as a number
    pub fn step(&self) -> f64 {
        match self {
            Resolution::EvenHundredths => 0.02,
            Resolution::Decimal(places) => 10f64.powi(-(*places as i32)),
            Resolution::Places { places, units } => {
                *units as f64 * 10f64.powi(-(*places as i32))
            }
        }
    }

    /// Quantize one reading
    ///
    /// Only the 0.02 gauge consumes randomness.
    pub fn quantize(&self, value: f64, rng: &mut dyn RngCore) -> f64 {
        match self {
            Resolution::Decimal(places) | Resolution::Places { places, .. } => {
                round_half_up(value, *places)
            }
            Resolution::EvenHundredths => {
                let rounded = round_half_up(value, 2);
                let hundredths = (rounded * 100.0).round() as i64;
                if hundredths.rem_euclid(2) == 0 {
                    return rounded;
                }
                let mut adjusted = if rng.random_bool(0.5) {
                    rounded + 0.01
                } else {
                    rounded - 0.01
                };
                if adjusted < 0.0 {
                    adjusted = if rounded >= 0.0 { rounded + 0.01 } else { 0.0 };
                }
                round_half_up(adjusted, 2)
            }
        }
    }

    /// Deterministic rounding to the resolution's decimal places
    ///
    /// Idempotent on already-quantized data; used for defensive
    /// re-quantization where a random nudge would alter the sample.
    pub fn snap(&self, value: f64) -> f64 {
        round_half_up(value, self.decimals())
    }
}

impl std::str::FromStr for Resolution {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let value: f64 = text
            .parse()
            .map_err(|_| ResolutionError::Invalid(s.to_string()))?;
        if !value.is_finite() || value <= 0.0 {
            return Err(ResolutionError::Invalid(s.to_string()));
        }
        Ok(Self::from_value_and_text(value, text))
    }
}

impl Resolution {
    /// Build from a numeric resolution
    pub fn from_value(value: f64) -> Result<Self, ResolutionError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ResolutionError::Invalid(value.to_string()));
        }
        Ok(Self::from_value_and_text(value, &value.to_string()))
    }

    fn from_value_and_text(value: f64, text: &str) -> Self {
        if let Some((_, places)) = DECIMAL_POWERS
            .iter()
            .find(|(step, _)| (value - step).abs() < 1e-12)
        {
            return Resolution::Decimal(*places);
        }
        if (value - 0.02).abs() < 1e-12 {
            return Resolution::EvenHundredths;
        }
        let written = if text.contains(['e', 'E']) {
            value.to_string()
        } else {
            text.to_string()
        };
        let places = written
            .split_once('.')
            .map(|(_, frac)| frac.chars().filter(char::is_ascii_digit).count() as u32)
            .unwrap_or(0);
        let units = written
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse::<u64>()
            .ok()
            .filter(|&u| u > 0)
            .unwrap_or(1);
        Resolution::Places { places, units }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::EvenHundredths => write!(f, "0.02"),
            Resolution::Decimal(places) => write_fixed(f, 1, *places),
            Resolution::Places { places, units } => write_fixed(f, *units, *places),
        }
    }
}

/// `units` × 10^-`places` written out exactly, e.g. (5, 3) as "0.005"
fn write_fixed(f: &mut std::fmt::Formatter<'_>, units: u64, places: u32) -> std::fmt::Result {
    let digits = format!("{:0>width$}", units, width = places as usize + 1);
    if places == 0 {
        return write!(f, "{}", digits);
    }
    let (whole, frac) = digits.split_at(digits.len() - places as usize);
    write!(f, "{}.{}", whole, frac)
}

impl Serialize for Resolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Resolution::from_value(v).map_err(serde::de::Error::custom),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Quantize a whole matrix; `None` passes values through unchanged
pub fn quantize_matrix(
    matrix: &[Vec<f64>],
    resolution: Option<Resolution>,
    rng: &mut dyn RngCore,
) -> Vec<Vec<f64>> {
    match resolution {
        None => matrix.to_vec(),
        Some(res) => matrix
            .iter()
            .map(|row| row.iter().map(|&v| res.quantize(v, rng)).collect())
            .collect(),
    }
}

/// Decimal places of a value in its shortest round-trip representation
pub fn decimal_places(value: f64) -> u32 {
    let text = value.to_string();
    text.split_once('.')
        .map(|(_, frac)| frac.len() as u32)
        .unwrap_or(0)
}

/// Largest number of decimal places present anywhere in the matrix
pub fn max_decimal_places(matrix: &[Vec<f64>]) -> u32 {
    matrix
        .iter()
        .flatten()
        .map(|&v| decimal_places(v))
        .max()
        .unwrap_or(0)
}
