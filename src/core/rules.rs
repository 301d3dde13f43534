//! Run-rule checks for X̄-R charts
//!
//! Eight windowed rules on the X̄ series plus point checks on the R series.
//! Every qualifying window is reported, so a long run can fire the same rule
//! several times. Positions in the output are 1-based, as printed on the
//! chart.

use serde::Serialize;

use crate::core::constants::SUBGROUP_COUNT;
use crate::core::limits::ControlLimits;

const TREND_LEN: usize = 6;
const ALTERNATING_LEN: usize = 14;
const STRATIFICATION_LEN: usize = 15;
const MIXTURE_LEN: usize = 8;
const SHIFT_LEN: usize = 9;

/// Direction of a monotonic run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
}

/// Side of the center line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Above,
    Below,
}

/// One rule violation; `start`/`end`/`point` are 1-based
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Violation {
    InsufficientData { points: usize },
    BeyondLimits { point: usize, value: f64 },
    Trend { start: usize, end: usize, direction: Trend },
    Alternating { start: usize, end: usize },
    Stratification { start: usize, end: usize },
    Mixture { start: usize, end: usize },
    Shift { start: usize, end: usize, side: Side },
    TwoOfThreeBeyondZoneB { start: usize, end: usize, count: usize, side: Side },
    FourOfFiveBeyondZoneC { start: usize, end: usize, count: usize, side: Side },
    RangeAboveLimit { point: usize, value: f64 },
    RangeBelowLimit { point: usize, value: f64 },
    ZeroRange { point: usize },
}

impl Violation {
    /// Rule number on the X̄ chart, `None` for range-chart and data checks
    pub fn rule(&self) -> Option<u8> {
        match self {
            Violation::BeyondLimits { .. } => Some(1),
            Violation::Trend { .. } => Some(2),
            Violation::Alternating { .. } => Some(3),
            Violation::Stratification { .. } => Some(4),
            Violation::Mixture { .. } => Some(5),
            Violation::Shift { .. } => Some(6),
            Violation::TwoOfThreeBeyondZoneB { .. } => Some(7),
            Violation::FourOfFiveBeyondZoneC { .. } => Some(8),
            _ => None,
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Increasing => write!(f, "increasing"),
            Trend::Decreasing => write!(f, "decreasing"),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Above => write!(f, "above"),
            Side::Below => write!(f, "below"),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::InsufficientData { points } => write!(
                f,
                "Insufficient data: {} points, need {}",
                points, SUBGROUP_COUNT
            ),
            Violation::BeyondLimits { point, value } => {
                write!(f, "Rule 1: point {} ({}) outside control limits", point, value)
            }
            Violation::Trend {
                start,
                end,
                direction,
            } => write!(
                f,
                "Rule 2: points {}-{} continuously {}",
                start, end, direction
            ),
            Violation::Alternating { start, end } => {
                write!(f, "Rule 3: points {}-{} alternate up and down", start, end)
            }
            Violation::Stratification { start, end } => {
                write!(f, "Rule 4: points {}-{} all within zone C", start, end)
            }
            Violation::Mixture { start, end } => write!(
                f,
                "Rule 5: points {}-{} outside zone C on both sides",
                start, end
            ),
            Violation::Shift { start, end, side } => {
                write!(f, "Rule 6: points {}-{} all {} center line", start, end, side)
            }
            Violation::TwoOfThreeBeyondZoneB {
                start,
                end,
                count,
                side,
            } => write!(
                f,
                "Rule 7: {} of points {}-{} {} zone B",
                count, start, end, side
            ),
            Violation::FourOfFiveBeyondZoneC {
                start,
                end,
                count,
                side,
            } => write!(
                f,
                "Rule 8: {} of points {}-{} {} zone C",
                count, start, end, side
            ),
            Violation::RangeAboveLimit { point, value } => {
                write!(f, "R chart: point {} ({}) above UCLR", point, value)
            }
            Violation::RangeBelowLimit { point, value } => {
                write!(f, "R chart: point {} ({}) below LCLR", point, value)
            }
            Violation::ZeroRange { point } => write!(f, "R chart: point {} has zero range", point),
        }
    }
}

/// Check the X̄ and R series against the eight rules
///
/// Returns an empty list when the process is in control. With fewer than
/// 25 points only [`Violation::InsufficientData`] is reported.
pub fn check_rules(x: &[f64], r: &[f64], limits: &ControlLimits) -> Vec<Violation> {
    let points = x.len().min(r.len());
    if points < SUBGROUP_COUNT {
        return vec![Violation::InsufficientData { points }];
    }
    let x = &x[..points];
    let r = &r[..points];

    let mut violations = Vec::new();
    beyond_limits(x, limits, &mut violations);
    trends(x, &mut violations);
    alternating(x, &mut violations);
    stratification(x, limits, &mut violations);
    mixture(x, limits, &mut violations);
    shifts(x, limits, &mut violations);
    beyond_zone(x, 3, 2, limits.ucl2, limits.lcl2, &mut violations, |s, e, c, side| {
        Violation::TwoOfThreeBeyondZoneB {
            start: s,
            end: e,
            count: c,
            side,
        }
    });
    beyond_zone(x, 5, 4, limits.ucl1, limits.lcl1, &mut violations, |s, e, c, side| {
        Violation::FourOfFiveBeyondZoneC {
            start: s,
            end: e,
            count: c,
            side,
        }
    });
    range_chart(r, limits, &mut violations);
    violations
}

/// Convenience for callers that only need a yes/no
pub fn in_control(x: &[f64], r: &[f64], limits: &ControlLimits) -> bool {
    check_rules(x, r, limits).is_empty()
}

fn beyond_limits(x: &[f64], limits: &ControlLimits, out: &mut Vec<Violation>) {
    for (i, &v) in x.iter().enumerate() {
        if v > limits.ucl || v < limits.lcl {
            out.push(Violation::BeyondLimits {
                point: i + 1,
                value: v,
            });
        }
    }
}

fn trends(x: &[f64], out: &mut Vec<Violation>) {
    for (i, w) in x.windows(TREND_LEN).enumerate() {
        let direction = if w.windows(2).all(|p| p[1] > p[0]) {
            Trend::Increasing
        } else if w.windows(2).all(|p| p[1] < p[0]) {
            Trend::Decreasing
        } else {
            continue;
        };
        out.push(Violation::Trend {
            start: i + 1,
            end: i + TREND_LEN,
            direction,
        });
    }
}

fn alternating(x: &[f64], out: &mut Vec<Violation>) {
    for (i, w) in x.windows(ALTERNATING_LEN).enumerate() {
        let diffs: Vec<f64> = w.windows(2).map(|p| p[1] - p[0]).collect();
        let zigzag = diffs[0] != 0.0
            && diffs
                .windows(2)
                .all(|d| (d[0] > 0.0 && d[1] < 0.0) || (d[0] < 0.0 && d[1] > 0.0));
        if zigzag {
            out.push(Violation::Alternating {
                start: i + 1,
                end: i + ALTERNATING_LEN,
            });
        }
    }
}

fn in_zone_c(v: f64, limits: &ControlLimits) -> bool {
    v >= limits.lcl1 && v <= limits.ucl1
}

fn stratification(x: &[f64], limits: &ControlLimits, out: &mut Vec<Violation>) {
    for (i, w) in x.windows(STRATIFICATION_LEN).enumerate() {
        if w.iter().all(|&v| in_zone_c(v, limits)) {
            out.push(Violation::Stratification {
                start: i + 1,
                end: i + STRATIFICATION_LEN,
            });
        }
    }
}

fn mixture(x: &[f64], limits: &ControlLimits, out: &mut Vec<Violation>) {
    for (i, w) in x.windows(MIXTURE_LEN).enumerate() {
        if w.iter().any(|&v| in_zone_c(v, limits)) {
            continue;
        }
        let above = w.iter().any(|&v| v > limits.cl);
        let below = w.iter().any(|&v| v < limits.cl);
        if above && below {
            out.push(Violation::Mixture {
                start: i + 1,
                end: i + MIXTURE_LEN,
            });
        }
    }
}

fn shifts(x: &[f64], limits: &ControlLimits, out: &mut Vec<Violation>) {
    for (i, w) in x.windows(SHIFT_LEN).enumerate() {
        let side = if w.iter().all(|&v| v > limits.cl) {
            Side::Above
        } else if w.iter().all(|&v| v < limits.cl) {
            Side::Below
        } else {
            continue;
        };
        out.push(Violation::Shift {
            start: i + 1,
            end: i + SHIFT_LEN,
            side,
        });
    }
}

/// "k of n beyond a zone boundary on the same side" (rules 7 and 8)
fn beyond_zone(
    x: &[f64],
    len: usize,
    needed: usize,
    upper: f64,
    lower: f64,
    out: &mut Vec<Violation>,
    make: impl Fn(usize, usize, usize, Side) -> Violation,
) {
    for (i, w) in x.windows(len).enumerate() {
        let above = w.iter().filter(|&&v| v > upper).count();
        let below = w.iter().filter(|&&v| v < lower).count();
        if above >= needed {
            out.push(make(i + 1, i + len, above, Side::Above));
        }
        if below >= needed {
            out.push(make(i + 1, i + len, below, Side::Below));
        }
    }
}

fn range_chart(r: &[f64], limits: &ControlLimits, out: &mut Vec<Violation>) {
    for (i, &v) in r.iter().enumerate() {
        if v > limits.uclr {
            out.push(Violation::RangeAboveLimit {
                point: i + 1,
                value: v,
            });
        }
        if v < limits.lclr {
            out.push(Violation::RangeBelowLimit {
                point: i + 1,
                value: v,
            });
        }
        if v == 0.0 {
            out.push(Violation::ZeroRange { point: i + 1 });
        }
    }
}
