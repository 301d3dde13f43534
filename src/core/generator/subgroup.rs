//! Planning subgroup means/ranges and expanding them into measurements

use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};

use super::{GenerationError, Matrix};
use crate::core::constants::{D2, SIGMA_EPSILON, SUBGROUP_COUNT, SUBGROUP_SIZE};
use crate::core::limits::{round_half_up, ControlLimits};
use crate::core::tolerance::{ReferenceRange, Tolerance};

/// Share of UCL−LCL kept clear on each side when drawing means
const SAFE_MARGIN: f64 = 0.08;

/// Means are drawn with σ_mean = 0.8σ around the (offset) center
const MEAN_SPREAD: f64 = 0.8;

/// Maximum random shift of the process center, in σ
const CENTER_OFFSET: f64 = 0.2;

/// Ranges stay below this share of UCLR
const RANGE_CAP: f64 = 0.95;

/// Ranges vary by at most ±60% around the required R̄
const RANGE_SPREAD: f64 = 0.6;

/// Fallback layout of a subgroup, as fractions of its range
const REPAIR_PATTERN: [f64; SUBGROUP_SIZE] = [-0.5, -0.2, 0.0, 0.2, 0.5];

/// Share of the band width a forced point may sit inside the band edge
const FORCE_DEPTH: f64 = 0.1;

pub(crate) fn normal(mean: f64, std_dev: f64) -> Result<Normal<f64>, GenerationError> {
    Normal::new(mean, std_dev)
        .map_err(|e| GenerationError::Sampling(format!("N({}, {}): {}", mean, std_dev, e)))
}

/// Uniform draw in ±`half_width`; zero width returns zero without consuming randomness
pub(crate) fn symmetric_offset(half_width: f64, rng: &mut dyn RngCore) -> f64 {
    if half_width > 0.0 {
        rng.random_range(-half_width..=half_width)
    } else {
        0.0
    }
}

/// 25 subgroup means around the tolerance center, clamped into the safe interior
pub(crate) fn plan_means(
    center: f64,
    limits: &ControlLimits,
    places: u32,
    rng: &mut dyn RngCore,
) -> Result<Vec<f64>, GenerationError> {
    let offset = symmetric_offset(limits.sigma * CENTER_OFFSET, rng);
    let dist = normal(center + offset, limits.sigma * MEAN_SPREAD)?;

    let margin = limits.span() * SAFE_MARGIN;
    let (low, high) = (limits.lcl + margin, limits.ucl - margin);

    Ok((0..SUBGROUP_COUNT)
        .map(|_| round_half_up(dist.sample(rng).clamp(low, high), places))
        .collect())
}

/// 25 subgroup means inside a reference band
///
/// The center shift is additionally capped at half the band width.
pub(crate) fn plan_means_in_band(
    band: &ReferenceRange,
    limits: &ControlLimits,
    spread_divisor: f64,
    places: u32,
    rng: &mut dyn RngCore,
) -> Result<Vec<f64>, GenerationError> {
    let max_offset = (limits.sigma * CENTER_OFFSET).min(band.width() / 2.0);
    let offset = symmetric_offset(max_offset, rng);
    let dist = normal(band.center() + offset, band.width() / spread_divisor)?;

    Ok((0..SUBGROUP_COUNT)
        .map(|_| round_half_up(dist.sample(rng).clamp(band.lower, band.upper), places))
        .collect())
}

/// R̄ that puts the within-subgroup Cpk on target for a given grand mean
///
/// Uses the distance to the nearest existing specification limit, the
/// same quantity the capability estimate divides by 3σ.
pub(crate) fn required_r_bar(tolerance: &Tolerance, grand_mean: f64, target_cpk: f64) -> Option<f64> {
    let to_usl = tolerance.usl.map(|usl| (usl - grand_mean).abs());
    let to_lsl = tolerance.lsl.map(|lsl| (grand_mean - lsl).abs());
    let distance = match (to_usl, to_lsl) {
        (Some(u), Some(l)) => u.min(l),
        (Some(u), None) => u,
        (None, Some(l)) => l,
        (None, None) => return None,
    };
    let r_bar = D2 * distance / (3.0 * target_cpk);
    (r_bar > SIGMA_EPSILON).then_some(r_bar)
}

/// 25 subgroup ranges averaging `required`, each below 95% of UCLR
///
/// The spread narrows when the required R̄ sits close to the cap.
pub(crate) fn plan_ranges(
    required: f64,
    limits: &ControlLimits,
    places: u32,
    rng: &mut dyn RngCore,
) -> Vec<f64> {
    let cap = limits.uclr * RANGE_CAP;
    let step = 10f64.powi(-(places as i32));
    let spread = (cap / required - 1.0).min(RANGE_SPREAD);

    let mut ranges: Vec<f64> = if spread > 1e-6 {
        (0..SUBGROUP_COUNT)
            .map(|_| required * rng.random_range(1.0 - spread..=1.0 + spread))
            .collect()
    } else {
        vec![cap; SUBGROUP_COUNT]
    };

    let mean = ranges.iter().sum::<f64>() / ranges.len() as f64;
    if spread > 1e-6 && mean > 0.0 {
        let factor = required / mean;
        ranges.iter_mut().for_each(|r| *r *= factor);
    }

    let floor = round_half_up(required * (1.0 - spread.max(0.0)), places).max(step);
    for r in ranges.iter_mut() {
        *r = round_half_up(r.min(cap), places);
        if *r <= 0.0 {
            *r = floor;
        }
    }
    ranges
}

/// Stretch `points` around their mean to span `range`, then shift onto `mean`
///
/// Returns false when the draw has no spread to stretch.
fn fit_to(points: &mut [f64; SUBGROUP_SIZE], mean: f64, range: f64) -> bool {
    let min = points.iter().copied().fold(f64::INFINITY, f64::min);
    let max = points.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if span < SIGMA_EPSILON {
        return false;
    }
    let current = points.iter().sum::<f64>() / SUBGROUP_SIZE as f64;
    let scale = range / span;
    for p in points.iter_mut() {
        *p = mean + (*p - current) * scale;
    }
    true
}

fn strictly_inside(points: &[f64], limits: &ControlLimits) -> bool {
    points.iter().all(|&v| v > limits.lcl && v < limits.ucl)
}

/// Required share of a subgroup inside the reference band
#[derive(Debug, Clone, Copy)]
pub(crate) struct SubgroupBand {
    pub band: ReferenceRange,
    pub min_inside: usize,
}

impl SubgroupBand {
    fn satisfied(&self, points: &[f64]) -> bool {
        points.iter().filter(|&&v| self.band.contains(v)).count() >= self.min_inside
    }
}

/// Expand a planned (mean, range) into five measurements
///
/// Rejection-samples up to `attempts` normal draws fitted to the exact
/// mean and range; falls back to a fixed layout (and, with a band, forces
/// stray points inside it).
pub(crate) fn expand_subgroup(
    mean: f64,
    range: f64,
    limits: &ControlLimits,
    attempts: usize,
    band: Option<&SubgroupBand>,
    rng: &mut dyn RngCore,
) -> Result<[f64; SUBGROUP_SIZE], GenerationError> {
    let dist = normal(mean, range / D2)?;

    for _ in 0..attempts {
        let mut points: [f64; SUBGROUP_SIZE] = std::array::from_fn(|_| dist.sample(rng));
        if !fit_to(&mut points, mean, range) || !strictly_inside(&points, limits) {
            continue;
        }
        if band.is_none_or(|b| b.satisfied(&points)) {
            return Ok(points);
        }
    }

    let repaired = repair(mean, range, limits);
    Ok(match band {
        Some(b) if !b.satisfied(&repaired) => force_into_band(repaired, mean, &b.band, rng),
        _ => repaired,
    })
}

/// Deterministic layout used when sampling keeps failing
fn repair(mean: f64, range: f64, limits: &ControlLimits) -> [f64; SUBGROUP_SIZE] {
    let guard = limits.span() * 0.01;
    let (low, high) = (limits.lcl + guard, limits.ucl - guard);

    let mut points = REPAIR_PATTERN.map(|p| (mean + p * range).clamp(low, high));
    let min = points.iter().copied().fold(f64::INFINITY, f64::min);
    let max = points.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max - min <= 0.0 {
        points[SUBGROUP_SIZE - 1] += range.max(guard);
    }

    let shift = mean - points.iter().sum::<f64>() / SUBGROUP_SIZE as f64;
    points.map(|p| p + shift)
}

/// Pull out-of-band points just inside the nearest band edge
fn force_into_band(
    mut points: [f64; SUBGROUP_SIZE],
    mean: f64,
    band: &ReferenceRange,
    rng: &mut dyn RngCore,
) -> [f64; SUBGROUP_SIZE] {
    let depth = band.width() * FORCE_DEPTH;
    for p in points.iter_mut() {
        if *p > band.upper {
            *p = band.upper - rng.random_range(0.0..=depth);
        } else if *p < band.lower {
            *p = band.lower + rng.random_range(0.0..=depth);
        }
    }

    let current = points.iter().sum::<f64>() / SUBGROUP_SIZE as f64;
    if (current - mean).abs() > depth {
        let shift = mean - current;
        points.iter_mut().for_each(|p| *p += shift);
    }
    points
}

/// Subgroup columns → 5×25 row-major matrix
pub(crate) fn to_matrix(subgroups: &[[f64; SUBGROUP_SIZE]]) -> Matrix {
    (0..SUBGROUP_SIZE)
        .map(|row| subgroups.iter().map(|s| s[row]).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::limits::compute_control_limits;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn limits() -> ControlLimits {
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        compute_control_limits(&tol, 1.33, None).unwrap()
    }

    fn span(points: &[f64]) -> f64 {
        let min = points.iter().copied().fold(f64::INFINITY, f64::min);
        let max = points.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        max - min
    }

    #[test]
    fn test_plan_means_stay_in_safe_interior() {
        let lim = limits();
        let mut rng = StdRng::seed_from_u64(11);
        let margin = lim.span() * SAFE_MARGIN;
        for _ in 0..20 {
            let means = plan_means(9.0, &lim, 3, &mut rng).unwrap();
            assert_eq!(means.len(), SUBGROUP_COUNT);
            for m in means {
                assert!(m >= lim.lcl + margin - 1e-3 && m <= lim.ucl - margin + 1e-3);
            }
        }
    }

    #[test]
    fn test_plan_means_in_band_stay_in_band() {
        let tol = Tolerance::double(53.005, 52.985).unwrap();
        let band = ReferenceRange::new(52.992, 52.999).unwrap();
        let lim = compute_control_limits(&tol, 1.33, Some(band.center())).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let means = plan_means_in_band(&band, &lim, 4.0, 3, &mut rng).unwrap();
        assert!(means.iter().all(|&m| band.contains(m)));
    }

    #[test]
    fn test_required_r_bar_uses_nearest_limit() {
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        let r = required_r_bar(&tol, 9.0, 1.0).unwrap();
        assert!((r - D2 / 3.0).abs() < 1e-12);
        let off = required_r_bar(&tol, 9.5, 1.0).unwrap();
        assert!((off - D2 * 0.5 / 3.0).abs() < 1e-12);
        assert!(required_r_bar(&Tolerance::none(), 9.0, 1.0).is_none());
        assert!(required_r_bar(&tol, 10.0, 1.0).is_none());
    }

    #[test]
    fn test_plan_ranges_hit_required_mean_below_cap() {
        let lim = limits();
        let mut rng = StdRng::seed_from_u64(9);
        let required = lim.r_bar;
        let ranges = plan_ranges(required, &lim, 4, &mut rng);
        let mean = ranges.iter().sum::<f64>() / ranges.len() as f64;
        assert!((mean - required).abs() < 0.01);
        assert!(ranges.iter().all(|&r| r > 0.0 && r <= lim.uclr * RANGE_CAP));
    }

    #[test]
    fn test_plan_ranges_saturate_when_required_exceeds_cap() {
        let lim = limits();
        let mut rng = StdRng::seed_from_u64(9);
        let ranges = plan_ranges(lim.uclr * 2.0, &lim, 3, &mut rng);
        let cap = round_half_up(lim.uclr * RANGE_CAP, 3);
        assert!(ranges.iter().all(|&r| r == cap));
    }

    #[test]
    fn test_expand_subgroup_matches_mean_and_range() {
        let lim = limits();
        let mut rng = StdRng::seed_from_u64(21);
        let points = expand_subgroup(9.1, 0.5, &lim, 200, None, &mut rng).unwrap();
        let mean = points.iter().sum::<f64>() / 5.0;
        assert!((mean - 9.1).abs() < 1e-9);
        assert!((span(&points) - 0.5).abs() < 1e-9);
        assert!(points.iter().all(|&p| p > lim.lcl && p < lim.ucl));
    }

    #[test]
    fn test_zero_attempts_uses_repair_layout() {
        let lim = limits();
        let mut rng = StdRng::seed_from_u64(21);
        let points = expand_subgroup(9.0, 0.4, &lim, 0, None, &mut rng).unwrap();
        assert!((points[0] - 8.8).abs() < 1e-9);
        assert!((points[4] - 9.2).abs() < 1e-9);
        assert!(span(&points) > 0.0);
    }

    #[test]
    fn test_forced_band_keeps_most_points_inside() {
        let tol = Tolerance::double(53.005, 52.985).unwrap();
        let band = ReferenceRange::new(52.992, 52.999).unwrap();
        let lim = compute_control_limits(&tol, 1.33, Some(band.center())).unwrap();
        let req = SubgroupBand {
            band,
            min_inside: 4,
        };
        let mut rng = StdRng::seed_from_u64(4);
        // range wider than the band forces the repair path
        let points = expand_subgroup(52.9955, 0.012, &lim, 0, Some(&req), &mut rng).unwrap();
        let inside = points.iter().filter(|&&p| band.contains(p)).count();
        assert!(inside >= 4, "only {} inside: {:?}", inside, points);
    }

    #[test]
    fn test_to_matrix_transposes() {
        let cols = vec![[1.0, 2.0, 3.0, 4.0, 5.0], [6.0, 7.0, 8.0, 9.0, 10.0]];
        let m = to_matrix(&cols);
        assert_eq!(m.len(), 5);
        assert_eq!(m[0], vec![1.0, 6.0]);
        assert_eq!(m[4], vec![5.0, 10.0]);
    }
}
