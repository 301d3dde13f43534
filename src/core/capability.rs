//! Within-subgroup process capability
//!
//! Cpk is estimated the way the chart template computes it: grand mean of
//! all measurements, σ = R̄ / d2 from the subgroup ranges, then the
//! one-sided indices against whichever specification limits exist.

use serde::{Deserialize, Serialize};

use crate::core::constants::{D2, SIGMA_EPSILON};
use crate::core::resolution::Resolution;
use crate::core::tolerance::Tolerance;

/// Result of a capability estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapabilityEstimate {
    pub cpk: f64,
    pub r_bar: f64,
    pub sigma_within: f64,
    pub grand_mean: f64,
    /// Upper index, when a USL exists and σ is usable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ppu: Option<f64>,
    /// Lower index, when an LSL exists and σ is usable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ppl: Option<f64>,
}

impl CapabilityEstimate {
    /// All-zero estimate reported for unusable input
    pub fn degraded() -> Self {
        Self {
            cpk: 0.0,
            r_bar: 0.0,
            sigma_within: 0.0,
            grand_mean: 0.0,
            ppu: None,
            ppl: None,
        }
    }

    /// σ collapsed or the input was malformed; never acceptable to a search
    pub fn is_degenerate(&self) -> bool {
        self.sigma_within < SIGMA_EPSILON
    }
}

/// Per-subgroup mean and range, by column
///
/// `matrix` is row-major with one row per measurement position and one
/// column per subgroup. Returns `None` for ragged or empty input.
pub fn subgroup_stats(matrix: &[Vec<f64>]) -> Option<(Vec<f64>, Vec<f64>)> {
    let columns = matrix.first()?.len();
    if columns == 0 || matrix.iter().any(|row| row.len() != columns) {
        return None;
    }

    let rows = matrix.len() as f64;
    let mut means = Vec::with_capacity(columns);
    let mut ranges = Vec::with_capacity(columns);
    for col in 0..columns {
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for row in matrix {
            let v = row[col];
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        means.push(sum / rows);
        ranges.push(max - min);
    }
    Some((means, ranges))
}

/// Estimate Cpk from a quantized measurement matrix
///
/// Values are re-snapped to the resolution first (a no-op for data that is
/// already quantized). Malformed input (ragged rows, non-finite values)
/// yields [`CapabilityEstimate::degraded`] instead of an error so a search
/// loop can simply reject the candidate.
pub fn estimate_cpk(
    matrix: &[Vec<f64>],
    tolerance: &Tolerance,
    resolution: Option<Resolution>,
) -> CapabilityEstimate {
    let snapped: Vec<Vec<f64>> = match resolution {
        Some(res) => matrix
            .iter()
            .map(|row| row.iter().map(|&v| res.snap(v)).collect())
            .collect(),
        None => matrix.to_vec(),
    };

    if snapped.iter().flatten().any(|v| !v.is_finite()) {
        return CapabilityEstimate::degraded();
    }
    let Some((_, ranges)) = subgroup_stats(&snapped) else {
        return CapabilityEstimate::degraded();
    };

    let count = snapped.iter().map(Vec::len).sum::<usize>() as f64;
    let grand_mean = snapped.iter().flatten().sum::<f64>() / count;
    let r_bar = ranges.iter().sum::<f64>() / ranges.len() as f64;
    let sigma_within = r_bar / D2;

    if sigma_within < SIGMA_EPSILON {
        return CapabilityEstimate {
            cpk: 0.0,
            r_bar,
            sigma_within,
            grand_mean,
            ppu: None,
            ppl: None,
        };
    }

    let ppu = tolerance
        .usl
        .map(|usl| (usl - grand_mean).abs() / (3.0 * sigma_within));
    let ppl = tolerance
        .lsl
        .map(|lsl| (grand_mean - lsl).abs() / (3.0 * sigma_within));

    let cpk = match (ppu, ppl) {
        (Some(u), Some(l)) => u.min(l),
        (Some(u), None) => u,
        (None, Some(l)) => l,
        (None, None) => 0.0,
    };

    CapabilityEstimate {
        cpk,
        r_bar,
        sigma_within,
        grand_mean,
        ppu,
        ppl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::{SUBGROUP_COUNT, SUBGROUP_SIZE};

    /// 5×25 matrix where every subgroup is `pattern` shifted by `center`
    fn patterned(center: f64, pattern: [f64; SUBGROUP_SIZE]) -> Vec<Vec<f64>> {
        pattern
            .iter()
            .map(|p| vec![center + p; SUBGROUP_COUNT])
            .collect()
    }

    #[test]
    fn test_subgroup_stats_by_column() {
        let m = vec![vec![1.0, 2.0], vec![3.0, 2.5], vec![2.0, 2.0]];
        let (means, ranges) = subgroup_stats(&m).unwrap();
        assert_eq!(means, vec![2.0, 6.5 / 3.0]);
        assert_eq!(ranges, vec![2.0, 0.5]);
    }

    #[test]
    fn test_subgroup_stats_rejects_ragged() {
        let m = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(subgroup_stats(&m).is_none());
        assert!(subgroup_stats(&[]).is_none());
    }

    #[test]
    fn test_double_sided_cpk() {
        // every subgroup spans 0.2326 → R̄ = 0.2326, σ = 0.1
        let m = patterned(9.0, [-0.1163, -0.05, 0.0, 0.05, 0.1163]);
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        let est = estimate_cpk(&m, &tol, None);
        assert!((est.r_bar - 0.2326).abs() < 1e-9);
        assert!((est.sigma_within - 0.1).abs() < 1e-9);
        assert!((est.grand_mean - 9.0).abs() < 1e-9);
        assert!((est.cpk - 1.0 / 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_off_center_uses_nearest_limit() {
        let m = patterned(9.5, [-0.1163, -0.05, 0.0, 0.05, 0.1163]);
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        let est = estimate_cpk(&m, &tol, None);
        assert!((est.ppu.unwrap() - 0.5 / 0.3).abs() < 1e-6);
        assert!((est.ppl.unwrap() - 1.5 / 0.3).abs() < 1e-6);
        assert!((est.cpk - 0.5 / 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_one_sided_cpk() {
        let m = patterned(0.03, [-0.01163, -0.005, 0.0, 0.005, 0.01163]);
        let upper = estimate_cpk(&m, &Tolerance::upper_only(0.06), None);
        assert!((upper.cpk - 0.03 / 0.03).abs() < 1e-6);
        assert!(upper.ppl.is_none());

        let lower = estimate_cpk(&m, &Tolerance::lower_only(0.0), None);
        assert!((lower.cpk - 1.0).abs() < 1e-6);
        assert!(lower.ppu.is_none());
    }

    #[test]
    fn test_no_limits_gives_zero() {
        let m = patterned(1.0, [-0.1, 0.0, 0.0, 0.0, 0.1]);
        let est = estimate_cpk(&m, &Tolerance::none(), None);
        assert_eq!(est.cpk, 0.0);
        assert!(est.sigma_within > 0.0);
    }

    #[test]
    fn test_flat_data_is_degenerate() {
        let m = patterned(9.0, [0.0; SUBGROUP_SIZE]);
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        let est = estimate_cpk(&m, &tol, None);
        assert_eq!(est.cpk, 0.0);
        assert!(est.is_degenerate());
        assert!((est.grand_mean - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_input_degrades() {
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        let ragged = vec![vec![1.0, 2.0], vec![1.0]];
        assert_eq!(estimate_cpk(&ragged, &tol, None), CapabilityEstimate::degraded());

        let nan = vec![vec![1.0, f64::NAN], vec![1.5, 2.0]];
        let est = estimate_cpk(&nan, &tol, None);
        assert!(est.is_degenerate());
        assert_eq!(est.cpk, 0.0);
    }

    #[test]
    fn test_resolution_snap_is_applied() {
        let m = patterned(9.0, [-0.10004, -0.05, 0.0, 0.05, 0.10004]);
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        let est = estimate_cpk(&m, &tol, Some(Resolution::Decimal(2)));
        assert!((est.r_bar - 0.2).abs() < 1e-9);
    }
}
