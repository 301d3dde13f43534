use rand::RngCore;
use tracing::{debug, info, warn};

use super::subgroup::{expand_subgroup, plan_means, plan_ranges, required_r_bar, to_matrix};
use super::{
    log_progress, score_candidate, AttemptOutcome, Best, GenerationError, GenerationMode,
    GenerationRequest, Generator, OutcomeTally, SearchSettings, SpcData,
};

/// Search centered on the tolerance
#[derive(Debug, Clone, Default)]
pub struct StandardGenerator {
    settings: SearchSettings,
}

impl StandardGenerator {
    pub fn new(settings: SearchSettings) -> Self {
        Self { settings }
    }

    /// Same search, results tagged with `mode`
    pub(crate) fn search(
        &self,
        request: &GenerationRequest<'_>,
        mode: GenerationMode,
        rng: &mut dyn RngCore,
    ) -> Result<Option<SpcData>, GenerationError> {
        request.validate()?;

        let limits = request.limits;
        let center = request.tolerance.center().unwrap_or(limits.cl);
        let places = request.planning_decimals();

        let mut best = Best::default();
        let mut tally = OutcomeTally::default();

        for attempt in 0..request.max_attempts {
            log_progress(attempt, &best, &tally);

            let means = plan_means(center, limits, places, rng)?;
            let grand_mean = means.iter().sum::<f64>() / means.len() as f64;
            let Some(required) = required_r_bar(request.tolerance, grand_mean, request.target_cpk)
            else {
                tally.record(&AttemptOutcome::Degenerate);
                continue;
            };
            let ranges = plan_ranges(required, limits, places, rng);

            let mut subgroups = Vec::with_capacity(means.len());
            for (&mean, &range) in means.iter().zip(&ranges) {
                subgroups.push(expand_subgroup(
                    mean,
                    range,
                    limits,
                    self.settings.subgroup_attempts,
                    None,
                    rng,
                )?);
            }

            let (mut data, outcome) = score_candidate(
                to_matrix(&subgroups),
                request,
                &self.settings,
                None,
                mode,
                rng,
            );
            data.attempts = attempt + 1;
            tally.record(&outcome);

            match outcome {
                AttemptOutcome::Accepted => {
                    info!(attempts = data.attempts, cpk = data.cpk, %mode, "candidate accepted");
                    return Ok(Some(data));
                }
                AttemptOutcome::CpkMiss { .. } => best = best.offer(data, request.target_cpk),
                _ => {}
            }
        }

        debug!(
            attempts = request.max_attempts,
            violations = tally.violations,
            cpk_misses = tally.cpk_misses,
            degenerate = tally.degenerate,
            "search exhausted"
        );
        match best.into_inner() {
            Some(mut data) => {
                data.attempts = request.max_attempts;
                warn!(
                    cpk = data.cpk,
                    target = request.target_cpk,
                    "no candidate inside the Cpk window, returning the closest clean one"
                );
                Ok(Some(data))
            }
            None => {
                warn!(attempts = request.max_attempts, "no clean candidate found");
                Ok(None)
            }
        }
    }
}

impl Generator for StandardGenerator {
    fn generate(
        &self,
        request: &GenerationRequest<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Option<SpcData>, GenerationError> {
        self.search(request, GenerationMode::Standard, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::limits::compute_control_limits;
    use crate::core::resolution::Resolution;
    use crate::core::rules::check_rules;
    use crate::core::tolerance::Tolerance;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_standard_search_hits_target() {
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        let limits = compute_control_limits(&tol, 1.33, None).unwrap();
        let request = GenerationRequest {
            tolerance: &tol,
            limits: &limits,
            target_cpk: 1.33,
            resolution: Some(Resolution::Decimal(2)),
            max_attempts: 2000,
        };
        let mut rng = StdRng::seed_from_u64(42);
        let data = StandardGenerator::default()
            .generate(&request, &mut rng)
            .unwrap()
            .expect("search should find a clean candidate");

        assert!(data.accepted);
        assert_eq!(data.mode, GenerationMode::Standard);
        assert!((data.cpk - 1.33).abs() <= 0.03);
        assert!(check_rules(&data.x_bar, &data.ranges, &limits).is_empty());
        assert_eq!(data.quantized.len(), 5);
        assert!(data.quantized.iter().all(|row| row.len() == 25));
        assert!(data.max_decimal_places <= 2);
    }

    #[test]
    fn test_zero_budget_returns_none() {
        let tol = Tolerance::double(10.0, 8.0).unwrap();
        let limits = compute_control_limits(&tol, 1.33, None).unwrap();
        let request = GenerationRequest {
            tolerance: &tol,
            limits: &limits,
            target_cpk: 1.33,
            resolution: None,
            max_attempts: 0,
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert!(StandardGenerator::default()
            .generate(&request, &mut rng)
            .unwrap()
            .is_none());
    }
}
