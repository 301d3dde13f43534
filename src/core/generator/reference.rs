use rand::RngCore;
use tracing::{debug, info, warn};

use super::standard::StandardGenerator;
use super::subgroup::{
    expand_subgroup, plan_means_in_band, plan_ranges, required_r_bar, to_matrix, SubgroupBand,
};
use super::{
    log_progress, score_candidate, AttemptOutcome, BandRequirement, Best, GenerationError,
    GenerationMode, GenerationRequest, Generator, OutcomeTally, SearchSettings, SpcData,
};
use crate::core::tolerance::ReferenceRange;

/// Subgroup means are drawn with σ = band width / this
///
/// A full ±3σ spread would keep nearly every mean inside zone C and trip the
/// fifteen-in-a-row rule; ±2σ leaves room for the occasional excursion.
pub const REFERENCE_SPREAD_DIVISOR: f64 = 4.0;

/// Search confined to the band where real production data clusters
///
/// Every recomputed subgroup mean must land in the band, and most raw
/// points must too. Runs the standard search with half the budget when
/// nothing clean turns up.
#[derive(Debug, Clone)]
pub struct ReferenceRangeGenerator {
    band: ReferenceRange,
    settings: SearchSettings,
}

impl ReferenceRangeGenerator {
    pub fn new(band: ReferenceRange, settings: SearchSettings) -> Self {
        Self { band, settings }
    }

    pub fn band(&self) -> &ReferenceRange {
        &self.band
    }

    fn search(
        &self,
        request: &GenerationRequest<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Option<SpcData>, GenerationError> {
        let limits = request.limits;
        let places = request.planning_decimals();
        let subgroup_band = SubgroupBand {
            band: self.band,
            min_inside: self.settings.min_subgroup_points_in_reference,
        };
        let requirement = BandRequirement {
            band: self.band,
            min_points: self.settings.min_points_in_reference,
        };

        let mut best = Best::default();
        let mut tally = OutcomeTally::default();

        for attempt in 0..request.max_attempts {
            log_progress(attempt, &best, &tally);

            let means =
                plan_means_in_band(&self.band, limits, REFERENCE_SPREAD_DIVISOR, places, rng)?;
            if means.iter().any(|&m| !self.band.contains(m)) {
                tally.record(&AttemptOutcome::OutsideReference {
                    x_bar_outside: means.iter().filter(|&&m| !self.band.contains(m)).count(),
                    points_inside: 0,
                });
                continue;
            }

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
                    Some(&subgroup_band),
                    rng,
                )?);
            }

            let (mut data, outcome) = score_candidate(
                to_matrix(&subgroups),
                request,
                &self.settings,
                Some(&requirement),
                GenerationMode::ReferenceRange,
                rng,
            );
            data.attempts = attempt + 1;
            tally.record(&outcome);

            match outcome {
                AttemptOutcome::Accepted => {
                    info!(
                        attempts = data.attempts,
                        cpk = data.cpk,
                        band = %self.band,
                        "candidate accepted inside reference band"
                    );
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
            outside_reference = tally.outside_reference,
            degenerate = tally.degenerate,
            "reference search exhausted"
        );
        Ok(best.into_inner().map(|mut data| {
            data.attempts = request.max_attempts;
            data
        }))
    }
}

impl Generator for ReferenceRangeGenerator {
    fn generate(
        &self,
        request: &GenerationRequest<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Option<SpcData>, GenerationError> {
        request.validate()?;
        self.band.check_within(request.tolerance)?;

        if let Some(data) = self.search(request, rng)? {
            if !data.accepted {
                warn!(
                    cpk = data.cpk,
                    target = request.target_cpk,
                    "no candidate inside the Cpk window, returning the closest clean one"
                );
            }
            return Ok(Some(data));
        }

        warn!(band = %self.band, "nothing clean inside the reference band, trying the standard search");
        let fallback = GenerationRequest {
            max_attempts: (request.max_attempts / 2).max(1),
            ..*request
        };
        let result = StandardGenerator::new(self.settings).search(
            &fallback,
            GenerationMode::StandardFallback,
            rng,
        )?;
        Ok(result.map(|mut data| {
            data.attempts += request.max_attempts;
            data
        }))
    }
}
