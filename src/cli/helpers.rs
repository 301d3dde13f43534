//! Shared helper functions for CLI commands

use std::io::{self, IsTerminal};

use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use miette::{IntoDiagnostic, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cli::GlobalOpts;
use crate::core::constants::FEASIBILITY_SLACK;
use crate::core::difficulty::{DifficultyAssessment, Feasibility};
use crate::core::service::TargetAdjuster;
use crate::core::tolerance::Tolerance;
use crate::core::GeneratorConfig;
use crate::parse::parse_tolerance;

/// Resolve config files, then apply command-line overrides
pub fn load_config(global: &GlobalOpts, target_cpk: Option<f64>) -> Result<GeneratorConfig> {
    let mut config = GeneratorConfig::load(global.config.as_deref())?;
    if let Some(seed) = global.seed {
        config.seed = Some(seed);
    }
    if let Some(cpk) = target_cpk {
        config.target_cpk = cpk;
    }
    Ok(config)
}

/// Seeded generator when a seed is configured, OS entropy otherwise
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Tolerance from a callout, or from explicit limits when no callout is given
pub fn tolerance_from(
    theory: Option<&str>,
    usl: Option<f64>,
    lsl: Option<f64>,
) -> Result<Tolerance> {
    if let Some(text) = theory {
        return parse_tolerance(text).into_diagnostic();
    }
    match (usl, lsl) {
        (Some(usl), Some(lsl)) => Tolerance::double(usl, lsl).into_diagnostic(),
        (Some(usl), None) => Ok(Tolerance::upper_only(usl)),
        (None, Some(lsl)) => Ok(Tolerance::lower_only(lsl)),
        (None, None) => Err(miette::miette!(
            "Provide a tolerance with --theory or with --usl/--lsl"
        )),
    }
}

/// Fixed-precision number
pub fn format_value(value: f64, places: u32) -> String {
    format!("{:.*}", places as usize, value)
}

/// Truncate a string to `max_chars`, adding "..." if truncated
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Asks on the terminal whether to replace an unreachable target
///
/// With `accept_suggestion` set the midpoint of the reachable interval is
/// taken without asking. Off a terminal the target is kept.
pub struct PromptAdjuster {
    pub accept_suggestion: bool,
}

impl PromptAdjuster {
    pub fn new(accept_suggestion: bool) -> Self {
        Self { accept_suggestion }
    }

    fn prompt(&self, assessment: &DifficultyAssessment) -> io::Result<Option<f64>> {
        let low = assessment.cpk_lower - FEASIBILITY_SLACK;
        let high = assessment.cpk_upper + FEASIBILITY_SLACK;
        let theme = ColorfulTheme::default();

        let change = Confirm::with_theme(&theme)
            .with_prompt(format!(
                "Target Cpk {:.2} is {} [{:.2}, {:.2}]. Use a different target?",
                assessment.target_cpk,
                assessment.feasibility,
                assessment.cpk_lower,
                assessment.cpk_upper
            ))
            .default(false)
            .interact()
            .map_err(io::Error::other)?;
        if !change {
            return Ok(None);
        }

        let value: f64 = Input::with_theme(&theme)
            .with_prompt(format!("New target Cpk ({:.2} - {:.2})", low, high))
            .default(assessment.suggested_target())
            .validate_with(|v: &f64| {
                if *v >= low && *v <= high {
                    Ok(())
                } else {
                    Err(format!("Enter a value between {:.2} and {:.2}", low, high))
                }
            })
            .interact_text()
            .map_err(io::Error::other)?;
        Ok(Some(value))
    }
}

impl TargetAdjuster for PromptAdjuster {
    fn adjust(&mut self, assessment: &DifficultyAssessment) -> f64 {
        if assessment.feasibility == Feasibility::Within {
            return assessment.target_cpk;
        }
        eprintln!(
            "{} Target Cpk {:.2} is {} ({:.2} - {:.2})",
            style("⚠").yellow(),
            assessment.target_cpk,
            assessment.feasibility,
            assessment.cpk_lower,
            assessment.cpk_upper
        );

        if self.accept_suggestion {
            return assessment.suggested_target();
        }
        if !io::stdin().is_terminal() {
            return assessment.target_cpk;
        }
        match self.prompt(assessment) {
            Ok(Some(value)) => value,
            Ok(None) => assessment.target_cpk,
            Err(e) => {
                tracing::warn!(error = %e, "prompt failed, keeping the target");
                assessment.target_cpk
            }
        }
    }
}
