//! `spcs difficulty` command - reachable Cpk for a reference band

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::load_config;
use crate::cli::output::{effective_format, print_serialized};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::difficulty::{
    evaluate_difficulty, DifficultyAssessment, DifficultyTier, Feasibility,
};
use crate::parse::{parse_reference_range, parse_tolerance};

#[derive(clap::Args, Debug)]
pub struct DifficultyArgs {
    /// Tolerance callout
    #[arg(long, short = 't', allow_hyphen_values = true)]
    pub theory: String,

    /// Reference band, e.g. "52.992-52.999"
    #[arg(long, short = 'r', allow_hyphen_values = true)]
    pub reference: String,

    /// Target Cpk [default: from config, 1.8]
    #[arg(long, env = "SPCS_TARGET_CPK")]
    pub cpk: Option<f64>,
}

pub fn run(args: DifficultyArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global, args.cpk)?;
    let tolerance = parse_tolerance(&args.theory).into_diagnostic()?;
    let reference = parse_reference_range(&args.reference).into_diagnostic()?;
    reference.check_within(&tolerance).into_diagnostic()?;

    let assessment = evaluate_difficulty(&tolerance, &reference, config.target_cpk);

    match effective_format(global.output, false) {
        OutputFormat::Yaml | OutputFormat::Json => print_serialized(&assessment, global.output),
        _ => {
            print_assessment(&assessment);
            Ok(())
        }
    }
}

pub fn print_assessment(assessment: &DifficultyAssessment) {
    let tier = match assessment.tier {
        DifficultyTier::Low => style("low").green(),
        DifficultyTier::Medium => style("medium").yellow(),
        DifficultyTier::High => style("high").red(),
    };
    println!(
        "Reachable Cpk {:.3} - {:.3}, difficulty {}",
        assessment.cpk_lower, assessment.cpk_upper, tier
    );
    match assessment.feasibility {
        Feasibility::Within => println!(
            "{} Target {:.2} is {}",
            style("✓").green(),
            assessment.target_cpk,
            assessment.feasibility
        ),
        _ => println!(
            "{} Target {:.2} is {}; {:.2} would sit mid-range",
            style("⚠").yellow(),
            assessment.target_cpk,
            assessment.feasibility,
            assessment.suggested_target()
        ),
    }
}
