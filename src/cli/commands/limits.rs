//! `spcs limits` command - control limits for a tolerance

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::helpers::{load_config, tolerance_from};
use crate::cli::output::{effective_format, print_serialized};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::limits::{compute_control_limits, ControlLimits};
use crate::core::tolerance::Tolerance;
use crate::parse::parse_reference_range;

#[derive(clap::Args, Debug)]
pub struct LimitsArgs {
    /// Tolerance callout, e.g. "φ3.5±0.1" or "≤0.05"
    #[arg(long, short = 't', allow_hyphen_values = true)]
    pub theory: Option<String>,

    /// Upper specification limit (when no callout is given)
    #[arg(long, allow_hyphen_values = true)]
    pub usl: Option<f64>,

    /// Lower specification limit (when no callout is given)
    #[arg(long, allow_hyphen_values = true)]
    pub lsl: Option<f64>,

    /// Target Cpk [default: from config, 1.8]
    #[arg(long, env = "SPCS_TARGET_CPK")]
    pub cpk: Option<f64>,

    /// Reference band whose center replaces the tolerance center
    #[arg(long, short = 'r', allow_hyphen_values = true)]
    pub reference: Option<String>,
}

#[derive(Serialize)]
struct LimitsReport<'a> {
    tolerance: &'a Tolerance,
    target_cpk: f64,
    limits: &'a ControlLimits,
}

pub fn run(args: LimitsArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global, args.cpk)?;
    let tolerance = tolerance_from(args.theory.as_deref(), args.usl, args.lsl)?;
    let center = args
        .reference
        .as_deref()
        .map(parse_reference_range)
        .transpose()
        .into_diagnostic()?
        .map(|r| r.center());

    let limits = compute_control_limits(&tolerance, config.target_cpk, center).into_diagnostic()?;

    match effective_format(global.output, false) {
        OutputFormat::Yaml | OutputFormat::Json => print_serialized(
            &LimitsReport {
                tolerance: &tolerance,
                target_cpk: config.target_cpk,
                limits: &limits,
            },
            global.output,
        ),
        _ => {
            print_limits(&tolerance, config.target_cpk, &limits);
            Ok(())
        }
    }
}

/// Human summary shared with `generate`
pub fn print_limits(tolerance: &Tolerance, target_cpk: f64, limits: &ControlLimits) {
    println!(
        "{} {} (target Cpk {:.2}, σ = {:.6})",
        style("Tolerance").bold(),
        tolerance,
        target_cpk,
        limits.sigma
    );
    println!(
        "  X̄   UCL {:<10.3} CL {:<10.3} LCL {:.3}",
        limits.ucl, limits.cl, limits.lcl
    );
    println!(
        "      +2σ {:<10.3} +1σ {:<9.3} -1σ {:<9.3} -2σ {:.3}",
        limits.ucl2, limits.ucl1, limits.lcl1, limits.lcl2
    );
    println!(
        "  R   UCL {:<10.3} CL {:<10.3} LCL {:.3}",
        limits.uclr, limits.clr, limits.lclr
    );
}
