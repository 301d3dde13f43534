//! `spcs check` command - audit an existing 5×25 data sheet

use std::path::PathBuf;

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::commands::limits::print_limits;
use crate::cli::helpers::load_config;
use crate::cli::output::{effective_format, print_serialized, read_matrix_csv};
use crate::cli::viz::{render_xbar_chart, CHART_HEIGHT, CHART_WIDTH};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::capability::{estimate_cpk, subgroup_stats, CapabilityEstimate};
use crate::core::limits::{compute_control_limits, ControlLimits};
use crate::core::resolution::Resolution;
use crate::core::rules::{check_rules, Violation};
use crate::core::tolerance::Tolerance;
use crate::parse::{parse_reference_range, parse_tolerance};

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// CSV with 5 rows of 25 readings, no header
    pub file: PathBuf,

    /// Tolerance callout the data was measured against
    #[arg(long, short = 't', allow_hyphen_values = true)]
    pub theory: String,

    /// Target Cpk the control limits are derived from [default: from config, 1.8]
    #[arg(long, env = "SPCS_TARGET_CPK")]
    pub cpk: Option<f64>,

    /// Reference band the data was generated in; its center becomes CL
    #[arg(long, short = 'r', allow_hyphen_values = true)]
    pub reference: Option<String>,

    /// Instrument resolution the readings are snapped to before scoring
    #[arg(long)]
    pub resolution: Option<Resolution>,

    /// Draw the X̄ chart
    #[arg(long)]
    pub chart: bool,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    tolerance: &'a Tolerance,
    limits: &'a ControlLimits,
    capability: &'a CapabilityEstimate,
    x_bar: &'a [f64],
    ranges: &'a [f64],
    violations: &'a [Violation],
    in_control: bool,
}

pub fn run(args: CheckArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global, args.cpk)?;
    let tolerance = parse_tolerance(&args.theory).into_diagnostic()?;
    let center = match args.reference.as_deref() {
        Some(text) => {
            let band = parse_reference_range(text).into_diagnostic()?;
            band.check_within(&tolerance).into_diagnostic()?;
            Some(band.center())
        }
        None => None,
    };
    let limits =
        compute_control_limits(&tolerance, config.target_cpk, center).into_diagnostic()?;

    let matrix = read_matrix_csv(&args.file)?;
    let (x_bar, ranges) = subgroup_stats(&matrix)
        .ok_or_else(|| miette::miette!("{}: data is empty or ragged", args.file.display()))?;
    let capability = estimate_cpk(&matrix, &tolerance, args.resolution);
    let violations = check_rules(&x_bar, &ranges, &limits);

    match effective_format(global.output, false) {
        OutputFormat::Yaml | OutputFormat::Json => print_serialized(
            &CheckReport {
                tolerance: &tolerance,
                limits: &limits,
                capability: &capability,
                x_bar: &x_bar,
                ranges: &ranges,
                violations: &violations,
                in_control: violations.is_empty(),
            },
            global.output,
        )?,
        _ => {
            print_limits(&tolerance, config.target_cpk, &limits);
            println!(
                "Cpk {:.3}  X̄ {:.4}  R̄ {:.4}  σ {:.6}",
                capability.cpk, capability.grand_mean, capability.r_bar, capability.sigma_within
            );
            if violations.is_empty() {
                println!("{} All run rules pass", style("✓").green());
            }
            for violation in &violations {
                println!("{} {}", style("✗").red(), violation);
            }
        }
    }

    if args.chart {
        println!();
        println!(
            "{}",
            render_xbar_chart(&x_bar, &limits, CHART_WIDTH, CHART_HEIGHT)
        );
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(miette::miette!(
            "{} run-rule violation(s) in {}",
            violations.len(),
            args.file.display()
        ))
    }
}
