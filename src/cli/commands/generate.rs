//! `spcs generate` command - one chart's worth of data

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::commands::difficulty::print_assessment;
use crate::cli::commands::limits::print_limits;
use crate::cli::helpers::{load_config, make_rng, PromptAdjuster};
use crate::cli::output::{
    effective_format, print_serialized, render_subgroup_table, write_matrix_csv,
};
use crate::cli::viz::{render_spec_bar, render_xbar_chart, CHART_HEIGHT, CHART_WIDTH};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::generator::SpcData;
use crate::core::resolution::Resolution;
use crate::core::service::{run_task, TaskReport};
use crate::entities::task::{Task, TaskMode};
use crate::yaml::write_yaml_file;

#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// Tolerance callout, e.g. "φ3.5±0.1" or "≤0.05"
    #[arg(long, short = 't', allow_hyphen_values = true)]
    pub theory: String,

    /// Target Cpk [default: from config, 1.8]
    #[arg(long, env = "SPCS_TARGET_CPK")]
    pub cpk: Option<f64>,

    /// Instrument resolution, e.g. 0.01 or 0.02
    #[arg(long)]
    pub resolution: Option<Resolution>,

    /// Keep the data inside this band, e.g. "52.992-52.999"
    #[arg(long, short = 'r', allow_hyphen_values = true)]
    pub reference: Option<String>,

    /// Attempt budget [default: from config]
    #[arg(long)]
    pub max_attempts: Option<usize>,

    /// Draw the X̄ chart
    #[arg(long)]
    pub chart: bool,

    /// Also write the result to a file (.csv matrix, .json or .yaml report)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Take the suggested target without asking when the band cannot reach it
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run(args: GenerateArgs, global: &GlobalOpts) -> Result<()> {
    let mut config = load_config(global, args.cpk)?;
    if let Some(n) = args.max_attempts {
        config.standard_attempts = n;
        config.reference_attempts = n;
    }

    let task = Task {
        reference_range: args.reference.clone(),
        resolution: args.resolution,
        ..Task::new(args.theory.clone())
    };
    let mode = if task.reference_text().is_some() {
        TaskMode::Reference
    } else {
        TaskMode::Standard
    };

    let mut rng = make_rng(config.seed);
    let mut adjuster = PromptAdjuster::new(args.yes);
    let report = run_task(&task, mode, &config, &mut adjuster, &mut rng).into_diagnostic()?;

    let Some(data) = report.data.as_ref() else {
        eprintln!(
            "{} No candidate passed the run rules in {} attempts",
            style("✗").red(),
            report.attempt_budget
        );
        return Err(miette::miette!(
            "Generation exhausted its budget; raise --max-attempts or relax the target"
        ));
    };

    if let Some(path) = &args.out {
        write_report_file(path, &report, data)?;
        eprintln!("{} Wrote {}", style("✓").green(), path.display());
    }

    match effective_format(global.output, true) {
        OutputFormat::Yaml | OutputFormat::Json => print_serialized(&report, global.output)?,
        OutputFormat::Csv => {
            write_matrix_csv(io::stdout(), &data.quantized, data.max_decimal_places)?
        }
        OutputFormat::Table => println!("{}", render_subgroup_table(data)),
        OutputFormat::Auto => print_summary(&report, data),
    }

    if args.chart {
        println!();
        println!(
            "{}",
            render_xbar_chart(&data.x_bar, &report.limits, CHART_WIDTH, CHART_HEIGHT)
        );
    }
    Ok(())
}

/// Status line, limits, subgroup table and spread bar
pub fn print_summary(report: &TaskReport, data: &SpcData) {
    print_limits(&report.tolerance, report.target_cpk, &report.limits);
    if let Some(assessment) = &report.difficulty {
        print_assessment(assessment);
    }
    println!();
    println!("{}", render_subgroup_table(data));

    let places = data.max_decimal_places;
    let (min, max) = data
        .quantized
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if let Some(bar) = render_spec_bar(min, max, &report.tolerance, places) {
        println!("{}", bar);
    }

    println!();
    println!("{}", status_line(report, data));
}

pub fn status_line(report: &TaskReport, data: &SpcData) -> String {
    let marker = if data.accepted {
        style("✓").green()
    } else {
        style("⚠").yellow()
    };
    let verdict = if data.accepted {
        "Cpk on target"
    } else {
        "Closest Cpk found"
    };
    format!(
        "{} {} {:.3} (target {:.2}), X̄ {:.4}, R̄ {:.4}, {} attempt(s), {} search",
        marker,
        verdict,
        data.cpk,
        report.target_cpk,
        data.grand_mean,
        data.r_bar,
        data.attempts,
        data.mode
    )
}

/// Write the matrix or full report, picked by file extension
pub fn write_report_file(path: &Path, report: &TaskReport, data: &SpcData) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match ext.as_deref() {
        Some("csv") => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).into_diagnostic()?;
            }
            let file = File::create(path).into_diagnostic()?;
            write_matrix_csv(file, &data.quantized, data.max_decimal_places)
        }
        Some("json") => {
            let text = serde_json::to_string_pretty(report).into_diagnostic()?;
            std::fs::write(path, text).into_diagnostic()
        }
        _ => Ok(write_yaml_file(path, report)?),
    }
}
