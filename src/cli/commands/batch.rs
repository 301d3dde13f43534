//! `spcs batch` command - run every task of one or more plans

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::Datelike;
use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use walkdir::WalkDir;

use crate::cli::helpers::{load_config, make_rng, truncate_str, PromptAdjuster};
use crate::cli::output::{effective_format, print_serialized, write_matrix_csv};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::service::{output_stem, run_task, unique_stem, TaskReport};
use crate::entities::task::{Plan, Task, TaskMode};
use crate::yaml::write_yaml_file;

#[derive(clap::Args, Debug)]
pub struct BatchArgs {
    /// Plan file, or a directory searched recursively for .yaml plans
    pub plan: PathBuf,

    /// Where the CSV matrices and YAML reports go
    #[arg(long, short = 'd', default_value = ".")]
    pub out_dir: PathBuf,

    /// Use each task's reference range, whatever the plan says
    #[arg(long)]
    pub reference_mode: bool,

    /// Month number for file names [default: current month]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,

    /// Take suggested targets without asking
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct SummaryRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Tolerance")]
    tolerance: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Cpk")]
    cpk: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "File")]
    file: String,
}

#[derive(Debug, Default, Serialize)]
struct BatchSummary {
    succeeded: usize,
    best_effort: usize,
    failed: usize,
    tasks: Vec<SummaryRow>,
}

pub fn run(args: BatchArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global, None)?;
    let month = args.month.unwrap_or_else(|| chrono::Local::now().month());
    let plan_paths = plan_files(&args.plan)?;
    fs::create_dir_all(&args.out_dir).into_diagnostic()?;

    let mut rng = make_rng(config.seed);
    let mut adjuster = PromptAdjuster::new(args.yes);
    let mut summary = BatchSummary::default();

    for plan_path in &plan_paths {
        let plan = match Plan::load(plan_path) {
            Ok(plan) => plan,
            Err(e) => {
                eprintln!(
                    "{} Failed to load {}: {}",
                    style("✗").red(),
                    plan_path.display(),
                    e
                );
                summary.failed += 1;
                continue;
            }
        };
        let mode = if args.reference_mode {
            TaskMode::Reference
        } else {
            plan.defaults.mode
        };

        for task in plan.resolved_tasks() {
            let index = summary.tasks.len() + 1;
            let row = match run_task(&task, mode, &config, &mut adjuster, &mut rng) {
                Ok(report) => {
                    finish_task(index, &task, &report, month, &args.out_dir, &mut summary)
                }
                Err(e) => {
                    eprintln!("{} {}: {}", style("✗").red(), task.label(), e);
                    summary.failed += 1;
                    failed_row(index, &task, e.to_string())
                }
            };
            summary.tasks.push(row);
        }
    }

    if summary.tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    match effective_format(global.output, false) {
        OutputFormat::Yaml | OutputFormat::Json => print_serialized(&summary, global.output)?,
        _ => {
            println!();
            println!("{}", Table::new(&summary.tasks).with(Style::rounded()));
            println!(
                "{} {} generated ({} best effort), {} failed, files in {}",
                if summary.failed == 0 {
                    style("✓").green()
                } else {
                    style("⚠").yellow()
                },
                summary.succeeded,
                summary.best_effort,
                summary.failed,
                args.out_dir.display()
            );
        }
    }
    Ok(())
}

/// Write the task's files and build its summary row
fn finish_task(
    index: usize,
    task: &Task,
    report: &TaskReport,
    month: u32,
    out_dir: &Path,
    summary: &mut BatchSummary,
) -> SummaryRow {
    let Some(data) = &report.data else {
        eprintln!(
            "{} {}: no candidate in {} attempts",
            style("✗").red(),
            task.label(),
            report.attempt_budget
        );
        summary.failed += 1;
        return SummaryRow {
            target: format!("{:.2}", report.target_cpk),
            ..failed_row(index, task, "no candidate found".to_string())
        };
    };

    let stem = unique_stem(
        out_dir,
        &output_stem(task, month, report.uses_reference()),
        &["csv", "yaml"],
    );
    if let Err(e) = write_task_files(out_dir, &stem, report) {
        eprintln!("{} {}: {}", style("✗").red(), task.label(), e);
        summary.failed += 1;
        return failed_row(index, task, e.to_string());
    }

    summary.succeeded += 1;
    let result = if data.accepted {
        "ok".to_string()
    } else {
        summary.best_effort += 1;
        "best effort".to_string()
    };
    println!(
        "{} {} - Cpk {:.3} -> {}.csv",
        if data.accepted {
            style("✓").green()
        } else {
            style("⚠").yellow()
        },
        style(task.label()).cyan(),
        data.cpk,
        stem
    );

    SummaryRow {
        index,
        task: truncate_str(&task.label(), 40),
        tolerance: truncate_str(&task.theory, 24),
        target: format!("{:.2}", report.target_cpk),
        cpk: format!("{:.3}", data.cpk),
        mode: data.mode.to_string(),
        result,
        file: format!("{}.csv", stem),
    }
}

fn failed_row(index: usize, task: &Task, reason: String) -> SummaryRow {
    SummaryRow {
        index,
        task: truncate_str(&task.label(), 40),
        tolerance: truncate_str(&task.theory, 24),
        target: "-".to_string(),
        cpk: "-".to_string(),
        mode: "-".to_string(),
        result: truncate_str(&reason, 40),
        file: "-".to_string(),
    }
}

fn write_task_files(out_dir: &Path, stem: &str, report: &TaskReport) -> Result<()> {
    if let Some(data) = &report.data {
        let file = File::create(out_dir.join(format!("{}.csv", stem))).into_diagnostic()?;
        write_matrix_csv(file, &data.quantized, data.max_decimal_places)?;
    }
    write_yaml_file(&out_dir.join(format!("{}.yaml", stem)), report)?;
    Ok(())
}

/// The plan itself, or every plan file under a directory, sorted
fn plan_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(miette::miette!("No plan file or directory at {}", path.display()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .filter(|p| !is_report_file(p))
        .collect();
    files.sort();
    Ok(files)
}

/// Reports written by earlier runs: `..._spc.yaml` or `..._spc_3.yaml`
fn is_report_file(path: &Path) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    let base = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    stem.ends_with("_spc") || (base.len() < stem.len() && base.ends_with("_spc_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_report_file() {
        assert!(is_report_file(Path::new("out/03_A_B_C_spc.yaml")));
        assert!(is_report_file(Path::new("03_A_B_C_ref_spc_2.yaml")));
        assert!(!is_report_file(Path::new("plan.yaml")));
        assert!(!is_report_file(Path::new("spc_plan_2.yaml")));
    }

    #[test]
    fn test_plan_files_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("line2");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("b.yaml"), "tasks: []").unwrap();
        fs::write(nested.join("a.yml"), "tasks: []").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join("01_x_y_z_spc.yaml"), "").unwrap();

        let files = plan_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| !is_report_file(p)));
    }

    #[test]
    fn test_missing_plan_path() {
        assert!(plan_files(Path::new("/nonexistent/plans")).is_err());
    }
}
