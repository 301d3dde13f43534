//! Output formatting utilities

use std::io::Write;
use std::path::Path;

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::helpers::format_value;
use crate::cli::OutputFormat;
use crate::core::constants::{SUBGROUP_COUNT, SUBGROUP_SIZE};
use crate::core::generator::{Matrix, SpcData};

/// Determine the effective output format based on context
///
/// `Auto` is the human summary on a terminal; `Csv` only makes sense for
/// commands that produce a matrix.
pub fn effective_format(format: OutputFormat, has_matrix: bool) -> OutputFormat {
    match format {
        OutputFormat::Csv if !has_matrix => OutputFormat::Yaml,
        other => other,
    }
}

/// Print a value as YAML or JSON
pub fn print_serialized<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).into_diagnostic()?,
        _ => serde_yml::to_string(value).into_diagnostic()?,
    };
    println!("{}", text.trim_end());
    Ok(())
}

/// Matrix as CSV: one line per measurement position, one column per subgroup
pub fn write_matrix_csv<W: Write>(writer: W, matrix: &Matrix, places: u32) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    for row in matrix {
        csv.write_record(row.iter().map(|v| format_value(*v, places)))
            .into_diagnostic()?;
    }
    csv.flush().into_diagnostic()?;
    Ok(())
}

/// Read a headerless numeric CSV, checking the 5 × 25 layout
pub fn read_matrix_csv(path: &Path) -> Result<Matrix> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .into_diagnostic()?;

    let mut matrix = Matrix::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.into_diagnostic()?;
        let row = record
            .iter()
            .enumerate()
            .map(|(col, field)| {
                field.parse::<f64>().map_err(|_| {
                    miette::miette!(
                        "{}: row {}, column {}: '{}' is not a number",
                        path.display(),
                        line + 1,
                        col + 1,
                        field
                    )
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        matrix.push(row);
    }

    if matrix.len() != SUBGROUP_SIZE || matrix.iter().any(|row| row.len() != SUBGROUP_COUNT) {
        return Err(miette::miette!(
            "{}: expected {} rows of {} values, found {} row(s) with lengths {:?}",
            path.display(),
            SUBGROUP_SIZE,
            SUBGROUP_COUNT,
            matrix.len(),
            matrix.iter().map(Vec::len).collect::<Vec<_>>()
        ));
    }
    Ok(matrix)
}

/// One line per subgroup: readings, mean and range
pub fn render_subgroup_table(data: &SpcData) -> String {
    let places = data.max_decimal_places;
    let mut builder = Builder::default();

    let mut header = vec!["#".to_string()];
    header.extend((1..=data.quantized.len()).map(|i| format!("X{}", i)));
    header.push("X̄".to_string());
    header.push("R".to_string());
    builder.push_record(header);

    let columns = data.quantized.first().map_or(0, Vec::len);
    for col in 0..columns {
        let mut record = vec![(col + 1).to_string()];
        record.extend(
            data.quantized
                .iter()
                .map(|row| format_value(row[col], places)),
        );
        record.push(format_value(data.x_bar.get(col).copied().unwrap_or(f64::NAN), places + 1));
        record.push(format_value(data.ranges.get(col).copied().unwrap_or(f64::NAN), places));
        builder.push_record(record);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}
