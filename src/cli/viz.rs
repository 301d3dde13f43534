//! Terminal visualization using braille graphics
//!
//! Renders the X̄ series against its control limits with Unicode braille
//! characters, plus a one-line bar showing where the data sits inside the
//! tolerance.

use drawille::Canvas;

use crate::cli::helpers::format_value;
use crate::core::limits::ControlLimits;
use crate::core::tolerance::Tolerance;

/// Default canvas size for the X̄ chart, in braille dots
pub const CHART_WIDTH: u32 = 150;
pub const CHART_HEIGHT: u32 = 48;

/// Gap between dots on zone boundary lines
const DOT_SPACING: u32 = 4;

/// Render an X̄ chart
///
/// UCL/CL/LCL are solid lines, the 1σ and 2σ zone boundaries dotted.
///
/// # Example Output
/// ```text
/// ⠉⠉⠉⠉⠉⠉⠉⠉⠉⠉⠉⠉⠉⠉⠉⠉⠉⠉⠉⠉  UCL 10.857
/// ⠀⠀⠀⡠⠊⢢⠀⠀⠀⢀⠤⡀⠀⠀⠀⠀⠀⠀⠀⠀
/// ⠒⠒⠊⠒⠒⠒⠑⠒⠒⠊⠒⠒⠑⠒⠒⠒⠒⠒⠒⠒  CL  10.000
/// ⣀⣀⣀⣀⣀⣀⣀⣀⣀⣀⣀⣀⣀⣀⣀⣀⣀⣀⣀⣀  LCL 9.143
/// ```
pub fn render_xbar_chart(
    x_bar: &[f64],
    limits: &ControlLimits,
    width: u32,
    height: u32,
) -> String {
    if x_bar.is_empty() || width < 2 || height < 4 {
        return "  (no data)".to_string();
    }

    // Keep every point on the canvas even when one lies outside the limits
    let data_min = x_bar.iter().copied().fold(f64::INFINITY, f64::min);
    let data_max = x_bar.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let margin = limits.sigma * 0.5;
    let view_min = data_min.min(limits.lcl) - margin;
    let view_max = data_max.max(limits.ucl) + margin;
    let view_range = (view_max - view_min).max(f64::EPSILON);

    let max_y = height - 1;
    let to_y = |value: f64| -> u32 {
        let t = ((view_max - value) / view_range).clamp(0.0, 1.0);
        (t * max_y as f64).round() as u32
    };
    let to_x = |index: usize| -> u32 {
        if x_bar.len() == 1 {
            0
        } else {
            ((index as f64 / (x_bar.len() - 1) as f64) * (width - 1) as f64).round() as u32
        }
    };

    let mut canvas = Canvas::new(width, height);

    for &limit in &[limits.ucl, limits.cl, limits.lcl] {
        let y = to_y(limit);
        canvas.line(0, y, width - 1, y);
    }
    for &zone in &[limits.ucl1, limits.ucl2, limits.lcl1, limits.lcl2] {
        let y = to_y(zone);
        for x in (0..width).step_by(DOT_SPACING as usize) {
            canvas.set(x, y);
        }
    }

    for (i, pair) in x_bar.windows(2).enumerate() {
        canvas.line(to_x(i), to_y(pair[0]), to_x(i + 1), to_y(pair[1]));
    }
    // Mark each subgroup mean with a small cross
    for (i, &value) in x_bar.iter().enumerate() {
        let (x, y) = (to_x(i), to_y(value));
        canvas.set(x, y.saturating_sub(1));
        canvas.set(x, (y + 1).min(max_y));
        canvas.set(x.saturating_sub(1), y);
        canvas.set((x + 1).min(width - 1), y);
    }

    // Braille cells are 4 dots tall; label the rows the limit lines fall in
    let labels = [
        (to_y(limits.ucl) / 4, format!("UCL {}", format_value(limits.ucl, 3))),
        (to_y(limits.cl) / 4, format!("CL  {}", format_value(limits.cl, 3))),
        (to_y(limits.lcl) / 4, format!("LCL {}", format_value(limits.lcl, 3))),
    ];

    let mut output = String::from("X̄ chart:\n");
    for (row, line) in canvas.rows().into_iter().enumerate() {
        output.push_str(&line);
        if let Some((_, label)) = labels.iter().find(|(r, _)| *r as usize == row) {
            output.push_str("  ");
            output.push_str(label);
        }
        output.push('\n');
    }
    output.push_str(&format!("  subgroups 1-{}", x_bar.len()));
    output
}

/// Render a 1D bar of the data spread against the specification limits
///
/// Returns `None` unless the tolerance has both limits.
pub fn render_spec_bar(min: f64, max: f64, tolerance: &Tolerance, places: u32) -> Option<String> {
    let (lower_limit, upper_limit) = (tolerance.lsl?, tolerance.usl?);
    let bar_width = 60;

    let full_range = upper_limit - lower_limit;
    let spec_margin = full_range * 0.1;
    let view_min = lower_limit - spec_margin;
    let view_range = full_range + 2.0 * spec_margin;

    let position = |value: f64| -> usize {
        let t = ((value - view_min) / view_range).clamp(0.0, 1.0);
        ((t * bar_width as f64) as usize).min(bar_width - 1)
    };
    let (pos_lower, pos_upper) = (position(lower_limit), position(upper_limit));
    let (pos_min, pos_max) = (position(min), position(max));

    let mut bar: Vec<char> = vec!['─'; bar_width];
    bar[pos_lower] = '│';
    bar[pos_upper] = '│';
    for cell in &mut bar[pos_min..=pos_max] {
        *cell = if *cell == '│' { '╋' } else { '═' };
    }
    bar[pos_min] = if bar[pos_min] == '╋' { '╟' } else { '[' };
    bar[pos_max] = if bar[pos_max] == '╋' { '╢' } else { ']' };

    let bar_str: String = bar.into_iter().collect();
    Some(format!(
        "  LSL={}  USL={}\n  {}\n  Min={}  Max={}",
        format_value(lower_limit, places),
        format_value(upper_limit, places),
        bar_str,
        format_value(min, places),
        format_value(max, places)
    ))
}
