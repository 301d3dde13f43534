//! Tolerance callouts as written on drawings and inspection plans
//!
//! Formats are tried in a fixed priority order; the first one that matches
//! the whole text wins.

use std::sync::OnceLock;

use regex::Regex;

use super::{number, ParseError};
use crate::core::tolerance::{Tolerance, ToleranceError, ToleranceKind};

/// Values that mean "no numeric specification"
const SPECIAL_VALUES: [&str; 3] = ["OK", "/", "符合"];

/// Visual inspection wording (rust, burrs, dents, scratches, "not allowed")
const APPEARANCE_KEYWORDS: [&str; 7] = ["无锈蚀", "缺陷", "毛刺", "锈蚀", "磕碰", "划伤", "不允许"];

/// Material grades and standards
const MATERIAL_KEYWORDS: [&str; 2] = ["CrMo", "GB/T"];

struct Patterns {
    /// "下限：29.947；上限：29.98", optionally preceded by a base value
    labelled_limits: Regex,
    /// "2-φ3.5±0.1"
    multi_feature: Regex,
    /// "φ0.04", "≤Φ0.04", "≤0.8", "<0.025"
    upper_bound: Regex,
    /// "Ra0.8", "≤Rz3.2"
    roughness: Regex,
    /// "0.025mm"
    with_unit: Regex,
    /// "47.322-47.331", "φ57.67-φ57.70"
    range: Regex,
    /// "27.4(-0.05/-0.1)", full-width parentheses allowed
    asymmetric: Regex,
    /// "φ3.5±0.1", "120°±3°", "27.4(±0.1)"
    symmetric: Regex,
    /// "C0.3±0.2", "R1.5±0.3"
    edge_symmetric: Regex,
    /// "C0.3max"
    chamfer_max: Regex,
    min: Regex,
    max: Regex,
    /// "M8"
    thread: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            labelled_limits: Regex::new(
                r"下限\s*[:：]\s*([0-9.]+)\s*[;；]\s*上限\s*[:：]\s*([0-9.]+)",
            )?,
            multi_feature: Regex::new(r"^(\d+)\s*-\s*(.+)$")?,
            upper_bound: Regex::new(r"^(?:[≤≥＜＞<>]?\s*[φΦ]|[≤＜<])\s*([0-9.]+)$")?,
            roughness: Regex::new(r"(?i)^[≤＜<]?\s*(?:Ra|Rz|Pt|Pa|Ry|Rpk)\s*([0-9.]+)$")?,
            with_unit: Regex::new(r"(?i)^([0-9.]+)\s*(?:mm|μm|°|度)$")?,
            range: Regex::new(r"^[φΦ]?\s*([0-9.]+)\s*-\s*[φΦ]?\s*([0-9.]+)$")?,
            asymmetric: Regex::new(
                r"^[φΦ]?\s*([0-9.]+)\s*[（(]\s*([+-]?[0-9.]+)\s*/\s*([+-]?[0-9.]+)\s*[）)]$",
            )?,
            symmetric: Regex::new(
                r"^[φΦ]?\s*([0-9.]+)\s*°?\s*[（(]?\s*±\s*([0-9.]+)\s*°?\s*[）)]?$",
            )?,
            edge_symmetric: Regex::new(r"^[CR]\s*([0-9.]+)\s*±\s*([0-9.]+)")?,
            chamfer_max: Regex::new(r"(?i)^C\s*([0-9.]+)\s*max")?,
            min: Regex::new(r"(?i)^min\s*([0-9.]+)$")?,
            max: Regex::new(r"(?i)^max\s*([0-9.]+)$")?,
            thread: Regex::new(r"^M\d+")?,
        })
    }
}

static PATTERNS: OnceLock<Result<Patterns, regex::Error>> = OnceLock::new();

fn patterns() -> Result<&'static Patterns, ParseError> {
    PATTERNS
        .get_or_init(Patterns::compile)
        .as_ref()
        .map_err(|e| ParseError::Pattern(e.clone()))
}

/// Parse a tolerance callout
///
/// Empty text and non-numeric callouts (appearance checks, thread sizes,
/// "OK") give a tolerance of kind `None`. Text that matches no known format
/// is an error.
pub fn parse_tolerance(text: &str) -> Result<Tolerance, ParseError> {
    let text = text.trim();
    let p = patterns()?;

    let tol: Option<Result<Tolerance, ToleranceError>> = if text.is_empty()
        || SPECIAL_VALUES.contains(&text.to_uppercase().as_str())
    {
        Some(Ok(Tolerance::none()))
    } else if let Some(c) = p.labelled_limits.captures(text) {
        both(number(&c[2]), number(&c[1]))
    } else if let Some(t) = multi_feature(p, text)? {
        return Ok(t.with_raw(text));
    } else if let Some(c) = p
        .upper_bound
        .captures(text)
        .or_else(|| p.roughness.captures(text))
        .or_else(|| p.with_unit.captures(text))
    {
        number(&c[1]).map(|usl| Ok(Tolerance::upper_only(usl)))
    } else if let Some(c) = p.range.captures(text) {
        both(number(&c[2]), number(&c[1]))
    } else if let Some(c) = p.asymmetric.captures(text) {
        match (number(&c[1]), number(&c[2]), number(&c[3])) {
            (Some(base), Some(a), Some(b)) => both(Some(base + a.max(b)), Some(base + a.min(b))),
            _ => None,
        }
    } else if let Some(c) = p
        .symmetric
        .captures(text)
        .or_else(|| p.edge_symmetric.captures(text))
    {
        match (number(&c[1]), number(&c[2])) {
            (Some(base), Some(dev)) => both(Some(base + dev), Some(base - dev)),
            _ => None,
        }
    } else if let Some(c) = p.chamfer_max.captures(text).or_else(|| p.max.captures(text)) {
        number(&c[1]).map(|usl| Ok(upper_with_zero_floor(usl)))
    } else if let Some(c) = p.min.captures(text) {
        number(&c[1]).map(|lsl| Ok(Tolerance::lower_only(lsl)))
    } else if p.thread.is_match(text)
        || APPEARANCE_KEYWORDS.iter().any(|k| text.contains(k))
        || MATERIAL_KEYWORDS.iter().any(|k| text.contains(k))
    {
        Some(Ok(Tolerance::none()))
    } else {
        number(text).map(|usl| Ok(upper_with_zero_floor(usl)))
    };

    match tol {
        Some(Ok(t)) => Ok(t.with_raw(text)),
        Some(Err(source)) => Err(ParseError::InvalidBand {
            text: text.to_string(),
            source,
        }),
        None => Err(ParseError::Tolerance(text.to_string())),
    }
}

/// Double-sided band from (usl, lsl); `None` if either number failed
fn both(usl: Option<f64>, lsl: Option<f64>) -> Option<Result<Tolerance, ToleranceError>> {
    Some(Tolerance::double(usl?, lsl?))
}

/// Upper limit with an implied physical floor of zero ("max50", "C0.3max")
fn upper_with_zero_floor(usl: f64) -> Tolerance {
    Tolerance {
        usl: Some(usl),
        lsl: Some(0.0),
        kind: ToleranceKind::Upper,
        raw: String::new(),
    }
}

/// "2-φ3.5±0.1": a feature count, then the real callout
///
/// A bare number after the dash is a range ("10-20"), not a count.
fn multi_feature(p: &Patterns, text: &str) -> Result<Option<Tolerance>, ParseError> {
    let Some(c) = p.multi_feature.captures(text) else {
        return Ok(None);
    };
    let rest = c[2].trim();
    if number(rest).is_some() {
        return Ok(None);
    }
    parse_tolerance(rest).map(Some)
}
