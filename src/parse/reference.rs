use std::sync::OnceLock;

use regex::Regex;

use super::{number, ParseError};
use crate::core::tolerance::ReferenceRange;

static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn pattern() -> Result<&'static Regex, ParseError> {
    PATTERN
        .get_or_init(|| Regex::new(r"^([-+]?\d*\.?\d+)[-~–—]([-+]?\d*\.?\d+)$"))
        .as_ref()
        .map_err(|e| ParseError::Pattern(e.clone()))
}

/// Parse "52.992-52.999" (also `~`, en and em dashes, signed bounds)
///
/// Whitespace anywhere in the text is ignored. The lower bound must be
/// strictly below the upper one.
pub fn parse_reference_range(text: &str) -> Result<ReferenceRange, ParseError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let caps = pattern()?
        .captures(&compact)
        .ok_or_else(|| ParseError::ReferenceRange(text.to_string()))?;

    let (Some(lower), Some(upper)) = (number(&caps[1]), number(&caps[2])) else {
        return Err(ParseError::ReferenceRange(text.to_string()));
    };
    ReferenceRange::new(lower, upper).map_err(|source| ParseError::InvalidReference {
        text: text.to_string(),
        source,
    })
}
