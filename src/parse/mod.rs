//! Parsers for specification text found on inspection plans

mod reference;
mod theory;

pub use reference::parse_reference_range;
pub use theory::parse_tolerance;

use thiserror::Error;

use crate::core::tolerance::ToleranceError;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Cannot parse tolerance '{0}'")]
    Tolerance(String),

    #[error("Tolerance '{text}' describes an impossible band: {source}")]
    InvalidBand {
        text: String,
        #[source]
        source: ToleranceError,
    },

    #[error("Cannot parse reference range '{0}', expected 'lower-upper'")]
    ReferenceRange(String),

    #[error("Reference range '{text}' is not ordered: {source}")]
    InvalidReference {
        text: String,
        #[source]
        source: ToleranceError,
    },

    #[error("Built-in pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),
}

/// Parse a captured number, tolerating stray dots the patterns let through
fn number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
