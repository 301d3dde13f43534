//! YAML errors rendered as miette diagnostics

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum YamlError {
    #[error("Failed to read {path}")]
    #[diagnostic(code(spcs::yaml::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] YamlSyntaxError),

    #[error("Failed to write YAML: {0}")]
    #[diagnostic(code(spcs::yaml::serialize))]
    Serialize(String),
}

/// Parse failure pointing at the offending spot in the source
#[derive(Debug, Error, Diagnostic)]
#[error("Invalid YAML in {filename}: {message}")]
#[diagnostic(
    code(spcs::yaml::syntax),
    help("check indentation, and that numeric fields are not written as text")
)]
pub struct YamlSyntaxError {
    pub filename: String,
    pub message: String,
    /// 1-based
    pub line: Option<usize>,
    /// 1-based
    pub column: Option<usize>,

    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    span: Option<SourceSpan>,
}

impl YamlSyntaxError {
    pub fn from_serde_error(err: &serde_yml::Error, content: &str, filename: &str) -> Self {
        let location = err.location();
        let span = location.as_ref().map(|loc| {
            let offset = loc.index().min(content.len());
            let len = usize::from(offset < content.len());
            SourceSpan::from((offset, len))
        });

        Self {
            filename: filename.to_string(),
            message: err.to_string(),
            line: location.as_ref().map(|loc| loc.line()),
            column: location.as_ref().map(|loc| loc.column()),
            src: NamedSource::new(filename, content.to_string()),
            span,
        }
    }
}
