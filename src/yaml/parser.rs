//! Typed YAML loading and saving

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::yaml::diagnostics::{YamlError, YamlSyntaxError};

/// Deserialize `content`; `filename` only labels diagnostics
pub fn parse_yaml<T: DeserializeOwned>(content: &str, filename: &str) -> Result<T, YamlError> {
    serde_yml::from_str(content)
        .map_err(|e| YamlError::Syntax(YamlSyntaxError::from_serde_error(&e, content, filename)))
}

pub fn parse_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T, YamlError> {
    let content = std::fs::read_to_string(path).map_err(|source| YamlError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_yaml(&content, &path.display().to_string())
}

/// Serialize `value` to `path`, creating parent directories as needed
pub fn write_yaml_file<T: Serialize>(path: &Path, value: &T) -> Result<(), YamlError> {
    let text = serde_yml::to_string(value).map_err(|e| YamlError::Serialize(e.to_string()))?;
    let io_err = |source| YamlError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, text).map_err(io_err)
}
