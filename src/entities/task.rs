//! Inspection tasks and batch plans

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::resolution::Resolution;
use crate::yaml::{parse_yaml_file, YamlError};

/// Whether a task draws its data inside a reference band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    #[default]
    Standard,
    /// Use the task's reference range when it has one
    Reference,
}

impl std::fmt::Display for TaskMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskMode::Standard => write!(f, "standard"),
            TaskMode::Reference => write!(f, "reference"),
        }
    }
}

impl std::str::FromStr for TaskMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(TaskMode::Standard),
            "reference" | "reference-range" | "reference_range" => Ok(TaskMode::Reference),
            _ => Err(format!("Unknown mode: {}", s)),
        }
    }
}

/// One inspection item that needs a chart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub product_model: String,

    #[serde(default)]
    pub process: String,

    #[serde(default)]
    pub inspection_item: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub equipment_no: String,

    /// Tolerance callout as written on the drawing, e.g. "φ3.5±0.1"
    pub theory: String,

    /// Where production data actually clusters, e.g. "52.992-52.999"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_range: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cpk: Option<f64>,
}

impl Task {
    /// Standalone task from a tolerance callout
    pub fn new(theory: impl Into<String>) -> Self {
        Self {
            theory: theory.into(),
            ..Default::default()
        }
    }

    /// Short human label: "product / process / item", skipping blanks
    pub fn label(&self) -> String {
        let parts: Vec<&str> = [&self.product_model, &self.process, &self.inspection_item]
            .into_iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            self.theory.clone()
        } else {
            parts.join(" / ")
        }
    }

    /// Reference text, treating blank strings as absent
    pub fn reference_text(&self) -> Option<&str> {
        self.reference_range
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Fill unset fields from plan defaults
    pub fn with_defaults(mut self, defaults: &PlanDefaults) -> Self {
        self.target_cpk = self.target_cpk.or(defaults.target_cpk);
        self.resolution = self.resolution.or(defaults.resolution);
        self
    }
}

/// Values applied to every task that leaves them unset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cpk: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,

    #[serde(default)]
    pub mode: TaskMode,
}

/// A batch of tasks, usually one month of one production line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub defaults: PlanDefaults,

    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Plan {
    pub fn load(path: &Path) -> Result<Self, YamlError> {
        let plan: Option<Plan> = parse_yaml_file(path)?;
        Ok(plan.unwrap_or_default())
    }

    /// Tasks with plan defaults applied
    pub fn resolved_tasks(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .cloned()
            .map(|t| t.with_defaults(&self.defaults))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yaml::parse_yaml;

    const PLAN: &str = r#"
defaults:
  target_cpk: 1.67
  resolution: 0.001
  mode: reference
tasks:
  - product_model: HX-200
    process: Turning
    inspection_item: Bore
    theory: "φ53±0.01"
    reference_range: "52.992-52.999"
  - product_model: HX-200
    process: Grinding
    inspection_item: Flatness
    theory: "≤0.05"
    resolution: "0.01"
    target_cpk: 1.33
"#;

    #[test]
    fn test_plan_parses_with_defaults() {
        let plan: Plan = parse_yaml(PLAN, "plan.yaml").unwrap();
        assert_eq!(plan.defaults.mode, TaskMode::Reference);
        assert_eq!(plan.tasks.len(), 2);

        let tasks = plan.resolved_tasks();
        assert_eq!(tasks[0].target_cpk, Some(1.67));
        assert_eq!(tasks[0].resolution, Some(Resolution::Decimal(3)));
        assert_eq!(tasks[1].target_cpk, Some(1.33));
        assert_eq!(tasks[1].resolution, Some(Resolution::Decimal(2)));
    }

    #[test]
    fn test_empty_plan() {
        let plan: Option<Plan> = parse_yaml("", "empty.yaml").unwrap();
        assert!(plan.unwrap_or_default().tasks.is_empty());
    }

    #[test]
    fn test_task_label_skips_blanks() {
        let task = Task {
            product_model: "HX-200".into(),
            inspection_item: "Bore".into(),
            ..Task::new("φ53±0.01")
        };
        assert_eq!(task.label(), "HX-200 / Bore");
        assert_eq!(Task::new("≤0.05").label(), "≤0.05");
    }

    #[test]
    fn test_blank_reference_is_absent() {
        let task = Task {
            reference_range: Some("  ".into()),
            ..Task::new("10±1")
        };
        assert_eq!(task.reference_text(), None);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Reference".parse::<TaskMode>(), Ok(TaskMode::Reference));
        assert!("other".parse::<TaskMode>().is_err());
    }
}
