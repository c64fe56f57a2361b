use crate::config_validator::ConfigViolation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("Threshold configuration rejected ({} violation(s)): {}", .0.len(), join_violations(.0))]
    InvalidConfig(Vec<ConfigViolation>),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Decision memory observed in a state no legal transition can produce.
    #[error("Decision memory inconsistent for {lane}: {detail}")]
    StateInconsistency { lane: String, detail: String },
}

fn join_violations(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl DecisionError {
    pub fn violations(&self) -> &[ConfigViolation] {
        match self {
            DecisionError::InvalidConfig(v) => v,
            _ => &[],
        }
    }
}
