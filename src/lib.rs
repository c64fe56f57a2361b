pub mod circuit_breaker;
pub mod confidence;
pub mod config;
pub mod config_validator;
pub mod context;
pub mod data_validator;
pub mod dual_timeframe;
pub mod engine;
pub mod error;
pub mod frequency;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod reason_tags;
pub mod regime;
pub mod risk_gate;
pub mod signal;
pub mod state_store;
pub mod volume;

pub use config::{Settings, ThresholdConfig, ValidatedConfig};
pub use engine::DecisionEngine;
pub use error::DecisionError;
pub use model::{Decision, DecisionKind, DualConclusion, Evaluation};
