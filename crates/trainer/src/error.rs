use std::path::PathBuf;
use thiserror::Error;

use crate::events::EventKind;

/// Invalid run configuration. Raised before any batch is processed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("decay_percent must be in (0, 1], got {0}")]
    DecayPercent(f64),

    #[error("learning_rate must be positive and finite, got {0}")]
    LearningRate(f64),

    #[error("dropout must be in [0, 1), got {0}")]
    Dropout(f64),

    #[error("max_length must be at least 2, got {0}")]
    MaxLength(i64),

    #[error("{0} must list at least one layer")]
    EmptyUnits(&'static str),

    #[error("malformed unit list {input:?}: {reason}")]
    MalformedUnits { input: String, reason: String },

    #[error("{field} ({size}) is not divisible by num_heads ({heads})")]
    HeadMismatch {
        field: &'static str,
        size: i64,
        heads: i64,
    },

    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("trainer has already been run")]
    AlreadyRun,

    #[error("update function failed at iteration {iteration}")]
    Update {
        iteration: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error("validation function failed in epoch {epoch}")]
    Validation {
        epoch: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("hook '{hook}' failed on {event:?}")]
    Hook {
        hook: &'static str,
        event: EventKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("non-finite loss {loss} at iteration {iteration}")]
    NonFiniteLoss { iteration: u64, loss: f64 },
}

pub type Result<T> = std::result::Result<T, TrainerError>;
