pub mod bucket;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod events;
pub mod hooks;
pub mod schedule;
pub mod step;
pub mod train;

pub use config::TrainerConfig;
pub use error::{ConfigError, TrainerError};
pub use events::{EventContext, EventKind, Phase, RunState, RunSummary};
pub use hooks::{Cadence, Hook, SetupHook};
pub use train::{BatchSource, RunOptions, StepOutput, Trainer, Workload};
