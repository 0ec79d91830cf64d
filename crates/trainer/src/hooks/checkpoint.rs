use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::{Cadence, Hook, SetupHook};
use crate::events::EventContext;
use crate::train::Workload;

/// Parameter persistence offered by a workload.
///
/// A checkpoint holds model parameters only; optimizer state and run
/// counters are not part of it.
pub trait Checkpointable {
    fn save_checkpoint(&self, path: &Path) -> Result<()>;
    fn load_checkpoint(&mut self, path: &Path) -> Result<()>;
}

/// Informational sidecar written next to every checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub iteration: u64,
    pub epoch: usize,
    pub learning_rate: f64,
}

impl CheckpointMeta {
    pub fn path_for(checkpoint: &Path) -> PathBuf {
        let mut name = checkpoint.as_os_str().to_owned();
        name.push(".meta.json");
        PathBuf::from(name)
    }

    pub fn write(&self, checkpoint: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(Self::path_for(checkpoint), json)?;
        Ok(())
    }

    /// Reads the sidecar for `checkpoint`, if one exists.
    pub fn read(checkpoint: &Path) -> Result<Option<Self>> {
        let path = Self::path_for(checkpoint);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

/// Loads model parameters from `path` when training starts, if the file exists.
#[derive(Debug, Clone)]
pub struct RestoreCheckpoint {
    path: PathBuf,
}

impl RestoreCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl<W: Workload + Checkpointable> SetupHook<W> for RestoreCheckpoint {
    fn on_event(&mut self, _ctx: &EventContext<'_, W>, workload: &mut W) -> Result<()> {
        if !self.path.exists() {
            warn!("No checkpoint at {:?}, starting from fresh parameters", self.path);
            return Ok(());
        }

        workload
            .load_checkpoint(&self.path)
            .with_context(|| format!("Failed to restore checkpoint {:?}", self.path))?;

        match CheckpointMeta::read(&self.path) {
            Ok(Some(meta)) => info!(
                "Restored parameters from {:?} (saved at iteration {}, epoch {}); counters start from zero",
                self.path, meta.iteration, meta.epoch
            ),
            Ok(None) => info!("Restored parameters from {:?}", self.path),
            Err(e) => warn!("Restored parameters from {:?}, unreadable metadata: {}", self.path, e),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "restore_checkpoint"
    }
}

/// Writes model parameters to `path` whenever its cadence fires, overwriting
/// the previous checkpoint.
#[derive(Debug, Clone)]
pub struct SaveCheckpoint {
    path: PathBuf,
    cadence: Cadence,
    saves: u64,
}

impl SaveCheckpoint {
    pub fn new(path: impl Into<PathBuf>, cadence: Cadence) -> Self {
        Self {
            path: path.into(),
            cadence,
            saves: 0,
        }
    }

    /// Saves every `interval` iterations.
    pub fn every(path: impl Into<PathBuf>, interval: u64) -> Self {
        Self::new(path, Cadence::Every(interval))
    }

    /// Saves on every event it is registered for.
    pub fn always(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Cadence::Always)
    }

    pub fn saves(&self) -> u64 {
        self.saves
    }
}

impl<W: Workload + Checkpointable> Hook<W> for SaveCheckpoint {
    fn on_event(&mut self, ctx: &EventContext<'_, W>, workload: &W) -> Result<()> {
        let state = ctx.state;
        if !self.cadence.fires(state.iteration) {
            return Ok(());
        }

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        workload
            .save_checkpoint(&self.path)
            .with_context(|| format!("Failed to save checkpoint {:?}", self.path))?;

        CheckpointMeta {
            iteration: state.iteration,
            epoch: state.epoch,
            learning_rate: state.learning_rate,
        }
        .write(&self.path)?;

        self.saves += 1;
        info!("Saved checkpoint to {:?} at iteration {}", self.path, state.iteration);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "save_checkpoint"
    }
}
