use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tch::Device;

use nmt_core::Seq2SeqConfig;

use crate::error::ConfigError;

/// Where tensors live for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DeviceChoice {
    /// CUDA when available, otherwise CPU.
    Auto,
    Cpu,
    /// CUDA device 0; falls back to CPU with a warning when absent.
    Cuda,
}

impl DeviceChoice {
    pub fn resolve(self) -> Device {
        match self {
            DeviceChoice::Auto => Device::cuda_if_available(),
            DeviceChoice::Cpu => Device::Cpu,
            DeviceChoice::Cuda => {
                if tch::Cuda::is_available() {
                    Device::Cuda(0)
                } else {
                    warn!("CUDA requested but not available, falling back to CPU");
                    Device::Cpu
                }
            }
        }
    }
}

/// How often `ValidationCompleted` fires during a validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationEvents {
    /// Once per validation batch, carrying that batch and its loss.
    PerBatch,
    /// Once per pass, carrying the mean loss and no batch.
    PerPass,
}

/// What to do when a loss comes back NaN or infinite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonFinitePolicy {
    Abort,
    Warn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub batch_size: usize,
    pub epochs: usize,
    pub enc_max_vocab: usize,
    pub dec_max_vocab: usize,
    pub min_freq: u32,
    pub max_length: i64,
    pub encoder_units: Vec<i64>,
    pub decoder_units: Vec<i64>,
    pub encoder_emb_size: i64,
    pub decoder_emb_size: i64,
    pub num_heads: i64,
    pub dropout: f64,
    pub learning_rate: f64,
    pub log_interval: u64,
    pub save_interval: u64,
    pub compare_interval: u64,
    pub decay_step: usize,
    pub decay_percent: f64,
    pub window_size: usize,
    pub metric_name: String,
    /// Checkpoint file path.
    pub model_dir: PathBuf,
    pub data_root: PathBuf,
    pub src_ext: String,
    pub trg_ext: String,
    pub train_split: String,
    pub valid_split: String,
    pub device: DeviceChoice,
    pub seed: u64,
    pub validate_every_epoch: bool,
    pub validation_events: ValidationEvents,
    pub non_finite_loss: NonFinitePolicy,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size: 2,
            epochs: 10000,
            enc_max_vocab: 80000,
            dec_max_vocab: 80000,
            min_freq: 3,
            max_length: 100,
            encoder_units: vec![512; 6],
            decoder_units: vec![512; 6],
            encoder_emb_size: 512,
            decoder_emb_size: 512,
            num_heads: 8,
            dropout: 0.1,
            learning_rate: 1e-3,
            log_interval: 2,
            save_interval: 10,
            compare_interval: 10,
            decay_step: 500,
            decay_percent: 0.1,
            window_size: 10,
            metric_name: "CrossEntropy".to_string(),
            model_dir: PathBuf::from("./transformer-cp.safetensors"),
            data_root: PathBuf::from("./"),
            src_ext: "de".to_string(),
            trg_ext: "en".to_string(),
            train_split: "train".to_string(),
            valid_split: "eval".to_string(),
            device: DeviceChoice::Auto,
            seed: 42,
            validate_every_epoch: true,
            validation_events: ValidationEvents::PerBatch,
            non_finite_loss: NonFinitePolicy::Abort,
        }
    }
}

/// Parses a comma-separated list of layer widths such as `"512,512,256"`.
pub fn parse_units(input: &str) -> Result<Vec<i64>, ConfigError> {
    let malformed = |reason: String| ConfigError::MalformedUnits {
        input: input.to_string(),
        reason,
    };

    input
        .split(',')
        .map(|part| {
            let part = part.trim();
            let units: i64 = part
                .parse()
                .map_err(|e| malformed(format!("{:?}: {}", part, e)))?;
            if units <= 0 {
                return Err(malformed(format!("{} is not a positive width", units)));
            }
            Ok(units)
        })
        .collect()
}

impl TrainerConfig {
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("batch_size", self.batch_size as u64),
            ("log_interval", self.log_interval),
            ("save_interval", self.save_interval),
            ("compare_interval", self.compare_interval),
            ("decay_step", self.decay_step as u64),
            ("window_size", self.window_size as u64),
            ("num_heads", self.num_heads.max(0) as u64),
            ("encoder_emb_size", self.encoder_emb_size.max(0) as u64),
            ("decoder_emb_size", self.decoder_emb_size.max(0) as u64),
        ];
        for (name, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }

        if !(self.decay_percent > 0.0 && self.decay_percent <= 1.0) {
            return Err(ConfigError::DecayPercent(self.decay_percent));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ConfigError::LearningRate(self.learning_rate));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ConfigError::Dropout(self.dropout));
        }
        if self.max_length < 2 {
            return Err(ConfigError::MaxLength(self.max_length));
        }

        for (field, units) in [
            ("encoder_units", &self.encoder_units),
            ("decoder_units", &self.decoder_units),
        ] {
            if units.is_empty() {
                return Err(ConfigError::EmptyUnits(field));
            }
            if let Some(bad) = units.iter().find(|&&u| u <= 0) {
                return Err(ConfigError::MalformedUnits {
                    input: format!("{:?}", units),
                    reason: format!("{} is not a positive width", bad),
                });
            }
        }

        for (field, size) in [
            ("encoder_emb_size", self.encoder_emb_size),
            ("decoder_emb_size", self.decoder_emb_size),
        ] {
            if size % self.num_heads != 0 {
                return Err(ConfigError::HeadMismatch {
                    field,
                    size,
                    heads: self.num_heads,
                });
            }
        }

        Ok(())
    }

    pub fn model_config(&self, enc_vocab_size: usize, dec_vocab_size: usize, pad_index: i64) -> Seq2SeqConfig {
        Seq2SeqConfig {
            max_length: self.max_length,
            enc_vocab_size: enc_vocab_size as i64,
            dec_vocab_size: dec_vocab_size as i64,
            enc_emb_size: self.encoder_emb_size,
            dec_emb_size: self.decoder_emb_size,
            enc_units: self.encoder_units.clone(),
            dec_units: self.decoder_units.clone(),
            n_head: self.num_heads,
            dropout: self.dropout,
            pad_index,
            ..Seq2SeqConfig::default()
        }
    }

    /// Path of `<split>.<ext>` under the data root.
    pub fn split_path(&self, split: &str, ext: &str) -> PathBuf {
        self.data_root.join(format!("{}.{}", split, ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        TrainerConfig::default().validate().unwrap();
    }

    #[test]
    fn parses_unit_lists() {
        assert_eq!(parse_units("512, 256,128").unwrap(), vec![512, 256, 128]);
    }

    #[test]
    fn rejects_malformed_unit_lists() {
        assert!(matches!(parse_units("512,,128"), Err(ConfigError::MalformedUnits { .. })));
        assert!(matches!(parse_units("512,abc"), Err(ConfigError::MalformedUnits { .. })));
        assert!(matches!(parse_units("512,-4"), Err(ConfigError::MalformedUnits { .. })));
    }

    #[test]
    fn rejects_zero_intervals() {
        let config = TrainerConfig {
            save_interval: 0,
            ..TrainerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero("save_interval"))));
    }

    #[test]
    fn rejects_increasing_decay() {
        let config = TrainerConfig {
            decay_percent: 1.5,
            ..TrainerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::DecayPercent(_))));
    }

    #[test]
    fn rejects_heads_that_do_not_divide_embeddings() {
        let config = TrainerConfig {
            decoder_emb_size: 100,
            num_heads: 8,
            ..TrainerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HeadMismatch { field: "decoder_emb_size", .. })
        ));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.yaml");
        fs::write(
            &path,
            "batch_size: 32\nencoder_units: [64, 64]\nvalidation_events: per_pass\n",
        )
        .unwrap();

        let config = TrainerConfig::from_yaml(&path).unwrap();
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.encoder_units, vec![64, 64]);
        assert_eq!(config.validation_events, ValidationEvents::PerPass);
        assert_eq!(config.decay_step, 500);
        assert_eq!(config.metric_name, "CrossEntropy");
    }
}
