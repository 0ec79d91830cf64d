use clap::Parser;
use std::path::PathBuf;

use crate::config::{parse_units, DeviceChoice, TrainerConfig};
use crate::error::ConfigError;

/// Transformer translation training.
///
/// Settings are layered: built-in defaults, then `--config` (YAML), then
/// any flag given on the command line.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// YAML file with any subset of the training settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of examples in a single iteration
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Number of epochs
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Maximum vocabulary size for the encoder
    #[arg(long)]
    pub enc_max_vocab: Option<usize>,

    /// Maximum vocabulary size for the decoder
    #[arg(long)]
    pub dec_max_vocab: Option<usize>,

    /// Feed-forward units of every encoder layer, comma separated
    #[arg(long)]
    pub encoder_units: Option<String>,

    /// Feed-forward units of every decoder layer, comma separated
    #[arg(long)]
    pub decoder_units: Option<String>,

    /// Size of the encoder's embedding
    #[arg(long)]
    pub encoder_emb_size: Option<i64>,

    /// Size of the decoder's embedding
    #[arg(long)]
    pub decoder_emb_size: Option<i64>,

    /// Print the loss moving average every N steps
    #[arg(long)]
    pub log_interval: Option<u64>,

    /// Save the model every N steps
    #[arg(long)]
    pub save_interval: Option<u64>,

    /// Compare current predictions with their true labels every N steps
    #[arg(long)]
    pub compare_interval: Option<u64>,

    /// Decay the learning rate every N steps
    #[arg(long)]
    pub decay_step: Option<usize>,

    /// Factor applied to the learning rate at every decay
    #[arg(long)]
    pub decay_percent: Option<f64>,

    /// Initial learning rate
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Checkpoint file (.safetensors, or the native tensor format otherwise)
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Directory holding <split>.<ext> corpus files
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    /// Source language file extension
    #[arg(long)]
    pub src_ext: Option<String>,

    /// Target language file extension
    #[arg(long)]
    pub trg_ext: Option<String>,

    /// Compute device
    #[arg(long, value_enum)]
    pub device: Option<DeviceChoice>,

    /// Seed for batch shuffling and parameter initialization
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Args {
    /// Builds the validated run configuration.
    pub fn resolve(&self) -> Result<TrainerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => TrainerConfig::from_yaml(path)?,
            None => TrainerConfig::default(),
        };
        self.apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut TrainerConfig) -> Result<(), ConfigError> {
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = &self.$field {
                    config.$field = value.clone();
                })*
            };
        }
        set!(
            batch_size,
            epochs,
            enc_max_vocab,
            dec_max_vocab,
            encoder_emb_size,
            decoder_emb_size,
            log_interval,
            save_interval,
            compare_interval,
            decay_step,
            decay_percent,
            learning_rate,
            model_dir,
            data_root,
            src_ext,
            trg_ext,
            seed,
        );

        if let Some(units) = &self.encoder_units {
            config.encoder_units = parse_units(units)?;
        }
        if let Some(units) = &self.decoder_units {
            config.decoder_units = parse_units(units)?;
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        Ok(())
    }
}
