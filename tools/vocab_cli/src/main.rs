use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vocab::{tokenize, Vocab, VocabBuilder};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a vocabulary from corpus files (one sentence per line)
    Build {
        /// Input files to count tokens in
        #[arg(required = true)]
        files: Vec<String>,

        /// Where to write vocab.json
        #[arg(short, long, default_value = "data/vocab.json")]
        output: PathBuf,

        /// Maximum number of regular tokens (specials excluded)
        #[arg(short, long)]
        max_size: Option<usize>,

        /// Minimum number of occurrences for a token to be kept
        #[arg(long, default_value_t = 3)]
        min_freq: u32,
    },
    /// Encode text using an existing vocabulary
    Encode {
        /// Path to vocab.json
        #[arg(long)]
        vocab: PathBuf,

        /// Text to encode
        #[arg(short, long)]
        text: String,
    },
    /// Decode IDs using an existing vocabulary
    Decode {
        /// Path to vocab.json
        #[arg(long)]
        vocab: PathBuf,

        /// IDs to decode (comma separated)
        #[arg(short, long)]
        ids: String,
    },
}

fn parse_ids(ids: &str) -> Result<Vec<u32>> {
    ids.split(',')
        .map(|s| s.trim().parse::<u32>().with_context(|| format!("Invalid ID: {:?}", s)))
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            files,
            output,
            max_size,
            min_freq,
        } => {
            log::info!("Building vocabulary from {:?}...", files);
            let vocab = VocabBuilder::new(max_size, min_freq)
                .build_from_files(&files)
                .context("Failed to build vocabulary")?;

            if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            vocab.save(&output).context("Failed to save vocab")?;
            log::info!("Saved {} tokens to {:?}", vocab.len(), output);
        }
        Commands::Encode { vocab, text } => {
            let vocab = Vocab::load(vocab).context("Failed to load vocabulary")?;
            let ids = vocab.encode(tokenize(&text));
            println!("Encoded IDs: {:?}", ids);
        }
        Commands::Decode { vocab, ids } => {
            let vocab = Vocab::load(vocab).context("Failed to load vocabulary")?;
            let id_list = parse_ids(&ids)?;
            println!("Decoded text: {}", vocab.decode(&id_list));
        }
    }

    Ok(())
}
