use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::sync::Arc;
use tch::nn;

use nmt_core::Seq2SeqTransformer;
use trainer::bucket::BucketSampler;
use trainer::cli::Args;
use trainer::dataset::{encode_split, BucketIterator, ParallelText};
use trainer::hooks::{MovingAverageLogger, RestoreCheckpoint, SamplePrinter, SaveCheckpoint};
use trainer::schedule::StepDecay;
use trainer::step::TranslationStep;
use trainer::{EventKind, RunOptions, Trainer, TrainerConfig};
use vocab::VocabBuilder;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.resolve().context("Invalid configuration")?;
    run(config)
}

fn run(config: TrainerConfig) -> Result<()> {
    let device = config.device.resolve();
    info!("Using device: {:?}", device);
    tch::manual_seed(config.seed as i64);

    // 1. Load corpus
    let train_text = ParallelText::load(
        config.split_path(&config.train_split, &config.src_ext),
        config.split_path(&config.train_split, &config.trg_ext),
    )?;
    let valid_text = ParallelText::load(
        config.split_path(&config.valid_split, &config.src_ext),
        config.split_path(&config.valid_split, &config.trg_ext),
    )?;
    info!("Loaded {} training and {} validation pairs", train_text.len(), valid_text.len());

    // 2. Vocabularies from the training split
    let src_vocab = VocabBuilder::new(Some(config.enc_max_vocab), config.min_freq).build_from_lines(&train_text.src);
    let trg_vocab = Arc::new(
        VocabBuilder::new(Some(config.dec_max_vocab), config.min_freq).build_from_lines(&train_text.trg),
    );
    info!("Source vocab: {}, target vocab: {}", src_vocab.len(), trg_vocab.len());

    let max_length = config.max_length as usize;
    let train_examples = Arc::new(encode_split(&train_text, &src_vocab, &trg_vocab, max_length));
    let valid_examples = Arc::new(encode_split(&valid_text, &src_vocab, &trg_vocab, max_length));

    // 3. Model, optimizer and learning rate policy
    let pad = trg_vocab.pad_id();
    let model_config = config.model_config(src_vocab.len(), trg_vocab.len(), pad as i64);
    let vs = nn::VarStore::new(device);
    let model = Seq2SeqTransformer::new(&vs.root(), &model_config);
    let schedule = StepDecay::new(config.learning_rate, config.decay_step, config.decay_percent);
    let step = TranslationStep::new(vs, model, schedule, pad as i64)?;

    // 4. Batches
    let train_iter = BucketIterator::new(
        train_examples,
        BucketSampler::train(config.batch_size, config.seed),
        pad,
        device,
    );
    let valid_iter = BucketIterator::new(valid_examples, BucketSampler::eval(config.batch_size), pad, device);

    // 5. Hooks
    let mut trainer = Trainer::new(step, train_iter, Some(valid_iter)).with_options(RunOptions::from(&config));
    trainer
        .add_setup_handler(RestoreCheckpoint::new(&config.model_dir))
        .add_event_handler(
            EventKind::TrainingIterationCompleted,
            MovingAverageLogger::training(&config.metric_name, config.window_size, config.log_interval),
        )
        .add_event_handler(
            EventKind::TrainingIterationCompleted,
            SaveCheckpoint::every(&config.model_dir, config.save_interval),
        )
        .add_event_handler(
            EventKind::TrainingIterationCompleted,
            SamplePrinter::new(Arc::clone(&trg_vocab), config.compare_interval),
        )
        .add_event_handler(
            EventKind::ValidationCompleted,
            MovingAverageLogger::validation(&config.metric_name, config.window_size),
        )
        .add_event_handler(EventKind::TrainingCompleted, SaveCheckpoint::always(&config.model_dir));

    // 6. Train
    let summary = trainer.run(config.epochs)?;
    info!(
        "Done: {} epochs, {} iterations, final learning rate {:e}",
        summary.epochs, summary.iterations, summary.learning_rate
    );

    Ok(())
}
