mod common;

use common::*;
use trainer::config::{NonFinitePolicy, ValidationEvents};
use trainer::schedule::StepDecay;
use trainer::{EventKind, Phase, RunOptions, Trainer, TrainerError};

type StubTrainer = Trainer<StubWorkload, Vec<StubBatch>, Vec<StubBatch>>;

fn trainer(train: Vec<StubBatch>, valid: Option<Vec<StubBatch>>) -> StubTrainer {
    Trainer::new(StubWorkload::new(), train, valid)
}

fn record_all(trainer: &mut StubTrainer, log: &Log) {
    for kind in [
        EventKind::TrainingStarted,
        EventKind::TrainingIterationCompleted,
        EventKind::ValidationCompleted,
        EventKind::TrainingCompleted,
    ] {
        trainer.add_event_handler(kind, Recorder::new("all", log));
    }
}

#[test]
fn start_and_complete_fire_once_for_any_epoch_count() {
    for epochs in 0..4 {
        let log = new_log();
        let mut t = trainer(batches(&[1.0, 2.0, 3.0]), None);
        record_all(&mut t, &log);
        let summary = t.run(epochs).unwrap();

        let kinds = kinds(&log);
        assert_eq!(kinds.first(), Some(&EventKind::TrainingStarted));
        assert_eq!(kinds.last(), Some(&EventKind::TrainingCompleted));
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::TrainingStarted).count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::TrainingCompleted).count(), 1);

        let iterations: Vec<u64> = log
            .borrow()
            .iter()
            .filter(|s| s.kind == EventKind::TrainingIterationCompleted)
            .map(|s| s.iteration)
            .collect();
        assert_eq!(iterations, (1..=3 * epochs as u64).collect::<Vec<_>>());
        assert_eq!(summary.iterations, 3 * epochs as u64);
        assert_eq!(t.state().phase, Phase::Completed);
    }
}

#[test]
fn zero_epochs_fire_only_lifecycle_events() {
    let log = new_log();
    let mut t = trainer(batches(&[1.0]), Some(batches(&[1.0])));
    record_all(&mut t, &log);
    t.run(0).unwrap();

    assert_eq!(kinds(&log), vec![EventKind::TrainingStarted, EventKind::TrainingCompleted]);
    assert!(t.workload().updates.is_empty());
    assert_eq!(t.workload().validations, 0);
}

#[test]
fn iteration_counter_does_not_reset_between_epochs() {
    let log = new_log();
    let mut t = trainer(batches(&[1.0, 1.0, 1.0]), None);
    t.add_event_handler(EventKind::TrainingIterationCompleted, Recorder::new("it", &log));
    t.run(2).unwrap();

    let seen: Vec<(usize, u64)> = log.borrow().iter().map(|s| (s.epoch, s.iteration)).collect();
    assert_eq!(seen, vec![(1, 1), (1, 2), (1, 3), (2, 4), (2, 5), (2, 6)]);
    assert_eq!(t.state().iteration, 6);
    assert_eq!(t.workload().updates, vec![0, 1, 2, 0, 1, 2]);
}

#[test]
fn validation_fires_per_batch_after_each_epoch() {
    let log = new_log();
    let mut t = trainer(batches(&[1.0, 1.0]), Some(batches(&[0.5, 0.25])));
    record_all(&mut t, &log);
    t.run(2).unwrap();

    use EventKind::*;
    assert_eq!(
        kinds(&log),
        vec![
            TrainingStarted,
            TrainingIterationCompleted,
            TrainingIterationCompleted,
            ValidationCompleted,
            ValidationCompleted,
            TrainingIterationCompleted,
            TrainingIterationCompleted,
            ValidationCompleted,
            ValidationCompleted,
            TrainingCompleted,
        ]
    );
    let validation: Vec<(Option<f64>, bool)> = log
        .borrow()
        .iter()
        .filter(|s| s.kind == ValidationCompleted)
        .map(|s| (s.loss, s.has_batch))
        .collect();
    assert_eq!(validation[0], (Some(0.5), true));
    assert_eq!(validation[1], (Some(0.25), true));
    assert_eq!(t.state().validation_batches, 4);
}

#[test]
fn per_pass_validation_reports_the_mean_once() {
    let log = new_log();
    let mut t = trainer(batches(&[1.0]), Some(batches(&[0.5, 0.25, 0.75])))
        .with_options(RunOptions {
            validation_events: ValidationEvents::PerPass,
            ..RunOptions::default()
        });
    t.add_event_handler(EventKind::ValidationCompleted, Recorder::new("val", &log));
    t.run(2).unwrap();

    let seen = log.borrow();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|s| s.loss == Some(0.5) && !s.has_batch));
    assert_eq!(t.workload().validations, 6);
}

#[test]
fn validation_can_be_disabled() {
    let log = new_log();
    let mut t = trainer(batches(&[1.0]), Some(batches(&[0.5])))
        .with_options(RunOptions {
            validate_every_epoch: false,
            ..RunOptions::default()
        });
    t.add_event_handler(EventKind::ValidationCompleted, Recorder::new("val", &log));
    t.run(3).unwrap();

    assert!(log.borrow().is_empty());
    assert_eq!(t.workload().validations, 0);
}

#[test]
fn hooks_run_in_registration_order() {
    let log = new_log();
    let mut t = trainer(batches(&[1.0, 1.0]), None);
    t.add_event_handler(EventKind::TrainingIterationCompleted, Recorder::new("first", &log))
        .add_event_handler(EventKind::TrainingIterationCompleted, Recorder::new("second", &log));
    t.run(1).unwrap();

    let labels: Vec<&str> = log.borrow().iter().map(|s| s.label).collect();
    assert_eq!(labels, vec!["first", "second", "first", "second"]);
}

#[test]
fn failing_hook_aborts_the_run() {
    let log = new_log();
    let mut t = trainer(batches(&[1.0, 1.0, 1.0, 1.0]), None);
    t.add_event_handler(EventKind::TrainingIterationCompleted, FailingHook { at: 2 });
    t.add_event_handler(EventKind::TrainingCompleted, Recorder::new("done", &log));

    let err = t.run(1).unwrap_err();
    assert!(matches!(
        err,
        TrainerError::Hook {
            hook: "failing",
            event: EventKind::TrainingIterationCompleted,
            ..
        }
    ));
    assert_eq!(t.workload().updates.len(), 2);
    assert!(log.borrow().is_empty());
}

#[test]
fn update_failure_reports_the_iteration() {
    let mut workload = StubWorkload::new();
    workload.fail_update_at = Some(3);
    let mut t: StubTrainer = Trainer::new(workload, batches(&[1.0; 5]), None);

    let err = t.run(1).unwrap_err();
    assert!(matches!(err, TrainerError::Update { iteration: 3, .. }));
    assert_eq!(t.state().iteration, 2);
}

#[test]
fn non_finite_loss_aborts_by_default() {
    let mut t = trainer(batches(&[1.0, f64::NAN, 1.0]), None);
    let err = t.run(1).unwrap_err();
    assert!(matches!(err, TrainerError::NonFiniteLoss { iteration: 2, .. }));
}

#[test]
fn non_finite_loss_can_be_tolerated() {
    let mut t = trainer(batches(&[1.0, f64::INFINITY, 1.0]), Some(batches(&[f64::NAN])))
        .with_options(RunOptions {
            non_finite_loss: NonFinitePolicy::Warn,
            ..RunOptions::default()
        });
    let summary = t.run(1).unwrap();
    assert_eq!(summary.iterations, 3);
}

#[test]
fn a_trainer_runs_only_once() {
    let mut t = trainer(batches(&[1.0]), None);
    t.run(1).unwrap();
    assert!(matches!(t.run(1), Err(TrainerError::AlreadyRun)));
}

#[test]
fn learning_rate_decays_per_update_only() {
    let workload = StubWorkload::with_schedule(StepDecay::new(1.0, 2, 0.1));
    let mut t: StubTrainer = Trainer::new(workload, batches(&[1.0; 4]), Some(batches(&[1.0; 3])));
    let summary = t.run(1).unwrap();

    assert!((summary.learning_rate - 0.01).abs() < 1e-12);
    assert!((t.state().learning_rate - 0.01).abs() < 1e-12);
    assert_eq!(t.workload().schedule.steps(), 4);
}

#[test]
fn validation_leaves_parameters_untouched() {
    let mut t = trainer(Vec::new(), Some(batches(&[0.3, 0.3])));
    let before = t.workload().params.clone();
    t.run(2).unwrap();

    assert_eq!(t.workload().params, before);
    assert_eq!(t.workload().validations, 4);
}
