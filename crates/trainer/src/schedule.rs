//! Step decay learning rate policy

/// Multiplies the learning rate by `decay_percent` every `decay_step` steps.
///
/// Formula: lr_t = lr_initial * decay_percent^(floor(t / decay_step))
///
/// `t` is the number of calls to [`StepDecay::step`]; the update function
/// calls it once before each optimizer step, never during validation.
#[derive(Debug, Clone)]
pub struct StepDecay {
    lr_initial: f64,
    decay_step: usize,
    decay_percent: f64,
    steps: usize,
}

impl StepDecay {
    pub fn new(lr_initial: f64, decay_step: usize, decay_percent: f64) -> Self {
        Self {
            lr_initial,
            decay_step,
            decay_percent,
            steps: 0,
        }
    }

    pub fn lr(&self) -> f64 {
        if self.decay_step == 0 {
            return self.lr_initial;
        }
        let num_decays = self.steps / self.decay_step;
        self.lr_initial * self.decay_percent.powi(num_decays as i32)
    }

    /// Advances by one step and returns the learning rate to use for it.
    pub fn step(&mut self) -> f64 {
        self.steps += 1;
        self.lr()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }
}
