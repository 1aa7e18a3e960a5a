use serde::{Deserialize, Serialize};

/// Learning rate used by the filter learner at each iteration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LearningRateSchedule {
    /// Constant learning rate
    Constant { lr: f32 },

    /// Inverse square root decay: lr = initial_lr / sqrt(iteration)
    InverseSqrt { initial_lr: f32 },

    /// Step decay: lr = initial_lr * decay_rate^(iteration / step_size)
    StepDecay {
        initial_lr: f32,
        decay_rate: f32,
        step_size: usize,
    },

    /// Exponential decay: lr = initial_lr * decay_rate^iteration
    ExponentialDecay {
        initial_lr: f32,
        decay_rate: f32,
    },
}

impl Default for LearningRateSchedule {
    fn default() -> Self {
        LearningRateSchedule::InverseSqrt { initial_lr: 0.01 }
    }
}

impl LearningRateSchedule {
    /// Learning rate for a 1-based iteration number
    pub fn get_lr(&self, iteration: usize) -> f32 {
        let iteration = iteration.max(1);
        match self {
            LearningRateSchedule::Constant { lr } => *lr,

            LearningRateSchedule::InverseSqrt { initial_lr } => {
                initial_lr / (iteration as f32).sqrt()
            }

            LearningRateSchedule::StepDecay { initial_lr, decay_rate, step_size } => {
                let num_decays = ((iteration - 1) / (*step_size).max(1)) as f32;
                initial_lr * decay_rate.powf(num_decays)
            }

            LearningRateSchedule::ExponentialDecay { initial_lr, decay_rate } => {
                initial_lr * decay_rate.powf((iteration - 1) as f32)
            }
        }
    }

    /// Rate at the first iteration
    pub fn initial_lr(&self) -> f32 {
        self.get_lr(1)
    }

    /// The same starting rate without decay
    pub fn fixed(&self) -> Self {
        LearningRateSchedule::Constant { lr: self.initial_lr() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_sqrt_decay() {
        let schedule = LearningRateSchedule::InverseSqrt { initial_lr: 0.1 };
        assert!((schedule.get_lr(1) - 0.1).abs() < 1e-7);
        assert!((schedule.get_lr(4) - 0.05).abs() < 1e-7);
        assert!((schedule.get_lr(0) - 0.1).abs() < 1e-7);
    }

    #[test]
    fn test_step_and_exponential_decay() {
        let step = LearningRateSchedule::StepDecay { initial_lr: 1.0, decay_rate: 0.5, step_size: 10 };
        assert_eq!(step.get_lr(10), 1.0);
        assert_eq!(step.get_lr(11), 0.5);

        let exp = LearningRateSchedule::ExponentialDecay { initial_lr: 1.0, decay_rate: 0.5 };
        assert_eq!(exp.get_lr(3), 0.25);
    }

    #[test]
    fn test_fixed_keeps_initial_rate() {
        let schedule = LearningRateSchedule::InverseSqrt { initial_lr: 0.2 }.fixed();
        assert_eq!(schedule, LearningRateSchedule::Constant { lr: 0.2 });
        assert_eq!(schedule.get_lr(100), 0.2);
    }
}
