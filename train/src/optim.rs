//! The optimizer interface.

use crate::{common::*, config::OptimizerConfig};

/// The parameter update rule driven by the training loop.
///
/// Gradients accumulate until [Optimizer::zero_grad] is called, so the
/// training loop resets them before every backward pass.
pub trait Optimizer {
    /// Clears the gradients of all optimized parameters.
    fn zero_grad(&mut self);

    /// Applies one update using the current gradients.
    fn step(&mut self);
}

impl Optimizer for nn::Optimizer {
    fn zero_grad(&mut self) {
        nn::Optimizer::zero_grad(self)
    }

    fn step(&mut self) {
        nn::Optimizer::step(self)
    }
}

impl OptimizerConfig {
    /// Builds the optimizer over all trainable variables of the var store.
    pub fn build(&self, vs: &nn::VarStore) -> Result<nn::Optimizer> {
        self.validate()?;

        let optimizer = match *self {
            Self::Sgd {
                lr,
                momentum,
                weight_decay,
                nesterov,
            } => nn::Sgd {
                momentum: momentum.raw(),
                dampening: 0.0,
                wd: weight_decay.raw(),
                nesterov,
            }
            .build(vs, lr.raw())?,
            Self::Adam {
                lr,
                beta1,
                beta2,
                weight_decay,
            } => nn::Adam {
                beta1: beta1.raw(),
                beta2: beta2.raw(),
                wd: weight_decay.raw(),
            }
            .build(vs, lr.raw())?,
        };

        Ok(optimizer)
    }
}
