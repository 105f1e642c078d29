//! Action sources that drive a policy-controlled creature

use rand::RngCore;

use crate::motor::random_input;
use crate::observation::Observation;
use crate::types::{ActionVector, JOINT_CAPACITY};

/// Anything that turns an observation into motor commands
pub trait ActionSource {
    fn act(&mut self, observation: &Observation) -> ActionVector;
}

/// Heuristic source: every slot uniform in [-1, 1], ignoring the observation
pub struct RandomActions<R: RngCore> {
    rng: R,
}

impl<R: RngCore> RandomActions<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: RngCore> ActionSource for RandomActions<R> {
    fn act(&mut self, _observation: &Observation) -> ActionVector {
        let mut action = [0.0; JOINT_CAPACITY];
        for value in action.iter_mut() {
            *value = random_input(&mut self.rng);
        }
        action
    }
}

/// Always returns the same action
#[derive(Debug, Clone, Copy)]
pub struct ConstantActions(pub ActionVector);

impl ActionSource for ConstantActions {
    fn act(&mut self, _observation: &Observation) -> ActionVector {
        self.0
    }
}
