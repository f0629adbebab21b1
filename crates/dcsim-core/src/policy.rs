//! Policy abstraction for action selection

use crate::{Action, Observation, Result};

/// Core policy trait for selecting actions.
///
/// Controllers with internal memory (integrators, previous errors) take
/// `&mut self`; `reset` clears that memory between episodes.
pub trait Policy: Send {
    /// Observation type
    type Observation: Observation;
    /// Action type
    type Action: Action;

    /// Select an action given an observation
    fn act(&mut self, observation: &Self::Observation) -> Result<Self::Action>;

    /// Clear per-episode memory
    fn reset(&mut self) {}

    /// Short identifier used in reports
    fn name(&self) -> &str;
}

impl<P> Policy for Box<P>
where
    P: Policy + ?Sized,
{
    type Observation = P::Observation;
    type Action = P::Action;

    fn act(&mut self, observation: &Self::Observation) -> Result<Self::Action> {
        (**self).act(observation)
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
