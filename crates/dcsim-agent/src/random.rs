//! Random policy for baseline comparisons

use dcsim_core::{ActionSpace, BoxActionSpace, ContinuousAction, Policy, Result, VectorObservation};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Policy that samples setpoints uniformly from the action space.
///
/// Sampling is seeded; [`Policy::reset`] rewinds the stream so every
/// episode sees the same sequence.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    action_space: BoxActionSpace,
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    /// Create a new random policy over `action_space`
    #[must_use]
    pub fn new(action_space: BoxActionSpace, seed: u64) -> Self {
        Self {
            action_space,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Random policy over the unit box of `dim` setpoints
    #[must_use]
    pub fn unit(dim: usize, seed: u64) -> Self {
        Self::new(BoxActionSpace::unit(dim), seed)
    }
}

impl Policy for RandomPolicy {
    type Observation = VectorObservation;
    type Action = ContinuousAction;

    fn act(&mut self, _observation: &Self::Observation) -> Result<Self::Action> {
        Ok(self.action_space.sample(&mut self.rng))
    }

    fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }

    fn name(&self) -> &str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_stay_in_space() {
        let mut policy = RandomPolicy::unit(4, 3);
        let space = BoxActionSpace::unit(4);
        let obs = VectorObservation::new(vec![]);
        for _ in 0..100 {
            assert!(space.contains(&policy.act(&obs).unwrap()));
        }
    }

    #[test]
    fn test_reset_replays_the_stream() {
        let mut policy = RandomPolicy::unit(2, 9);
        let obs = VectorObservation::new(vec![]);
        let first: Vec<_> = (0..5).map(|_| policy.act(&obs).unwrap()).collect();
        policy.reset();
        let second: Vec<_> = (0..5).map(|_| policy.act(&obs).unwrap()).collect();
        assert_eq!(first, second);
    }
}
