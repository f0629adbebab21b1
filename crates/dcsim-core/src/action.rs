//! Action representations and action spaces

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::{Result, SimError};

/// Trait for actions accepted by an environment
pub trait Action: Clone + Debug + Send + Sync {
    /// Convert action to a vector representation
    fn to_vec(&self) -> Vec<f64>;
}

/// Trait for defining action spaces
pub trait ActionSpace: Send + Sync {
    /// The type of actions in this space
    type Action: Action;

    /// Sample an action from the space using the caller's generator
    fn sample(&self, rng: &mut dyn RngCore) -> Self::Action;

    /// Check if an action is valid within this space
    fn contains(&self, action: &Self::Action) -> bool;

    /// Get the dimensionality of the action space
    fn dim(&self) -> usize;
}

/// Continuous action: one setpoint per control channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousAction(pub Vec<f64>);

impl ContinuousAction {
    /// Action with every channel at the same value
    #[must_use]
    pub fn splat(dim: usize, value: f64) -> Self {
        Self(vec![value; dim])
    }

    /// Borrow the raw values
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of channels
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the action carries no channels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Action for ContinuousAction {
    fn to_vec(&self) -> Vec<f64> {
        self.0.clone()
    }
}

impl From<Vec<f64>> for ContinuousAction {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Outcome of bringing a raw action inside the space bounds
#[derive(Debug, Clone, PartialEq)]
pub struct Clipped {
    /// Action with every component inside `[low, high]`
    pub action: ContinuousAction,
    /// How many components had to be moved
    pub clipped_components: usize,
}

/// Continuous action space (box)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxActionSpace {
    /// Lower bounds for each dimension
    pub low: Vec<f64>,
    /// Upper bounds for each dimension
    pub high: Vec<f64>,
}

impl BoxActionSpace {
    /// Create a new continuous action space
    pub fn new(low: Vec<f64>, high: Vec<f64>) -> Result<Self> {
        if low.len() != high.len() {
            return Err(SimError::DimensionMismatch {
                expected: low.len(),
                actual: high.len(),
            });
        }
        if low.iter().zip(&high).any(|(l, h)| !(l <= h)) {
            return Err(SimError::config("action space lower bound exceeds upper bound"));
        }
        Ok(Self { low, high })
    }

    /// Unit box `[0, 1]^dim`
    #[must_use]
    pub fn unit(dim: usize) -> Self {
        Self {
            low: vec![0.0; dim],
            high: vec![1.0; dim],
        }
    }

    /// Validate the shape of `action` and clip it into bounds.
    ///
    /// Wrong dimensionality and NaN components are rejected: there is no
    /// meaningful bound to clip a NaN to. Infinities clip to the nearest bound.
    pub fn clip(&self, action: &ContinuousAction) -> Result<Clipped> {
        if action.len() != self.low.len() {
            return Err(SimError::DimensionMismatch {
                expected: self.low.len(),
                actual: action.len(),
            });
        }

        let mut clipped_components = 0;
        let mut values = Vec::with_capacity(action.len());
        for (i, ((&x, &l), &h)) in action.0.iter().zip(&self.low).zip(&self.high).enumerate() {
            if x.is_nan() {
                return Err(SimError::InvalidAction(format!("component {i} is NaN")));
            }
            let c = x.clamp(l, h);
            if c != x {
                clipped_components += 1;
            }
            values.push(c);
        }

        Ok(Clipped {
            action: ContinuousAction(values),
            clipped_components,
        })
    }
}

impl ActionSpace for BoxActionSpace {
    type Action = ContinuousAction;

    fn sample(&self, rng: &mut dyn RngCore) -> Self::Action {
        let values: Vec<f64> = self
            .low
            .iter()
            .zip(&self.high)
            .map(|(l, h)| if l < h { rng.gen_range(*l..=*h) } else { *l })
            .collect();

        ContinuousAction(values)
    }

    fn contains(&self, action: &Self::Action) -> bool {
        action.0.len() == self.low.len()
            && action
                .0
                .iter()
                .zip(&self.low)
                .zip(&self.high)
                .all(|((x, l), h)| x >= l && x <= h)
    }

    fn dim(&self) -> usize {
        self.low.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_clip_counts_out_of_range_components() {
        let space = BoxActionSpace::unit(4);
        let out = space
            .clip(&ContinuousAction(vec![-0.5, 0.3, 1.7, f64::INFINITY]))
            .unwrap();
        assert_eq!(out.action.0, vec![0.0, 0.3, 1.0, 1.0]);
        assert_eq!(out.clipped_components, 3);
    }

    #[test]
    fn test_clip_rejects_wrong_shape() {
        let space = BoxActionSpace::unit(2);
        let err = space.clip(&ContinuousAction(vec![0.5])).unwrap_err();
        assert!(matches!(
            err,
            SimError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_clip_rejects_nan() {
        let space = BoxActionSpace::unit(2);
        let err = space.clip(&ContinuousAction(vec![0.5, f64::NAN])).unwrap_err();
        assert!(matches!(err, SimError::InvalidAction(_)));
    }

    #[test]
    fn test_sample_is_inside_space() {
        let space = BoxActionSpace::unit(8);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(space.contains(&space.sample(&mut rng)));
        }
    }

    #[test]
    fn test_new_rejects_inverted_bounds() {
        assert!(BoxActionSpace::new(vec![1.0], vec![0.0]).is_err());
        assert!(BoxActionSpace::new(vec![0.0, 0.0], vec![1.0]).is_err());
    }
}
