//! Recorded episode trajectories

use serde::{Deserialize, Serialize};

use crate::Reward;

/// Single transition in a trajectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition<O, A, I> {
    /// Observation the action was chosen from
    pub observation: O,
    /// Action taken
    pub action: A,
    /// Reward received
    pub reward: Reward,
    /// Next observation
    pub next_observation: O,
    /// Whether the episode terminated on this transition
    pub terminated: bool,
    /// Whether the episode was truncated on this transition
    pub truncated: bool,
    /// Diagnostic info returned with the step
    pub info: I,
}

impl<O, A, I> Transition<O, A, I> {
    /// Whether this transition closed the episode
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Complete trajectory of an episode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory<O, A, I> {
    /// Sequence of transitions
    pub transitions: Vec<Transition<O, A, I>>,
    /// Total reward
    pub total_reward: f64,
    /// Seed the episode was reset with
    pub seed: u64,
}

impl<O, A, I> Trajectory<O, A, I> {
    /// Create a new empty trajectory
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            transitions: Vec::new(),
            total_reward: 0.0,
            seed,
        }
    }

    /// Add a transition to the trajectory
    pub fn push(&mut self, transition: Transition<O, A, I>) {
        self.total_reward += transition.reward.0;
        self.transitions.push(transition);
    }

    /// Get the length of the trajectory
    #[must_use]
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Check if trajectory is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Per-step rewards
    pub fn rewards(&self) -> impl Iterator<Item = f64> + '_ {
        self.transitions.iter().map(|t| t.reward.0)
    }

    /// Compute returns (cumulative discounted rewards)
    #[must_use]
    pub fn returns(&self, gamma: f64) -> Vec<f64> {
        let mut returns = vec![0.0; self.len()];
        let mut running_return = 0.0;

        for i in (0..self.len()).rev() {
            if self.transitions[i].is_done() {
                running_return = 0.0;
            }
            running_return = self.transitions[i].reward.0 + gamma * running_return;
            returns[i] = running_return;
        }

        returns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn transition(reward: f64, done: bool) -> Transition<u8, u8, ()> {
        Transition {
            observation: 0,
            action: 0,
            reward: Reward(reward),
            next_observation: 0,
            terminated: done,
            truncated: false,
            info: (),
        }
    }

    #[test]
    fn test_push_accumulates_total_reward() {
        let mut traj = Trajectory::new(1);
        traj.push(transition(1.5, false));
        traj.push(transition(-0.5, true));
        assert_eq!(traj.len(), 2);
        assert_relative_eq!(traj.total_reward, 1.0);
    }

    #[test]
    fn test_returns_discount_backwards() {
        let mut traj = Trajectory::new(1);
        traj.push(transition(1.0, false));
        traj.push(transition(1.0, false));
        traj.push(transition(1.0, true));
        let returns = traj.returns(0.5);
        assert_relative_eq!(returns[2], 1.0);
        assert_relative_eq!(returns[1], 1.5);
        assert_relative_eq!(returns[0], 1.75);
    }
}
