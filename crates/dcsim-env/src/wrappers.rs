//! Environment wrappers for common transformations

use dcsim_core::{ActionSpace, Environment, ObservationSpace, Result, Reward, Step};

/// Wrapper that modifies rewards
pub struct RewardWrapper<E, F> {
    /// Inner environment
    pub env: E,
    /// Reward transformation function
    pub reward_fn: F,
}

impl<E, F> RewardWrapper<E, F> {
    /// Wrap `env`, passing every reward through `reward_fn`
    pub fn new(env: E, reward_fn: F) -> Self {
        Self { env, reward_fn }
    }
}

impl<E, F> Environment for RewardWrapper<E, F>
where
    E: Environment,
    F: Fn(Reward, &E::Info) -> Reward + Send,
{
    type Observation = E::Observation;
    type Action = E::Action;
    type Info = E::Info;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        self.env.observation_space()
    }

    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>> {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<Self::Observation> {
        self.env.reset(seed)
    }

    fn step(&mut self, action: &Self::Action) -> Result<Step<Self::Observation, Self::Info>> {
        let mut step = self.env.step(action)?;
        step.reward = (self.reward_fn)(step.reward, &step.info);
        Ok(step)
    }

    fn close(&mut self) -> Result<()> {
        self.env.close()
    }
}

/// Truncates episodes after a fixed number of steps
pub struct TimeLimit<E> {
    /// Inner environment
    pub env: E,
    /// Maximum steps
    pub max_steps: u64,
    /// Current step count
    pub steps: u64,
}

impl<E> TimeLimit<E> {
    /// Create a new time limit wrapper
    pub fn new(env: E, max_steps: u64) -> Self {
        Self {
            env,
            max_steps,
            steps: 0,
        }
    }
}

impl<E> Environment for TimeLimit<E>
where
    E: Environment,
{
    type Observation = E::Observation;
    type Action = E::Action;
    type Info = E::Info;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        self.env.observation_space()
    }

    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>> {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<Self::Observation> {
        self.steps = 0;
        self.env.reset(seed)
    }

    fn step(&mut self, action: &Self::Action) -> Result<Step<Self::Observation, Self::Info>> {
        self.steps += 1;
        let mut step = self.env.step(action)?;

        if self.steps >= self.max_steps && !step.is_done() {
            step.truncated = true;
        }

        Ok(step)
    }

    fn close(&mut self) -> Result<()> {
        self.env.close()
    }
}
