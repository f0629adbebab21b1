//! Example: random setpoints against the PID baseline on the default preset

use dcsim_agent::{PidBaseline, RandomPolicy};
use dcsim_core::{Policy, TrackedEnvironment};
use dcsim_env::{make_env, ContinuousAction, Environment, TimeLimit, VectorObservation};

fn play<P>(name: &str, policy: &mut P, episodes: u64) -> Result<(), Box<dyn std::error::Error>>
where
    P: Policy<Observation = VectorObservation, Action = ContinuousAction>,
{
    let env = TimeLimit::new(make_env("default")?, 500);
    let mut env = TrackedEnvironment::new(env);

    let mut episode_rewards = Vec::new();
    for seed in 0..episodes {
        policy.reset();
        let mut observation = env.reset(Some(seed))?;
        let mut total_reward = 0.0;
        let mut steps = 0;

        loop {
            let action = policy.act(&observation)?;
            let step = env.step(&action)?;
            total_reward += step.reward.value();
            steps += 1;

            if step.terminated || step.truncated {
                let id = env.episode_info().map(|e| e.id).unwrap_or_default();
                println!(
                    "{name} seed {seed} [{id}]: reward = {total_reward:.2}, steps = {steps}, \
                     max T = {:.1} °C, zone = {}",
                    step.info.max_temperature, step.info.zone
                );
                break;
            }
            observation = step.observation;
        }
        episode_rewards.push(total_reward);
    }

    #[allow(clippy::cast_precision_loss)]
    let avg_reward = episode_rewards.iter().sum::<f64>() / episode_rewards.len() as f64;
    println!("{name}: average reward over {episodes} episodes = {avg_reward:.2}\n");

    env.close()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let layout = make_env("default")?.observation_layout();
    play("random", &mut RandomPolicy::unit(layout.action_dim, 7), 5)?;
    play("pid", &mut PidBaseline::new(layout), 5)?;
    Ok(())
}
