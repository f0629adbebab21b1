// Baseline controllers evaluated end to end on full presets.

use dcsim_agent::{
    evaluate_seeds, BaselineKind, Comparison, ConstantPolicy, EvaluationRunner, ParallelOptions,
    PidBaseline,
};
use dcsim_env::{preset, DataCenterEnv, TerminationReason};

/// Test: the PID baseline keeps the default data center out of the critical zone.
#[test]
fn test_pid_keeps_default_preset_safe() {
    let runner = EvaluationRunner::new();
    for seed in [1, 2, 3] {
        let mut env = DataCenterEnv::new(preset("default").unwrap()).unwrap();
        let mut pid = PidBaseline::new(env.observation_layout());
        let m = runner.run_episode(&mut env, &mut pid, seed).unwrap();

        assert_eq!(m.termination, Some(TerminationReason::EpisodeLength), "seed {seed}");
        assert_eq!(m.safety_violations, 0, "seed {seed}");
        assert!(m.max_temperature < 60.0);
        assert!(m.average_setpoint >= 0.2 && m.average_setpoint <= 1.0);
        assert!(m.average_health > 0.0 && m.average_health <= 1.0);
    }
}

/// Test: switching cooling off at high load is caught as a failure.
#[test]
fn test_cooling_off_fails_under_load() {
    let mut config = preset("default").unwrap();
    config.workload.min_initial_load = 0.9;
    config.workload.max_initial_load = 1.0;
    let mut env = DataCenterEnv::new(config).unwrap();
    let mut off = ConstantPolicy::new(1, 0.0);
    let m = EvaluationRunner::new().run_episode(&mut env, &mut off, 42).unwrap();

    assert!(m.failed());
    assert!(m.steps < 1000);
}

/// Test: the comparison of two controllers over the same seeds is consistent
/// with the per-controller reports.
#[tokio::test]
async fn test_comparison_over_shared_seeds() {
    let config = preset("default").unwrap();
    let seeds = [10, 11];
    let options = ParallelOptions {
        max_steps: Some(300),
        ..ParallelOptions::default()
    };

    let pid = evaluate_seeds(&config, &seeds, options, |layout, seed| {
        BaselineKind::Pid.build(layout, seed, 0.0)
    })
    .await
    .unwrap();
    let full = evaluate_seeds(&config, &seeds, options, |layout, seed| {
        BaselineKind::Constant.build(layout, seed, 1.0)
    })
    .await
    .unwrap();

    let comparison = Comparison::between(&full.report, &pid.report);
    assert_eq!(comparison.baseline, "constant-1.00");
    assert_eq!(comparison.candidate, "pid");
    let expected = (full.report.mean_energy_kwh - pid.report.mean_energy_kwh)
        / full.report.mean_energy_kwh
        * 100.0;
    assert!((comparison.energy_savings_pct - expected).abs() < 1e-9);
    assert!(pid.report.episodes.iter().all(|m| m.steps == 300));
    assert!(pid.report.episodes.iter().all(|m| m.average_setpoint < 1.0));
}

/// Test: captured step logs written to disk read back as one JSON object per
/// step, tagged with their seed.
#[tokio::test]
async fn test_step_log_written_to_file() {
    use std::io::Write;

    let config = preset("default").unwrap();
    let options = ParallelOptions {
        max_steps: Some(25),
        capture_log: true,
        ..ParallelOptions::default()
    };
    let run = evaluate_seeds(&config, &[10, 11], options, |layout, seed| {
        BaselineKind::Pid.build(layout, seed, 0.0)
    })
    .await
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("steps.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    for log in &run.logs {
        file.write_all(log).unwrap();
    }
    drop(file);

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> =
        text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 50);
    assert!(lines.iter().all(|v| v["kind"] == "step"));
    assert!(lines[..25].iter().all(|v| v["seed"] == 10));
    assert!(lines[25..].iter().all(|v| v["seed"] == 11));
    assert_eq!(lines[24]["step"], 25);
}
