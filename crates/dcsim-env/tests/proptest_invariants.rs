// Property tests over arbitrary action sequences, including out-of-range
// and infinite setpoints.

use proptest::prelude::*;

use dcsim_env::{
    ContinuousAction, CoolingMode, DataCenterEnv, Environment, ObservationSpace, SimConfig, Zone,
};

fn setpoint() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => -0.5f64..1.5,
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
    ]
}

fn config(mode: CoolingMode) -> SimConfig {
    let mut config = SimConfig::default();
    config.topology.num_racks = 2;
    config.topology.servers_per_rack = 3;
    config.cooling.mode = mode;
    config.episode.episode_length = 60;
    config
}

fn mode() -> impl Strategy<Value = CoolingMode> {
    prop_oneof![
        Just(CoolingMode::Air),
        Just(CoolingMode::Liquid),
        Just(CoolingMode::Hybrid),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_observations_and_physics_stay_valid(
        mode in mode(),
        seed in any::<u64>(),
        raw in prop::collection::vec(setpoint(), 60 * 4),
    ) {
        let config = config(mode);
        let dim = config.action_dim();
        let ambient = config.physics.ambient_temp;
        let mut env = DataCenterEnv::new(config).unwrap();
        let space = env.observation_space();
        let obs = env.reset(Some(seed)).unwrap();
        prop_assert!(space.contains(&obs));

        for chunk in raw.chunks(4).take(60) {
            let action = ContinuousAction(chunk[..dim].to_vec());
            let step = env.step(&action).unwrap();

            prop_assert!(space.contains(&step.observation));
            prop_assert!(step.reward.value().is_finite());
            prop_assert!(step.info.fault.is_none());
            prop_assert!(step.info.power.total().is_finite());
            for t in env.raw_state().temperatures {
                prop_assert!(t.is_finite());
                prop_assert!(t >= ambient - 5.0 && t <= ambient + 150.0);
            }
            prop_assert_eq!(step.terminated, step.info.zone == Zone::Catastrophic);
            if step.is_done() {
                break;
            }
        }
    }

    #[test]
    fn prop_clipping_counts_components_outside_unit_box(
        raw in prop::collection::vec(setpoint(), 2),
    ) {
        let mut env = DataCenterEnv::new(config(CoolingMode::Air)).unwrap();
        env.reset(Some(1)).unwrap();
        let expected = raw.iter().filter(|x| !(0.0..=1.0).contains(*x)).count();
        let step = env.step(&ContinuousAction(raw)).unwrap();
        prop_assert_eq!(step.info.clipped_components, expected);
    }

    #[test]
    fn prop_nan_component_is_rejected(position in 0usize..2) {
        let mut env = DataCenterEnv::new(config(CoolingMode::Air)).unwrap();
        env.reset(Some(1)).unwrap();
        let mut values = vec![0.5, 0.5];
        values[position] = f64::NAN;
        let rejected = env.step(&ContinuousAction(values)).is_err();
        prop_assert!(rejected);
        prop_assert_eq!(env.episode_state().unwrap().step, 0);
    }
}
