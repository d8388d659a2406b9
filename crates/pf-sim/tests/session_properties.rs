//! Properties that must hold for every simulated session

use pf_sim::{
    BatchConfig, BoundaryPolicy, MachineSpec, MachineSpecBuilder, PlayConditions, SessionResult,
    StreakResolution, TriggerOrigin, run_batch, session_rng, simulate_session,
};

const SEED: u64 = 0x5eed;

fn machines() -> Vec<MachineSpec> {
    vec![
        MachineSpec::classic(),
        MachineSpec::charge(),
        MachineSpec::builder("Rotation LT")
            .hit_prob(1.0 / 99.9)
            .st_hit_prob(1.0 / 40.0)
            .streak_resolution(StreakResolution::Rotation)
            .st_spins(60)
            .bonus(0.6, 1000, true)
            .bonus(0.4, 300, false)
            .continuation(0.7, 1000)
            .continuation(0.3, 3000)
            .time_reduced(50, 100)
            .lt_end_payout(200)
            .charge(0.002, 300, 0.05)
            .build()
            .unwrap(),
    ]
}

fn sessions(spec: &MachineSpec, conditions: PlayConditions, n: usize) -> Vec<SessionResult> {
    (0..n as u64)
        .map(|i| simulate_session(spec, conditions, &mut session_rng(SEED, i)).unwrap())
        .collect()
}

#[test]
fn accounting_is_consistent() {
    for spec in machines() {
        for boundary in [BoundaryPolicy::NearMiss, BoundaryPolicy::TrailingDraw] {
            let conditions = PlayConditions::new(1500, 18.0).with_boundary(boundary);

            for result in sessions(&spec, conditions, 300) {
                assert!(result.investment >= 0.0);
                assert!(result.rotations_used <= conditions.total_rotations);

                assert_eq!(result.chain_lengths.len(), result.total_hits as usize);
                assert_eq!(result.trigger_rotations.len(), result.total_hits as usize);
                assert_eq!(result.episodes.len(), result.total_hits as usize);
                assert_eq!(
                    result.max_chain,
                    result.chain_lengths.iter().copied().max().unwrap_or(0)
                );

                let continuations: u32 = result.chain_lengths.iter().map(|c| c - 1).sum();
                assert_eq!(continuations as usize, result.continuation_count());

                // Payout = episodes + charge payouts that did not run away
                let runaways = result
                    .episodes
                    .iter()
                    .filter(|e| e.is_charge_runaway())
                    .count() as u64;
                let standalone_charge =
                    (result.charge_count as u64 - runaways) * spec.charge_payout() as u64;
                assert_eq!(result.total_payout, result.episode_payout() + standalone_charge);

                let expected = (result.total_payout as f64 - result.investment)
                    * conditions.currency_per_ball;
                assert!((result.profit - expected).abs() < 1e-6);
            }
        }
    }
}

#[test]
fn seeded_sessions_replay() {
    for spec in machines() {
        let conditions = PlayConditions::new(2000, 18.0);
        assert_eq!(sessions(&spec, conditions, 50), sessions(&spec, conditions, 50));
    }
}

#[test]
fn certain_hit_triggers_on_first_rotation() {
    let spec = MachineSpec::builder("Always")
        .hit_prob(1.0)
        .bonus(1.0, 450, true)
        .continuation(1.0, 1500)
        .st_continue_rate(0.5)
        .build()
        .unwrap();

    for result in sessions(&spec, PlayConditions::new(200, 18.0), 20) {
        assert!(result.total_hits > 0);
        assert_eq!(result.first_hit_rotation, 1);
        for episode in &result.episodes {
            assert_eq!(episode.origin, TriggerOrigin::Normal);
            assert_eq!(episode.trigger_rotation, 1);
        }
    }
}

#[test]
fn zero_continue_rate_gives_single_hits() {
    let spec = MachineSpec::builder("No streak")
        .hit_prob(1.0 / 50.0)
        .bonus(1.0, 450, true)
        .continuation(1.0, 1500)
        .st_continue_rate(0.0)
        .build()
        .unwrap();

    for result in sessions(&spec, PlayConditions::new(2000, 18.0), 100) {
        assert!(result.chain_lengths.iter().all(|&c| c == 1));
        assert!(result.max_chain <= 1);
    }
}

#[test]
fn no_reserved_chances_means_no_reserved_episodes() {
    let spec = MachineSpec::builder("No reserve")
        .hit_prob(1.0 / 80.0)
        .bonus(0.5, 450, true)
        .bonus(0.5, 450, false)
        .continuation(1.0, 1500)
        .reserved(0, 1.0)
        .build()
        .unwrap();

    for result in sessions(&spec, PlayConditions::new(2000, 18.0), 200) {
        assert!(result.episodes.iter().all(|e| !e.is_reserved_hit()));
    }
}

#[test]
fn disabled_charge_matches_plain_machine() {
    let plain = MachineSpec::classic();
    let zero_charge = MachineSpecBuilder::from(&plain)
        .charge(0.0, 9999, 0.5)
        .build()
        .unwrap();

    let conditions = PlayConditions::new(2000, 18.0);
    let a = sessions(&plain, conditions, 100);
    let b = sessions(&zero_charge, conditions, 100);

    assert_eq!(a, b);
    assert!(b.iter().all(|r| r.charge_count == 0));
    assert!(b.iter().flat_map(|r| &r.episodes).all(|e| !e.is_charge_hit()));
}

#[test]
fn batch_matches_individual_sessions() {
    let spec = MachineSpec::charge();
    let conditions = PlayConditions::new(1000, 18.0);
    let batch = run_batch(
        &spec,
        conditions,
        BatchConfig::default()
            .with_sessions(40)
            .with_seed(SEED)
            .with_threads(3),
    )
    .unwrap();

    assert_eq!(batch.sessions, sessions(&spec, conditions, 40));
}

#[test]
fn better_rotation_rate_earns_more() {
    let spec = MachineSpec::classic();
    let config = || {
        BatchConfig::default()
            .with_sessions(4000)
            .with_seed(SEED)
            .with_threads(4)
    };

    let poor = run_batch(&spec, PlayConditions::new(2000, 14.0), config()).unwrap();
    let good = run_batch(&spec, PlayConditions::new(2000, 22.0), config()).unwrap();

    let mean = |r: &[SessionResult]| r.iter().map(|s| s.profit).sum::<f64>() / r.len() as f64;
    // Same streams, lower cost per rotation: every session gains
    assert!(mean(&good.sessions) > mean(&poor.sessions));
}
