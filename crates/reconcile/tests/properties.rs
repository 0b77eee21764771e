//! Cross-model equivalence over generated and scripted scenarios.

use num_traits::Zero;
use proptest::prelude::*;

use farmpool_common::{
    solve_decay_schedule, DecaySchedule, EpochOutcome, Event, EventKind, FarmConfig, SCALE,
};
use farmpool_reconcile::{
    generate_events, replay, FarmModel, ScenarioParams, Tolerance,
};
use farmpool_ledger::RewardLedger;
use farmpool_reference::ReferenceFarm;

const DAY: u64 = 86_400;

/// A decaying schedule solved from a target, like production configures.
fn solved_config() -> FarmConfig {
    let total = 100_000 * SCALE;
    let schedule = solve_decay_schedule(total, 100 * DAY, 50_000 * SCALE, 25 * DAY, DAY)
        .expect("target is satisfiable");
    FarmConfig::new(total, 100 * DAY, schedule)
}

fn flat_config() -> FarmConfig {
    FarmConfig::new(
        100_000 * SCALE,
        100 * DAY,
        DecaySchedule {
            rate_per_sec: 100_000 * SCALE / (100 * DAY) as u128,
            decay_factor: SCALE,
            decay_period_secs: 100 * DAY,
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn generated_scenarios_reconcile(seed in any::<u64>()) {
        let params = ScenarioParams {
            epochs: 12,
            ..ScenarioParams::default()
        };
        let events = generate_events(seed, &params);
        let report = replay(solved_config(), 0, &events, &Tolerance::nano_token());
        prop_assert!(report.is_clean(), "seed {}: {:?}", seed, report);
    }

    #[test]
    fn settled_accounts_track_the_pool_totals(seed in any::<u64>()) {
        // Summed settled accounts may drift from the exact totals only by
        // per-account rounding dust.
        let params = ScenarioParams {
            epochs: 10,
            ..ScenarioParams::default()
        };
        let events = generate_events(seed, &params);
        let mut ledger = RewardLedger::new(flat_config(), 0);
        let mut reference = ReferenceFarm::new(flat_config(), 0);
        for event in &events {
            let _ = FarmModel::apply(&mut ledger, event);
            let _ = FarmModel::apply(&mut reference, event);
        }
        let fixed = ledger.terminal_state();
        let exact = reference.terminal_state();
        let held: num_rational::BigRational =
            fixed.users.values().map(|u| u.principal.clone()).sum();
        let slack = num_rational::BigRational::from_integer((SCALE / 1_000_000_000).into());
        let drift = held - fixed.total_deposited.clone();
        prop_assert!(num_traits::Signed::abs(&drift) <= slack, "drift {}", drift);
        // The exact model conserves principal identically by construction.
        let exact_held: num_rational::BigRational =
            exact.users.values().map(|u| u.principal.clone()).sum();
        prop_assert_eq!(exact_held, exact.total_deposited);
    }
}

#[test]
fn total_loss_and_restart_reconcile() {
    let events = vec![
        Event::new(0, EventKind::Deposit { user: 1, amount: 500 * SCALE }),
        Event::new(DAY, EventKind::NewEpoch { outcome: EpochOutcome::NEUTRAL }),
        // The doomed epoch: user 2's deposit arrives while the pool burns.
        Event::new(DAY + 100, EventKind::Deposit { user: 2, amount: 200 * SCALE }),
        Event::new(
            2 * DAY,
            EventKind::NewEpoch {
                outcome: EpochOutcome::Multipliers {
                    profit_factor: 0,
                    survival_factor: 0,
                },
            },
        ),
        // Fresh era: the wiped user re-enters.
        Event::new(2 * DAY + 10, EventKind::Deposit { user: 1, amount: 100 * SCALE }),
        Event::new(3 * DAY, EventKind::NewEpoch { outcome: EpochOutcome::NEUTRAL }),
        Event::new(
            4 * DAY,
            EventKind::NewEpoch {
                outcome: EpochOutcome::Multipliers {
                    profit_factor: SCALE + SCALE / 100,
                    survival_factor: SCALE,
                },
            },
        ),
        Event::new(4 * DAY + 10, EventKind::Claim { user: 2 }),
    ];
    let report = replay(solved_config(), 0, &events, &Tolerance::nano_token());
    assert!(report.is_clean(), "{:?}", report);
}

#[test]
fn emergency_cycle_reconciles() {
    let events = vec![
        Event::new(0, EventKind::Deposit { user: 1, amount: 1_000 * SCALE }),
        Event::new(10, EventKind::Deposit { user: 2, amount: 4_000 * SCALE }),
        Event::new(DAY, EventKind::NewEpoch { outcome: EpochOutcome::NEUTRAL }),
        Event::new(
            2 * DAY,
            EventKind::EmergencyWithdraw {
                outcome: EpochOutcome::Multipliers {
                    profit_factor: SCALE,
                    survival_factor: SCALE - SCALE / 50,
                },
            },
        ),
        // One user flees during the suspension, one rides it out.
        Event::new(2 * DAY + 100, EventKind::Withdraw { user: 1 }),
        Event::new(2 * DAY + 500, EventKind::EmergencyRecover),
        Event::new(3 * DAY, EventKind::NewEpoch { outcome: EpochOutcome::NEUTRAL }),
        Event::new(3 * DAY + 10, EventKind::Unstake { user: 2 }),
        Event::new(4 * DAY, EventKind::NewEpoch { outcome: EpochOutcome::NEUTRAL }),
        Event::new(4 * DAY + 10, EventKind::Withdraw { user: 2 }),
        Event::new(4 * DAY + 20, EventKind::Claim { user: 2 }),
    ];
    let report = replay(solved_config(), 0, &events, &Tolerance::nano_token());
    assert!(report.is_clean(), "{:?}", report);
}

#[test]
fn ledger_never_pays_more_than_a_token_over_exact() {
    // Per-event payouts stay within tolerance of the exact model in both
    // directions; spot-check the cumulative payout totals as well.
    let events = generate_events(27, &ScenarioParams::default());
    let mut ledger = RewardLedger::new(solved_config(), 0);
    let mut reference = ReferenceFarm::new(solved_config(), 0);
    let tolerance = Tolerance::nano_token();
    let report =
        farmpool_reconcile::replay_into(&mut ledger, &mut reference, &events, &tolerance);
    assert!(report.is_clean(), "{:?}", report);
    assert!(!ledger.paid_principal().is_empty());
    for (user, paid) in ledger.paid_principal() {
        let exact = reference
            .paid_principal()
            .get(user)
            .cloned()
            .unwrap_or_else(num_rational::BigRational::zero);
        let diff = farmpool_reconcile::diff_units(*paid, &exact);
        assert!(diff.abs() < SCALE as i128, "user {user}: {diff}");
    }
}
