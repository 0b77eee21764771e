//! Seeded random scenario generation.
//!
//! Builds multi-epoch event logs shaped like production traffic: bursty
//! deposits of uneven size, lazy unstakes a few epochs out, occasional
//! claims, epoch closes with small profits and occasional losses, and a
//! rare emergency cycle. Fully deterministic per seed so a failing
//! scenario replays exactly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use farmpool_common::{EpochOutcome, Event, EventKind, UserId, SCALE};

#[derive(Debug, Clone, Copy)]
pub struct ScenarioParams {
    pub epochs: u32,
    /// Mean epoch length in seconds; actual lengths jitter around it.
    pub epoch_secs: u64,
    /// Upper bound on deposits per epoch.
    pub deposits_per_epoch: u32,
    /// Largest single deposit, in whole tokens.
    pub max_deposit_tokens: u64,
    /// Probability an epoch ends in an emergency cycle, per mille.
    pub emergency_per_mille: u32,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        ScenarioParams {
            epochs: 30,
            epoch_secs: 86_400,
            deposits_per_epoch: 4,
            max_deposit_tokens: 10_000,
            emergency_per_mille: 10,
        }
    }
}

/// Generate a deterministic event log for `seed`.
pub fn generate_events(seed: u64, params: &ScenarioParams) -> Vec<Event> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut events = Vec::new();
    let mut now = 0u64;
    let mut next_user: UserId = 0;
    // Users believed to hold settled stake, and those with a pending
    // unstake whose withdrawal is due.
    let mut staked_users: Vec<UserId> = Vec::new();
    let mut unstaking_users: Vec<UserId> = Vec::new();
    let mut pending_users: Vec<UserId> = Vec::new();

    for _ in 0..params.epochs {
        let jitter = params.epoch_secs / 8;
        let epoch_len = params.epoch_secs - jitter + rng.gen_range(0..=2 * jitter);
        let epoch_end = now + epoch_len.max(60);

        // Unstakes requested last epoch have settled out; withdraw them.
        for user in unstaking_users.drain(..) {
            let ts = rng.gen_range(now..epoch_end);
            events.push(Event::new(ts, EventKind::Withdraw { user }));
        }

        for user in pending_users.drain(..) {
            staked_users.push(user);
        }

        for _ in 0..rng.gen_range(0..=params.deposits_per_epoch) {
            // Mostly fresh depositors, occasionally a top-up.
            let user = if staked_users.is_empty() || rng.gen_bool(0.9) {
                let user = next_user;
                next_user += 1;
                user
            } else {
                staked_users[rng.gen_range(0..staked_users.len())]
            };
            let tokens = rng.gen_range(1..=params.max_deposit_tokens) as u128;
            let ts = rng.gen_range(now..epoch_end);
            events.push(Event::new(
                ts,
                EventKind::Deposit {
                    user,
                    amount: tokens * SCALE,
                },
            ));
            if !pending_users.contains(&user) && !staked_users.contains(&user) {
                pending_users.push(user);
            }
        }

        // A slice of the staked population heads for the exit.
        let mut i = 0;
        while i < staked_users.len() {
            if rng.gen_bool(0.15) {
                let user = staked_users.swap_remove(i);
                let ts = rng.gen_range(now..epoch_end);
                if rng.gen_bool(0.25) {
                    // Equal factors resolve to a pure loss, which is the
                    // only outcome an exit close accepts.
                    let factor = survival(&mut rng);
                    events.push(Event::new(
                        ts,
                        EventKind::UnstakeAndWithdraw {
                            user,
                            outcome: EpochOutcome::Multipliers {
                                profit_factor: factor,
                                survival_factor: factor,
                            },
                        },
                    ));
                } else {
                    events.push(Event::new(ts, EventKind::Unstake { user }));
                    unstaking_users.push(user);
                }
            } else {
                if rng.gen_bool(0.1) {
                    let ts = rng.gen_range(now..epoch_end);
                    events.push(Event::new(
                        ts,
                        EventKind::Claim {
                            user: staked_users[i],
                        },
                    ));
                }
                i += 1;
            }
        }

        events.sort_by_key(|e| e.timestamp);

        let outcome = EpochOutcome::Multipliers {
            profit_factor: profit(&mut rng),
            survival_factor: survival(&mut rng),
        };
        if rng.gen_range(0..1_000) < params.emergency_per_mille {
            events.push(Event::new(epoch_end, EventKind::EmergencyWithdraw { outcome }));
            let recover_ts = epoch_end + rng.gen_range(60..=epoch_len.max(61));
            events.push(Event::new(recover_ts, EventKind::EmergencyRecover));
            now = recover_ts;
        } else {
            events.push(Event::new(epoch_end, EventKind::NewEpoch { outcome }));
            now = epoch_end;
        }
    }
    events
}

/// Profit factor near one, mildly biased upward, in [0.995, 1.015].
fn profit(rng: &mut StdRng) -> u128 {
    let base = SCALE - SCALE / 200;
    base + rng.gen_range(0..=SCALE / 50)
}

/// Survival factor: usually everything survives, sometimes a loss of up
/// to half the principal. Never a total wipe; reset behavior is covered
/// by scripted scenarios, not random ones.
fn survival(rng: &mut StdRng) -> u128 {
    if rng.gen_bool(0.6) {
        SCALE
    } else {
        SCALE / 2 + rng.gen_range(0..=SCALE / 2)
    }
}
