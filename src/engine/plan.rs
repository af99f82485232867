//! The allocation planner.
//!
//! Pure given its inputs: the ranked payer list and the collected totals
//! come in from the aggregator, randomness comes in through [`PrizeDraw`].
//! The walk is highest-total-first with a hard stop once the remaining
//! budget drops below the minimum prize; lower-ranked payers past that
//! point receive nothing even when some budget is left.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::Amount;
use crate::collections::{Collected, PayerTotal};
use crate::model::{Msisdn, PlannedWinner, ReleasePlan};

use super::error::Rejection;

/// Source of prize amounts.
///
/// Implementations return a value inside `[lo, hi]`; the bundled ones draw
/// a uniformly distributed whole-unit amount.
pub trait PrizeDraw: Send + Sync {
    fn amount_between(&self, lo: Amount, hi: Amount) -> Amount;
}

/// Production draw over the thread RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformDraw;

impl PrizeDraw for UniformDraw {
    fn amount_between(&self, lo: Amount, hi: Amount) -> Amount {
        draw_units(&mut rand::thread_rng(), lo, hi)
    }
}

/// Deterministic draw for tests, benches and ledger replay.
#[derive(Debug)]
pub struct SeededDraw(Mutex<StdRng>);

impl SeededDraw {
    pub fn new(seed: u64) -> Self {
        Self(Mutex::new(StdRng::seed_from_u64(seed)))
    }
}

impl PrizeDraw for SeededDraw {
    fn amount_between(&self, lo: Amount, hi: Amount) -> Amount {
        let mut rng = self.0.lock().expect("draw rng lock poisoned");
        draw_units(&mut *rng, lo, hi)
    }
}

/// Uniform whole-unit amount in `[lo, hi]`. When the window holds no whole
/// unit the lower bound is used, which still satisfies the range contract.
fn draw_units(rng: &mut impl Rng, lo: Amount, hi: Amount) -> Amount {
    let lo_units = lo.major_ceil();
    let hi_units = hi.major_floor();
    if hi_units < lo_units {
        return lo;
    }
    Amount::from_major(rng.gen_range(lo_units..=hi_units))
}

/// Everything a preview needs, gathered by the engine.
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    pub budget: Amount,
    pub min_win: Amount,
    pub max_win: Amount,
    pub collected: Collected,
    pub ranked: &'a [PayerTotal],
    pub overrides: &'a HashMap<Msisdn, Amount>,
}

/// Allocate the budget across the ranked payers.
///
/// Precondition checks run in a fixed order so each failure surfaces its
/// own reason. Overrides are all-or-nothing: one bad override rejects the
/// whole plan.
pub fn plan(input: PlanInput<'_>, draw: &dyn PrizeDraw) -> Result<ReleasePlan, Rejection> {
    let PlanInput {
        budget,
        min_win,
        max_win,
        collected,
        ranked,
        overrides,
    } = input;

    if budget <= Amount::ZERO {
        return Err(Rejection::BudgetNotPositive);
    }
    if min_win <= Amount::ZERO || min_win > max_win {
        return Err(Rejection::InvalidWinRange {
            min: min_win,
            max: max_win,
        });
    }
    if collected.amount.is_zero() {
        return Err(Rejection::NothingCollected);
    }
    if budget > collected.amount {
        return Err(Rejection::BudgetExceedsCollections {
            budget,
            collected: collected.amount,
        });
    }
    if ranked.is_empty() {
        return Err(Rejection::NoEligiblePayers);
    }

    let mut winners = Vec::new();
    let mut remaining = budget;

    for payer in ranked {
        if remaining < min_win {
            break;
        }

        let amount = match overrides.get(&payer.msisdn) {
            Some(&fixed) => {
                if fixed < min_win || fixed > max_win {
                    return Err(Rejection::OverrideOutOfRange {
                        msisdn: payer.msisdn.clone(),
                        amount: fixed,
                    });
                }
                if fixed > remaining {
                    return Err(Rejection::OverrideExceedsBudget {
                        msisdn: payer.msisdn.clone(),
                        amount: fixed,
                        remaining,
                    });
                }
                fixed
            }
            None => draw.amount_between(min_win, max_win.min(remaining)),
        };

        remaining -= amount;
        winners.push(PlannedWinner {
            msisdn: payer.msisdn.clone(),
            amount,
            total_paid: payer.total_amount,
            payment_count: payer.payment_count,
        });
    }

    Ok(ReleasePlan {
        total_allocated: budget - remaining,
        budget_left: remaining,
        percentage: budget.ratio_percent(collected.amount),
        collected_today: collected.amount,
        paid_count_today: collected.count,
        winners,
    })
}
