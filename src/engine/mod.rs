//! Payout release engine.
//!
//! Two-phase workflow: `preview_release` plans an allocation without
//! touching storage, `release_winners` re-plans against fresh collections
//! and commits the result. The commit claims one transaction per planned
//! winner through the store's atomic conditional update, so two commits
//! racing over the same payer can never both pay the same transaction; the
//! loser skips that winner and the batch carries on.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::Amount;
use crate::clock::Clock;
use crate::collections::{self, DailyBucket};
use crate::config::Config;
use crate::day::{self, DayWindow};
use crate::model::{
    Msisdn, PayoutRelease, ReleaseOutcome, ReleasePlan, StakeTransaction, TxStatus, Winner,
};
use crate::store::{Page, Paged, Store, WinnerFilter};

mod error;
pub use error::{EngineError, Rejection};

mod plan;
pub use plan::{PlanInput, PrizeDraw, SeededDraw, UniformDraw, plan};

/// Inputs of a release, shared by preview and commit.
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    pub budget: Amount,
    pub min_win: Amount,
    pub max_win: Amount,
    /// Fixed prize per payer, bypassing the draw. All-or-nothing: one
    /// override outside the range or budget rejects the whole plan.
    pub overrides: HashMap<Msisdn, Amount>,
    /// Operator identity or automated system tag.
    pub actor: String,
}

impl ReleaseRequest {
    pub fn new(budget: Amount, min_win: Amount, max_win: Amount) -> Self {
        Self {
            budget,
            min_win,
            max_win,
            overrides: HashMap::new(),
            actor: "console".to_string(),
        }
    }
}

/// The release engine.
///
/// Holds no state of its own; every operation reads fresh rows through the
/// injected store.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    draw: Arc<dyn PrizeDraw>,
    tz: Tz,
}

impl Engine {
    /// Fails fast when the configured timezone is not in the tz database;
    /// a silent UTC fallback would corrupt every day boundary.
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        draw: Arc<dyn PrizeDraw>,
        config: &Config,
    ) -> Result<Self, EngineError> {
        let tz = day::zone(&config.zone)?;
        Ok(Self {
            store,
            clock,
            draw,
            tz,
        })
    }

    fn today(&self) -> DayWindow {
        day::today_window(self.clock.now(), self.tz)
    }

    /// Feed transaction rows from the payment subsystem into the store.
    ///
    /// A bad row should not stop the feed: it is logged and skipped.
    pub async fn ingest(&self, mut stream: impl Stream<Item = StakeTransaction> + Unpin) {
        while let Some(tx) = stream.next().await {
            let (id, msisdn, amount) = (tx.id, tx.msisdn.clone(), tx.amount);
            match self.store.insert_transaction(tx).await {
                Ok(()) => {
                    info!(tx = id, msisdn = %msisdn, amount = %amount, "transaction recorded")
                }
                Err(e) => warn!(tx = id, msisdn = %msisdn, reason = %e, "transaction skipped"),
            }
        }
    }

    /// Plan an allocation of `req.budget` over today's eligible payers.
    ///
    /// Never persists anything; safe to call any number of times, though
    /// drawn amounts differ between calls unless every payer is overridden.
    pub async fn preview_release(&self, req: &ReleaseRequest) -> Result<ReleasePlan, EngineError> {
        let window = self.today();
        let collected = self.store.sum_collected(TxStatus::Paid, &window).await?;
        let ranked = self.store.rank_payers(&window, true).await?;

        let plan = plan::plan(
            PlanInput {
                budget: req.budget,
                min_win: req.min_win,
                max_win: req.max_win,
                collected,
                ranked: &ranked,
                overrides: &req.overrides,
            },
            self.draw.as_ref(),
        )?;
        Ok(plan)
    }

    /// Commit a release: re-plan against fresh collections, persist the
    /// release row, claim one transaction per planned winner, finalize the
    /// totals to what was actually persisted.
    ///
    /// At-most-once per transaction and safe to retry: a retry finds fewer
    /// or zero eligible transactions. The returned winner list may be
    /// shorter than the plan when concurrent commits claimed rows first.
    pub async fn release_winners(&self, req: &ReleaseRequest) -> Result<ReleaseOutcome, EngineError> {
        let window = self.today();
        let plan = self.preview_release(req).await?;
        if plan.winners.is_empty() {
            return Err(Rejection::EmptyPlan.into());
        }

        let now = self.clock.now();
        let release_id = self
            .store
            .insert_release(PayoutRelease {
                id: 0,
                min_win: req.min_win,
                max_win: req.max_win,
                release_budget: req.budget,
                total_released: Amount::ZERO,
                total_winners: 0,
                percentage: plan.percentage,
                created_by: req.actor.clone(),
                created_at: now,
            })
            .await?;

        let mut winners = Vec::with_capacity(plan.winners.len());
        for planned in &plan.winners {
            match self.store.claim_transaction(&planned.msisdn, &window).await? {
                Some(tx) => {
                    let mut winner = Winner {
                        id: 0,
                        tx_id: tx.id,
                        release_id,
                        msisdn: planned.msisdn.clone(),
                        amount: planned.amount,
                        created_at: now,
                    };
                    winner.id = self.store.insert_winner(winner.clone()).await?;
                    info!(
                        release = release_id,
                        tx = tx.id,
                        msisdn = %winner.msisdn,
                        amount = %winner.amount,
                        "winner recorded"
                    );
                    winners.push(winner);
                }
                None => {
                    // Concurrency miss: another commit consumed this payer's
                    // transactions between preview and claim. Skip, keep going.
                    warn!(
                        release = release_id,
                        msisdn = %planned.msisdn,
                        "planned winner skipped, no claimable transaction"
                    );
                }
            }
        }

        let total: Amount = winners.iter().map(|w| w.amount).sum();
        let release = self
            .store
            .finalize_release(release_id, winners.len() as u32, total)
            .await?;
        info!(
            release = release.id,
            winners = release.total_winners,
            total = %release.total_released,
            by = %release.created_by,
            "release committed"
        );
        Ok(ReleaseOutcome { release, winners })
    }

    /// Releases, newest first.
    pub async fn list_releases(&self, page: Page) -> Result<Paged<PayoutRelease>, EngineError> {
        Ok(self.store.list_releases(page).await?)
    }

    /// Winners matching `filter`, newest first.
    pub async fn list_winners(
        &self,
        filter: &WinnerFilter,
        page: Page,
    ) -> Result<Paged<Winner>, EngineError> {
        Ok(self.store.list_winners(filter, page).await?)
    }

    /// Daily collection totals, newest bucket first. Defaults to the last
    /// 30 civil days ending today.
    pub async fn daily_collections(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        page: Page,
    ) -> Result<Paged<DailyBucket>, EngineError> {
        let to = to.unwrap_or_else(|| day::civil_date(self.clock.now(), self.tz));
        let from = from.unwrap_or(to - Duration::days(29));

        let start = day::day_window(from, self.tz).start;
        let end = day::day_window(to, self.tz).end;
        let rows = self.store.transactions_between(start, end).await?;
        let buckets = collections::bucket_daily(&rows, self.tz, from, to);
        Ok(Paged::from_sorted(&buckets, page))
    }
}
