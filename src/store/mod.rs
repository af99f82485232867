//! Storage contract for the payout console.
//!
//! All persistence goes through the [`Store`] trait so the engine and the
//! budget monitor never know which backend holds the rows. The one
//! concurrency-sensitive operation is [`Store::claim_transaction`]: it must
//! be an atomic conditional update, because two commits racing over the same
//! payer must never both consume the same transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::Amount;
use crate::collections::{Collected, PayerTotal};
use crate::day::DayWindow;
use crate::model::{
    InstantWinSettings, Msisdn, PayoutRelease, ReleaseId, StakeTransaction, TxId, TxStatus, Winner,
    WinnerId,
};

mod memory;
pub use memory::MemoryStore;

/// Error from the storage backend. Fatal for the current call; every
/// operation in the crate is safe to retry after one of these.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate transaction id {0}")]
    DuplicateTransaction(TxId),

    #[error("transaction {0} is marked released but is not paid")]
    ReleasedWithoutPayment(TxId),

    #[error("release {0} not found")]
    ReleaseNotFound(ReleaseId),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// 1-based pagination request.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(20).clamp(1, 100),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }

    /// The slice of `items` this page covers.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset().min(items.len());
        let end = (start + self.limit as usize).min(items.len());
        &items[start..end]
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T: Clone> Paged<T> {
    pub fn from_sorted(items: &[T], page: Page) -> Self {
        Self {
            items: page.slice(items).to_vec(),
            total: items.len() as u64,
            page: page.page,
            limit: page.limit,
        }
    }
}

/// Filter for winner listings.
#[derive(Debug, Clone, Default)]
pub struct WinnerFilter {
    pub release_id: Option<ReleaseId>,
    pub msisdn: Option<Msisdn>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a transaction row. Rejects duplicate ids and rows violating
    /// the `released ⇒ paid` invariant.
    async fn insert_transaction(&self, tx: StakeTransaction) -> Result<(), StoreError>;

    /// Raw rows created inside `[start, end)`, id order.
    async fn transactions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StakeTransaction>, StoreError>;

    /// Sum and count of rows with `status` inside `window`.
    async fn sum_collected(
        &self,
        status: TxStatus,
        window: &DayWindow,
    ) -> Result<Collected, StoreError>;

    /// Payers ranked by total paid inside `window`, highest first.
    async fn rank_payers(
        &self,
        window: &DayWindow,
        exclude_released: bool,
    ) -> Result<Vec<PayerTotal>, StoreError>;

    /// Atomically claim one eligible transaction for `msisdn` inside
    /// `window`: paid, unreleased, most recent first. Marks it released and
    /// returns it, or returns `None` when a concurrent commit has already
    /// consumed the payer's transactions.
    async fn claim_transaction(
        &self,
        msisdn: &str,
        window: &DayWindow,
    ) -> Result<Option<StakeTransaction>, StoreError>;

    /// Persist a release row. The store assigns and returns the id; the id
    /// on the passed row is ignored.
    async fn insert_release(&self, release: PayoutRelease) -> Result<ReleaseId, StoreError>;

    /// Set the realized totals on a release and return the finalized row.
    async fn finalize_release(
        &self,
        id: ReleaseId,
        total_winners: u32,
        total_released: Amount,
    ) -> Result<PayoutRelease, StoreError>;

    /// Persist a winner row. The store assigns and returns the id.
    async fn insert_winner(&self, winner: Winner) -> Result<WinnerId, StoreError>;

    /// Sum of winner amounts created inside `window`, whichever release
    /// system created them.
    async fn sum_winner_amounts(&self, window: &DayWindow) -> Result<Amount, StoreError>;

    /// Releases, newest first.
    async fn list_releases(&self, page: Page) -> Result<Paged<PayoutRelease>, StoreError>;

    /// Winners matching `filter`, newest first.
    async fn list_winners(
        &self,
        filter: &WinnerFilter,
        page: Page,
    ) -> Result<Paged<Winner>, StoreError>;

    /// The settings singleton, if it has been created.
    async fn load_settings(&self) -> Result<Option<InstantWinSettings>, StoreError>;

    /// Find-or-create the settings singleton. A racing creator must not
    /// fail: the loser reads back whatever the winner stored.
    async fn init_settings(
        &self,
        defaults: InstantWinSettings,
    ) -> Result<InstantWinSettings, StoreError>;

    /// Overwrite the settings singleton.
    async fn save_settings(
        &self,
        settings: InstantWinSettings,
    ) -> Result<InstantWinSettings, StoreError>;
}
