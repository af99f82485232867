//! In-process store over a `tokio` read-write lock.
//!
//! Backs the CLI and the test suite. The claim takes the write lock for the
//! whole find-and-mark step, which makes it the atomic conditional update
//! the ledger relies on.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::Amount;
use crate::collections::{self, Collected, PayerTotal};
use crate::day::DayWindow;
use crate::model::{
    InstantWinSettings, PayoutRelease, ReleaseId, StakeTransaction, TxId, TxStatus, Winner,
    WinnerId,
};

use super::{Page, Paged, Store, StoreError, WinnerFilter};

#[derive(Default)]
struct Inner {
    transactions: BTreeMap<TxId, StakeTransaction>,
    releases: BTreeMap<ReleaseId, PayoutRelease>,
    winners: Vec<Winner>,
    settings: Option<InstantWinSettings>,
    next_release_id: ReleaseId,
    next_winner_id: WinnerId,
}

/// In-memory [`Store`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_transaction(&self, tx: StakeTransaction) -> Result<(), StoreError> {
        if tx.released && tx.status != TxStatus::Paid {
            return Err(StoreError::ReleasedWithoutPayment(tx.id));
        }
        let mut inner = self.inner.write().await;
        if inner.transactions.contains_key(&tx.id) {
            return Err(StoreError::DuplicateTransaction(tx.id));
        }
        inner.transactions.insert(tx.id, tx);
        Ok(())
    }

    async fn transactions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StakeTransaction>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .transactions
            .values()
            .filter(|tx| start <= tx.created_at && tx.created_at < end)
            .cloned()
            .collect())
    }

    async fn sum_collected(
        &self,
        status: TxStatus,
        window: &DayWindow,
    ) -> Result<Collected, StoreError> {
        let inner = self.inner.read().await;
        let rows: Vec<StakeTransaction> = inner.transactions.values().cloned().collect();
        Ok(collections::sum_collected(&rows, status, window))
    }

    async fn rank_payers(
        &self,
        window: &DayWindow,
        exclude_released: bool,
    ) -> Result<Vec<PayerTotal>, StoreError> {
        let inner = self.inner.read().await;
        let rows: Vec<StakeTransaction> = inner.transactions.values().cloned().collect();
        Ok(collections::rank_payers(&rows, window, exclude_released))
    }

    async fn claim_transaction(
        &self,
        msisdn: &str,
        window: &DayWindow,
    ) -> Result<Option<StakeTransaction>, StoreError> {
        let mut inner = self.inner.write().await;
        let claimed = inner
            .transactions
            .values_mut()
            .filter(|tx| {
                tx.msisdn == msisdn
                    && tx.status == TxStatus::Paid
                    && !tx.released
                    && window.contains(tx.created_at)
            })
            .max_by_key(|tx| (tx.created_at, tx.id));

        match claimed {
            Some(tx) => {
                tx.released = true;
                Ok(Some(tx.clone()))
            }
            None => Ok(None),
        }
    }

    async fn insert_release(&self, mut release: PayoutRelease) -> Result<ReleaseId, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_release_id += 1;
        let id = inner.next_release_id;
        release.id = id;
        inner.releases.insert(id, release);
        Ok(id)
    }

    async fn finalize_release(
        &self,
        id: ReleaseId,
        total_winners: u32,
        total_released: Amount,
    ) -> Result<PayoutRelease, StoreError> {
        let mut inner = self.inner.write().await;
        let release = inner
            .releases
            .get_mut(&id)
            .ok_or(StoreError::ReleaseNotFound(id))?;
        release.total_winners = total_winners;
        release.total_released = total_released;
        Ok(release.clone())
    }

    async fn insert_winner(&self, mut winner: Winner) -> Result<WinnerId, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_winner_id += 1;
        winner.id = inner.next_winner_id;
        let id = winner.id;
        inner.winners.push(winner);
        Ok(id)
    }

    async fn sum_winner_amounts(&self, window: &DayWindow) -> Result<Amount, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .winners
            .iter()
            .filter(|w| window.contains(w.created_at))
            .map(|w| w.amount)
            .sum())
    }

    async fn list_releases(&self, page: Page) -> Result<Paged<PayoutRelease>, StoreError> {
        let inner = self.inner.read().await;
        let mut releases: Vec<PayoutRelease> = inner.releases.values().cloned().collect();
        releases.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(Paged::from_sorted(&releases, page))
    }

    async fn list_winners(
        &self,
        filter: &WinnerFilter,
        page: Page,
    ) -> Result<Paged<Winner>, StoreError> {
        let inner = self.inner.read().await;
        let mut winners: Vec<Winner> = inner
            .winners
            .iter()
            .filter(|w| filter.release_id.is_none_or(|id| w.release_id == id))
            .filter(|w| filter.msisdn.as_deref().is_none_or(|m| w.msisdn == m))
            .cloned()
            .collect();
        winners.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(Paged::from_sorted(&winners, page))
    }

    async fn load_settings(&self) -> Result<Option<InstantWinSettings>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.settings.clone())
    }

    async fn init_settings(
        &self,
        defaults: InstantWinSettings,
    ) -> Result<InstantWinSettings, StoreError> {
        let mut inner = self.inner.write().await;
        // Re-check under the write lock: a racing creator loses quietly and
        // reads back what the winner stored.
        match &inner.settings {
            Some(existing) => Ok(existing.clone()),
            None => {
                inner.settings = Some(defaults.clone());
                Ok(defaults)
            }
        }
    }

    async fn save_settings(
        &self,
        settings: InstantWinSettings,
    ) -> Result<InstantWinSettings, StoreError> {
        let mut inner = self.inner.write().await;
        inner.settings = Some(settings.clone());
        Ok(settings)
    }
}
