//! Core domain rows for the payout console.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Amount;

/// Transaction identifier, assigned by the payment subsystem.
pub type TxId = u64;

/// Release identifier, assigned by the store.
pub type ReleaseId = u64;

/// Winner identifier, assigned by the store.
pub type WinnerId = u64;

/// Payer phone number in international format.
pub type Msisdn = String;

/// Lifecycle of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Push payment initiated, gateway callback not yet received.
    Pending,
    /// Gateway confirmed the payment.
    Paid,
    /// Gateway rejected or timed out the payment.
    Failed,
}

/// A single stake payment attempt.
///
/// Created by the payment subsystem when a stake is initiated; the status is
/// mutated by the gateway callback and `released` by the release ledger.
/// Rows are never deleted. `released` may only ever flip to `true` once, and
/// only on a `Paid` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeTransaction {
    pub id: TxId,
    pub msisdn: Msisdn,
    pub amount: Amount,
    pub status: TxStatus,
    pub released: bool,
    pub created_at: DateTime<Utc>,
}

impl StakeTransaction {
    /// Paid and not yet consumed by a release.
    pub fn is_eligible(&self) -> bool {
        self.status == TxStatus::Paid && !self.released
    }
}

/// One allocation event.
///
/// Immutable after creation except for the two totals, which are finalized
/// in the same unit of work that persists the winner rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRelease {
    pub id: ReleaseId,
    pub min_win: Amount,
    pub max_win: Amount,
    pub release_budget: Amount,
    pub total_released: Amount,
    pub total_winners: u32,
    /// Budget as a percentage of the day's collections at preview time.
    pub percentage: f64,
    /// Operator identity or automated system tag.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// One payout line, linking exactly one transaction to exactly one release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Winner {
    pub id: WinnerId,
    pub tx_id: TxId,
    pub release_id: ReleaseId,
    pub msisdn: Msisdn,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// Live-tunable instant-win configuration (singleton row).
///
/// Read fresh from the store on every status query, lazily created from
/// environment-derived defaults on first read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantWinSettings {
    pub enabled: bool,
    /// Daily prize-pool cap as a percentage of the day's collections.
    pub max_percentage: f64,
    /// Per-stake win probability used by the payment-callback collaborator.
    pub base_probability: f64,
    pub min_amount: Amount,
    pub max_amount: Amount,
    /// SMS template sent to winners.
    pub win_message: String,
    pub notify_winners: bool,
}

/// One planned payout line from a preview, with the payer's audit totals.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedWinner {
    pub msisdn: Msisdn,
    pub amount: Amount,
    pub total_paid: Amount,
    pub payment_count: u64,
}

/// Result of a preview: the allocation that a commit would persist.
#[derive(Debug, Clone, Serialize)]
pub struct ReleasePlan {
    pub winners: Vec<PlannedWinner>,
    pub total_allocated: Amount,
    pub budget_left: Amount,
    /// Budget as a percentage of the day's collections.
    pub percentage: f64,
    pub collected_today: Amount,
    pub paid_count_today: u64,
}

/// Result of a committed release: the finalized release row plus the
/// winners actually persisted (may be fewer than planned, see the ledger).
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    pub release: PayoutRelease,
    pub winners: Vec<Winner>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligible_requires_paid_and_unreleased() {
        let mut tx = StakeTransaction {
            id: 1,
            msisdn: "254700000001".to_string(),
            amount: Amount::from_major(50),
            status: TxStatus::Paid,
            released: false,
            created_at: Utc::now(),
        };
        assert!(tx.is_eligible());

        tx.released = true;
        assert!(!tx.is_eligible());

        tx.released = false;
        tx.status = TxStatus::Pending;
        assert!(!tx.is_eligible());
    }

    #[test]
    fn tx_status_serializes_lowercase() {
        assert_eq!(serde_json_like(TxStatus::Paid), "paid");
        assert_eq!(serde_json_like(TxStatus::Pending), "pending");
        assert_eq!(serde_json_like(TxStatus::Failed), "failed");
    }

    // serde_json is not a dependency; csv's serializer is enough to observe
    // the rename_all behavior.
    fn serde_json_like(status: TxStatus) -> String {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(vec![]);
        writer.serialize(status).unwrap();
        let bytes = writer.into_inner().unwrap();
        String::from_utf8(bytes).unwrap().trim().to_string()
    }
}
