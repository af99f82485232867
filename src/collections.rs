//! Read-only aggregation over stake transactions.
//!
//! These are pure functions over row slices; the in-memory store delegates
//! its aggregate queries here, and the engine uses the daily bucketing for
//! the collections dashboard. Ordering is deterministic throughout: payers
//! ranked by total descending with ties broken by payer id, buckets newest
//! first.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;

use crate::Amount;
use crate::day::{self, DayWindow};
use crate::model::{Msisdn, StakeTransaction, TxStatus};

/// Sum and count of transactions matching a status inside a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Collected {
    pub amount: Amount,
    pub count: u64,
}

/// One payer's totals inside a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayerTotal {
    pub msisdn: Msisdn,
    pub total_amount: Amount,
    pub payment_count: u64,
}

/// One civil day's collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyBucket {
    pub day: NaiveDate,
    pub amount: Amount,
    pub count: u64,
}

/// Sum and count transactions with `status` created inside `window`.
pub fn sum_collected(
    rows: &[StakeTransaction],
    status: TxStatus,
    window: &DayWindow,
) -> Collected {
    let mut total = Collected::default();
    for tx in rows {
        if tx.status == status && window.contains(tx.created_at) {
            total.amount += tx.amount;
            total.count += 1;
        }
    }
    total
}

/// Rank payers by total paid inside `window`, highest first.
///
/// Only `Paid` rows count. With `exclude_released`, rows already consumed
/// by a release are left out so paid-out players do not resurface within
/// the same day.
pub fn rank_payers(
    rows: &[StakeTransaction],
    window: &DayWindow,
    exclude_released: bool,
) -> Vec<PayerTotal> {
    let mut totals: BTreeMap<&str, (Amount, u64)> = BTreeMap::new();
    for tx in rows {
        if tx.status != TxStatus::Paid || !window.contains(tx.created_at) {
            continue;
        }
        if exclude_released && tx.released {
            continue;
        }
        let entry = totals.entry(tx.msisdn.as_str()).or_default();
        entry.0 += tx.amount;
        entry.1 += 1;
    }

    let mut ranked: Vec<PayerTotal> = totals
        .into_iter()
        .map(|(msisdn, (total_amount, payment_count))| PayerTotal {
            msisdn: msisdn.to_string(),
            total_amount,
            payment_count,
        })
        .collect();
    // BTreeMap iteration is already id-ordered; a stable sort on the total
    // keeps the id order as the tie-break.
    ranked.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
    ranked
}

/// Group paid transactions by civil day in `tz`, newest bucket first.
pub fn bucket_daily(
    rows: &[StakeTransaction],
    tz: Tz,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<DailyBucket> {
    let mut buckets: BTreeMap<NaiveDate, (Amount, u64)> = BTreeMap::new();
    for tx in rows {
        if tx.status != TxStatus::Paid {
            continue;
        }
        let day = day::civil_date(tx.created_at, tz);
        if day < from || day > to {
            continue;
        }
        let entry = buckets.entry(day).or_default();
        entry.0 += tx.amount;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .rev()
        .map(|(day, (amount, count))| DailyBucket { day, amount, count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn tx(id: u64, msisdn: &str, amount: f64, status: TxStatus, released: bool, at: &str) -> StakeTransaction {
        StakeTransaction {
            id,
            msisdn: msisdn.to_string(),
            amount: Amount::from_float(amount),
            status,
            released,
            created_at: at.parse::<DateTime<Utc>>().unwrap(),
        }
    }

    fn nairobi_window() -> DayWindow {
        day::civil_day_window("2026-08-05", "Africa/Nairobi").unwrap()
    }

    #[test]
    fn sum_collected_filters_status_and_window() {
        let rows = vec![
            tx(1, "254700000001", 100.0, TxStatus::Paid, false, "2026-08-05T06:00:00Z"),
            tx(2, "254700000001", 50.0, TxStatus::Pending, false, "2026-08-05T06:05:00Z"),
            tx(3, "254700000002", 30.0, TxStatus::Failed, false, "2026-08-05T06:10:00Z"),
            // previous civil day in Nairobi
            tx(4, "254700000002", 70.0, TxStatus::Paid, false, "2026-08-04T12:00:00Z"),
        ];
        let collected = sum_collected(&rows, TxStatus::Paid, &nairobi_window());
        assert_eq!(collected.amount, Amount::from_float(100.0));
        assert_eq!(collected.count, 1);
    }

    #[test]
    fn sum_collected_counts_released_rows() {
        // Released rows were still collected; the window total must keep them.
        let rows = vec![
            tx(1, "254700000001", 100.0, TxStatus::Paid, true, "2026-08-05T06:00:00Z"),
            tx(2, "254700000001", 40.0, TxStatus::Paid, false, "2026-08-05T07:00:00Z"),
        ];
        let collected = sum_collected(&rows, TxStatus::Paid, &nairobi_window());
        assert_eq!(collected.amount, Amount::from_float(140.0));
        assert_eq!(collected.count, 2);
    }

    #[test]
    fn rank_payers_orders_by_total_descending() {
        let rows = vec![
            tx(1, "254700000002", 30.0, TxStatus::Paid, false, "2026-08-05T06:00:00Z"),
            tx(2, "254700000001", 50.0, TxStatus::Paid, false, "2026-08-05T06:01:00Z"),
            tx(3, "254700000002", 40.0, TxStatus::Paid, false, "2026-08-05T06:02:00Z"),
            tx(4, "254700000003", 20.0, TxStatus::Paid, false, "2026-08-05T06:03:00Z"),
        ];
        let ranked = rank_payers(&rows, &nairobi_window(), false);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].msisdn, "254700000002");
        assert_eq!(ranked[0].total_amount, Amount::from_float(70.0));
        assert_eq!(ranked[0].payment_count, 2);
        assert_eq!(ranked[1].msisdn, "254700000001");
        assert_eq!(ranked[2].msisdn, "254700000003");
    }

    #[test]
    fn rank_payers_breaks_ties_by_payer_id() {
        let rows = vec![
            tx(1, "254700000009", 50.0, TxStatus::Paid, false, "2026-08-05T06:00:00Z"),
            tx(2, "254700000001", 50.0, TxStatus::Paid, false, "2026-08-05T06:01:00Z"),
        ];
        let ranked = rank_payers(&rows, &nairobi_window(), false);
        assert_eq!(ranked[0].msisdn, "254700000001");
        assert_eq!(ranked[1].msisdn, "254700000009");
    }

    #[test]
    fn rank_payers_excludes_unpaid_rows() {
        let rows = vec![
            tx(1, "254700000001", 50.0, TxStatus::Pending, false, "2026-08-05T06:00:00Z"),
            tx(2, "254700000001", 60.0, TxStatus::Failed, false, "2026-08-05T06:01:00Z"),
        ];
        assert!(rank_payers(&rows, &nairobi_window(), false).is_empty());
    }

    #[test]
    fn rank_payers_can_exclude_released() {
        let rows = vec![
            tx(1, "254700000001", 100.0, TxStatus::Paid, true, "2026-08-05T06:00:00Z"),
            tx(2, "254700000001", 20.0, TxStatus::Paid, false, "2026-08-05T06:01:00Z"),
            tx(3, "254700000002", 80.0, TxStatus::Paid, true, "2026-08-05T06:02:00Z"),
        ];

        let with_released = rank_payers(&rows, &nairobi_window(), false);
        assert_eq!(with_released[0].total_amount, Amount::from_float(120.0));

        let eligible_only = rank_payers(&rows, &nairobi_window(), true);
        assert_eq!(eligible_only.len(), 1);
        assert_eq!(eligible_only[0].msisdn, "254700000001");
        assert_eq!(eligible_only[0].total_amount, Amount::from_float(20.0));
    }

    #[test]
    fn bucket_daily_groups_by_civil_day() {
        let tz = day::zone("Africa/Nairobi").unwrap();
        let rows = vec![
            // 2026-08-04 22:00 UTC is already 2026-08-05 in Nairobi
            tx(1, "254700000001", 10.0, TxStatus::Paid, false, "2026-08-04T22:00:00Z"),
            tx(2, "254700000002", 20.0, TxStatus::Paid, false, "2026-08-05T08:00:00Z"),
            tx(3, "254700000001", 40.0, TxStatus::Paid, false, "2026-08-04T12:00:00Z"),
            tx(4, "254700000001", 99.0, TxStatus::Pending, false, "2026-08-05T09:00:00Z"),
        ];
        let from = day::parse_civil_date("2026-08-01").unwrap();
        let to = day::parse_civil_date("2026-08-05").unwrap();

        let buckets = bucket_daily(&rows, tz, from, to);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].day, day::parse_civil_date("2026-08-05").unwrap());
        assert_eq!(buckets[0].amount, Amount::from_float(30.0));
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[1].day, day::parse_civil_date("2026-08-04").unwrap());
        assert_eq!(buckets[1].amount, Amount::from_float(40.0));
    }

    #[test]
    fn bucket_daily_clips_to_range() {
        let tz = day::zone("Africa/Nairobi").unwrap();
        let rows = vec![
            tx(1, "254700000001", 10.0, TxStatus::Paid, false, "2026-07-01T12:00:00Z"),
            tx(2, "254700000001", 20.0, TxStatus::Paid, false, "2026-08-05T08:00:00Z"),
        ];
        let from = day::parse_civil_date("2026-08-01").unwrap();
        let to = day::parse_civil_date("2026-08-05").unwrap();

        let buckets = bucket_daily(&rows, tz, from, to);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].amount, Amount::from_float(20.0));
    }
}
