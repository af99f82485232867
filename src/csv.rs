use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use chrono::DateTime;

use crate::model::{PlannedWinner, ReleaseId, StakeTransaction, TxId, Winner, WinnerId};
use crate::{Amount, TxStatus};

/// Errors that can occur when parsing ledger rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized status '{status}'")]
    UnrecognizedStatus { line: usize, status: String },

    #[error("line {line}: missing amount")]
    MissingAmount { line: usize },

    #[error("line {line}: bad timestamp '{raw}'")]
    BadTimestamp { line: usize, raw: String },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    id: TxId,
    msisdn: String,
    amount: Option<f64>,
    status: String,
    released: Option<bool>,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct PlannedRow {
    msisdn: String,
    amount: String,
    total_paid: String,
    payment_count: u64,
}

#[derive(Debug, Serialize)]
struct WinnerRow {
    winner: WinnerId,
    release: ReleaseId,
    tx: TxId,
    msisdn: String,
    amount: String,
}

/// Read stake transactions from a csv ledger file
pub fn read_transactions(
    path: impl AsRef<Path>,
) -> impl Iterator<Item = Result<StakeTransaction, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;

            let status = match row.status.to_ascii_lowercase().as_str() {
                "pending" => TxStatus::Pending,
                "paid" => TxStatus::Paid,
                "failed" => TxStatus::Failed,
                other => {
                    return Err(CsvError::UnrecognizedStatus {
                        line,
                        status: other.to_string(),
                    });
                }
            };
            let amount = row.amount.ok_or(CsvError::MissingAmount { line })?;
            let created_at = DateTime::parse_from_rfc3339(&row.created_at)
                .map_err(|_| CsvError::BadTimestamp {
                    line,
                    raw: row.created_at.clone(),
                })?
                .to_utc();

            Ok(StakeTransaction {
                id: row.id,
                msisdn: row.msisdn,
                amount: Amount::from_float(amount),
                status,
                released: row.released.unwrap_or(false),
                created_at,
            })
        })
}

/// write a previewed allocation to stdout in csv format
pub fn write_planned(winners: &[PlannedWinner]) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for planned in winners {
        let row = PlannedRow {
            msisdn: planned.msisdn.clone(),
            amount: planned.amount.to_string(),
            total_paid: planned.total_paid.to_string(),
            payment_count: planned.payment_count,
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}

/// write committed winners to stdout in csv format
pub fn write_winners(winners: &[Winner]) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for winner in winners {
        let row = WinnerRow {
            winner: winner.id,
            release: winner.release_id,
            tx: winner.tx_id,
            msisdn: winner.msisdn.clone(),
            amount: winner.amount.to_string(),
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}
