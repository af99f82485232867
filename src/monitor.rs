//! Instant-win budget monitor.
//!
//! Read-only with respect to the ledger: it observes committed winner rows
//! and today's collections, computes how much of the rolling daily prize
//! pool is gone, and classifies the result into a graduated alert. It also
//! owns the live-tunable settings row, which is fetched fresh from the
//! store on every call and lazily created from configuration defaults.

use std::sync::Arc;

use chrono_tz::Tz;
use serde::Serialize;
use tracing::info;

use crate::Amount;
use crate::clock::Clock;
use crate::config::Config;
use crate::day::{self, TimeError};
use crate::model::{InstantWinSettings, TxStatus};
use crate::store::{Store, StoreError};

/// Today's prize-pool numbers.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TodayStats {
    pub collected: Amount,
    pub paid_count: u64,
    /// `collected * max_percentage / 100`.
    pub ceiling: Amount,
    /// Sum of winner amounts created today, whichever flow created them.
    pub paid_out: Amount,
    /// `max(ceiling - paid_out, 0)`.
    pub remaining: Amount,
    /// `paid_out / ceiling * 100`, one decimal; `0` when the ceiling is 0.
    pub usage_percentage: f64,
}

/// Graduated pool alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Anomaly {
    Normal,
    Warn,
    Critical,
    /// Remaining budget is gone. Distinct from threshold-based critical so
    /// operators can tell "almost there" from "stop".
    Exhausted,
}

impl Anomaly {
    pub fn level(self) -> &'static str {
        match self {
            Anomaly::Normal => "normal",
            Anomaly::Warn => "warn",
            Anomaly::Critical | Anomaly::Exhausted => "critical",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Anomaly::Normal => "prize pool within budget",
            Anomaly::Warn => "prize pool usage approaching the daily cap",
            Anomaly::Critical => "prize pool usage at critical level",
            Anomaly::Exhausted => "daily prize pool exhausted, instant wins suspended",
        }
    }
}

/// Classify pool usage. Precedence is strict: an exhausted pool is
/// exhausted even when the usage percentage sits below the warn threshold
/// (possible when the ceiling itself is zero).
pub fn classify(
    usage_percentage: f64,
    remaining: Amount,
    warn_threshold: f64,
    critical_threshold: f64,
) -> Anomaly {
    if remaining <= Amount::ZERO {
        Anomaly::Exhausted
    } else if usage_percentage >= critical_threshold {
        Anomaly::Critical
    } else if usage_percentage >= warn_threshold {
        Anomaly::Warn
    } else {
        Anomaly::Normal
    }
}

/// Full status payload for the operator dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub enabled: bool,
    pub settings: InstantWinSettings,
    pub today: TodayStats,
    pub anomaly: Anomaly,
}

/// Partial settings mutation; absent fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub enabled: Option<bool>,
    pub max_percentage: Option<f64>,
    pub base_probability: Option<f64>,
    pub min_amount: Option<Amount>,
    pub max_amount: Option<Amount>,
    pub win_message: Option<String>,
    pub notify_winners: Option<bool>,
}

/// The budget monitor.
#[derive(Clone)]
pub struct BudgetMonitor {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: Config,
    tz: Tz,
}

impl BudgetMonitor {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Result<Self, TimeError> {
        let tz = day::zone(&config.zone)?;
        Ok(Self {
            store,
            clock,
            config,
            tz,
        })
    }

    /// The settings row, created from configuration defaults on first read.
    pub async fn settings(&self) -> Result<InstantWinSettings, StoreError> {
        match self.store.load_settings().await? {
            Some(settings) => Ok(settings),
            None => self.store.init_settings(self.config.default_settings()).await,
        }
    }

    /// Today's pool status.
    pub async fn status(&self) -> Result<PoolStatus, StoreError> {
        let settings = self.settings().await?;
        let window = day::today_window(self.clock.now(), self.tz);

        let collected = self.store.sum_collected(TxStatus::Paid, &window).await?;
        let ceiling = collected.amount.percent_of(settings.max_percentage);
        let paid_out = self.store.sum_winner_amounts(&window).await?;
        let remaining = ceiling.saturating_sub(paid_out);
        let usage_percentage = round_one_decimal(paid_out.ratio_percent(ceiling));

        let anomaly = classify(
            usage_percentage,
            remaining,
            self.config.warn_threshold,
            self.config.critical_threshold,
        );

        Ok(PoolStatus {
            enabled: settings.enabled,
            today: TodayStats {
                collected: collected.amount,
                paid_count: collected.count,
                ceiling,
                paid_out,
                remaining,
                usage_percentage,
            },
            anomaly,
            settings,
        })
    }

    /// Switch instant wins on or off.
    pub async fn toggle(&self, enabled: bool) -> Result<InstantWinSettings, StoreError> {
        self.update(SettingsPatch {
            enabled: Some(enabled),
            ..SettingsPatch::default()
        })
        .await
    }

    /// Apply a partial settings update, clamping to safe ranges.
    pub async fn update(&self, patch: SettingsPatch) -> Result<InstantWinSettings, StoreError> {
        let mut settings = self.settings().await?;

        if let Some(enabled) = patch.enabled {
            settings.enabled = enabled;
        }
        if let Some(max_percentage) = patch.max_percentage {
            settings.max_percentage = max_percentage;
        }
        if let Some(base_probability) = patch.base_probability {
            settings.base_probability = base_probability;
        }
        if let Some(min_amount) = patch.min_amount {
            settings.min_amount = min_amount;
        }
        if let Some(max_amount) = patch.max_amount {
            settings.max_amount = max_amount;
        }
        if let Some(win_message) = patch.win_message {
            settings.win_message = win_message;
        }
        if let Some(notify_winners) = patch.notify_winners {
            settings.notify_winners = notify_winners;
        }

        let settings = clamp(settings);
        let saved = self.store.save_settings(settings).await?;
        info!(
            enabled = saved.enabled,
            max_percentage = saved.max_percentage,
            base_probability = saved.base_probability,
            min = %saved.min_amount,
            max = %saved.max_amount,
            "instant win settings updated"
        );
        Ok(saved)
    }
}

/// Force settings into their safe ranges before they are persisted.
fn clamp(mut settings: InstantWinSettings) -> InstantWinSettings {
    settings.base_probability = settings.base_probability.clamp(0.0, 1.0);
    settings.max_percentage = settings.max_percentage.clamp(0.0, 90.0);
    settings.min_amount = settings.min_amount.max(Amount::from_major(1));
    settings.max_amount = settings.max_amount.max(settings.min_amount);
    settings
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
