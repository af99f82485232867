//! Environment-derived configuration.
//!
//! Read once at startup. The instant-win values only seed the lazily
//! created settings row; after that the live row in the store wins.

use std::env;
use std::str::FromStr;

use crate::Amount;
use crate::model::InstantWinSettings;

#[derive(Debug, Clone)]
pub struct Config {
    /// Named timezone of the operating region (`CONSOLE_TZ`).
    pub zone: String,
    /// Pool usage percentage that raises a warning (`POOL_WARN_PCT`).
    pub warn_threshold: f64,
    /// Pool usage percentage that raises a critical alert (`POOL_CRIT_PCT`).
    pub critical_threshold: f64,
    /// Default prize-pool cap as % of daily collections (`INSTANT_WIN_MAX_PCT`).
    pub default_max_percentage: f64,
    /// Default per-stake win probability (`INSTANT_WIN_PROBABILITY`).
    pub default_probability: f64,
    /// Default prize bounds (`INSTANT_WIN_MIN` / `INSTANT_WIN_MAX`).
    pub default_min_amount: Amount,
    pub default_max_amount: Amount,
    /// Default winner SMS template (`INSTANT_WIN_MESSAGE`).
    pub default_message: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zone: "Africa/Nairobi".to_string(),
            warn_threshold: 90.0,
            critical_threshold: 98.0,
            default_max_percentage: 20.0,
            default_probability: 0.05,
            default_min_amount: Amount::from_major(10),
            default_max_amount: Amount::from_major(100),
            default_message: "Congratulations! You have won {amount}. It will be sent to your mobile money account.".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (injectable for tests).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let base = Self::default();
        Self {
            zone: get("CONSOLE_TZ").unwrap_or(base.zone),
            warn_threshold: parse_or(&get, "POOL_WARN_PCT", base.warn_threshold),
            critical_threshold: parse_or(&get, "POOL_CRIT_PCT", base.critical_threshold),
            default_max_percentage: parse_or(&get, "INSTANT_WIN_MAX_PCT", base.default_max_percentage),
            default_probability: parse_or(&get, "INSTANT_WIN_PROBABILITY", base.default_probability),
            default_min_amount: amount_or(&get, "INSTANT_WIN_MIN", base.default_min_amount),
            default_max_amount: amount_or(&get, "INSTANT_WIN_MAX", base.default_max_amount),
            default_message: get("INSTANT_WIN_MESSAGE").unwrap_or(base.default_message),
        }
    }

    /// Settings row created on first read when none exists yet.
    pub fn default_settings(&self) -> InstantWinSettings {
        InstantWinSettings {
            enabled: false,
            max_percentage: self.default_max_percentage,
            base_probability: self.default_probability,
            min_amount: self.default_min_amount,
            max_amount: self.default_max_amount,
            win_message: self.default_message.clone(),
            notify_winners: true,
        }
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, fallback: T) -> T {
    get(key)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(fallback)
}

fn amount_or(get: &impl Fn(&str) -> Option<String>, key: &str, fallback: Amount) -> Amount {
    get(key)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0)
        .map(Amount::from_float)
        .unwrap_or(fallback)
}
