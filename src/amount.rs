use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed-point decimal with 2 decimal places, stored as a scaled integer.
///
/// All monetary values in the console are non-negative amounts in a single
/// currency; the scaled representation keeps budget arithmetic exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Amount(i64);

impl Amount {
    const SCALE: i64 = 100;

    pub const ZERO: Amount = Amount(0);

    pub fn from_float(value: f64) -> Self {
        Amount((value * Self::SCALE as f64).round() as i64)
    }

    pub fn from_scaled(value: i64) -> Self {
        Amount(value)
    }

    /// Whole currency units, no fractional part.
    pub fn from_major(units: i64) -> Self {
        Amount(units * Self::SCALE)
    }

    pub fn to_scaled(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Largest whole-unit value not above this amount.
    pub fn major_floor(self) -> i64 {
        self.0.div_euclid(Self::SCALE)
    }

    /// Smallest whole-unit value not below this amount.
    pub fn major_ceil(self) -> i64 {
        (self.0 + Self::SCALE - 1).div_euclid(Self::SCALE)
    }

    /// `pct` percent of this amount, rounded to the nearest cent.
    pub fn percent_of(self, pct: f64) -> Amount {
        Amount((self.0 as f64 * pct / 100.0).round() as i64)
    }

    /// This amount as a percentage of `whole`; `0.0` when `whole` is zero.
    pub fn ratio_percent(self, whole: Amount) -> f64 {
        if whole.0 == 0 {
            0.0
        } else {
            self.0 as f64 / whole.0 as f64 * 100.0
        }
    }

    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Amount((self.0 - rhs.0).max(0))
    }

    pub fn min(self, rhs: Amount) -> Amount {
        if self.0 <= rhs.0 { self } else { rhs }
    }

    pub fn max(self, rhs: Amount) -> Amount {
        if self.0 >= rhs.0 { self } else { rhs }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        let whole = abs / Self::SCALE;
        let frac = abs % Self::SCALE;
        write!(f, "{sign}{whole}.{frac:02}")
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

// Serialized as a plain decimal number so rows read naturally in payloads.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / Self::SCALE as f64)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(Amount::from_float(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_scaled_preserves_value() {
        let amount = Amount::from_scaled(12345);
        assert_eq!(amount, Amount(12345));
    }

    #[test]
    fn from_float_converts_correctly() {
        assert_eq!(Amount::from_float(100.0), Amount::from_scaled(10_000));
        assert_eq!(Amount::from_float(1.5), Amount::from_scaled(150));
        assert_eq!(Amount::from_float(0.01), Amount::from_scaled(1));
    }

    #[test]
    fn from_float_rounds_correctly() {
        assert_eq!(Amount::from_float(1.234), Amount::from_scaled(123));
        assert_eq!(Amount::from_float(1.235), Amount::from_scaled(124));
    }

    #[test]
    fn from_major_scales_whole_units() {
        assert_eq!(Amount::from_major(50), Amount::from_float(50.0));
    }

    #[test]
    fn display_formats_two_decimals() {
        assert_eq!(Amount::from_scaled(10_000).to_string(), "100.00");
        assert_eq!(Amount::from_scaled(150).to_string(), "1.50");
        assert_eq!(Amount::from_scaled(1).to_string(), "0.01");
        assert_eq!(Amount::from_scaled(0).to_string(), "0.00");
    }

    #[test]
    fn major_floor_and_ceil() {
        let a = Amount::from_float(73.45);
        assert_eq!(a.major_floor(), 73);
        assert_eq!(a.major_ceil(), 74);

        let whole = Amount::from_major(50);
        assert_eq!(whole.major_floor(), 50);
        assert_eq!(whole.major_ceil(), 50);
    }

    #[test]
    fn percent_of_rounds_to_cents() {
        let collected = Amount::from_major(10_000);
        assert_eq!(collected.percent_of(20.0), Amount::from_major(2_000));
        assert_eq!(Amount::from_float(99.99).percent_of(50.0), Amount::from_float(50.0));
    }

    #[test]
    fn ratio_percent_of_whole() {
        let part = Amount::from_major(2_000);
        let whole = Amount::from_major(10_000);
        assert_eq!(part.ratio_percent(whole), 20.0);
    }

    #[test]
    fn ratio_percent_zero_whole_is_zero() {
        assert_eq!(Amount::from_major(5).ratio_percent(Amount::ZERO), 0.0);
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        let a = Amount::from_major(10);
        let b = Amount::from_major(25);
        assert_eq!(a.saturating_sub(b), Amount::ZERO);
        assert_eq!(b.saturating_sub(a), Amount::from_major(15));
    }

    #[test]
    fn add_and_sub() {
        let a = Amount::from_scaled(100);
        let b = Amount::from_scaled(50);
        assert_eq!(a + b, Amount::from_scaled(150));
        assert_eq!(a - b, Amount::from_scaled(50));
    }

    #[test]
    fn assign_ops() {
        let mut a = Amount::from_scaled(100);
        a += Amount::from_scaled(50);
        assert_eq!(a, Amount::from_scaled(150));
        a -= Amount::from_scaled(30);
        assert_eq!(a, Amount::from_scaled(120));
    }

    #[test]
    fn sum_over_iterator() {
        let total: Amount = [10, 20, 30].into_iter().map(Amount::from_major).sum();
        assert_eq!(total, Amount::from_major(60));
    }

    #[test]
    fn ordering() {
        assert!(Amount::from_scaled(100) < Amount::from_scaled(200));
        assert_eq!(Amount::from_major(5).min(Amount::from_major(3)), Amount::from_major(3));
        assert_eq!(Amount::from_major(5).max(Amount::from_major(3)), Amount::from_major(5));
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Amount::default(), Amount::ZERO);
    }
}
