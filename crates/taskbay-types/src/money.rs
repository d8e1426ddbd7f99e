use serde::{Deserialize, Serialize};
use std::fmt;

/// Minor units per major currency unit (cents per dollar).
pub const MINOR_PER_MAJOR: u64 = 100;

/// A monetary amount in minor units (cents).
///
/// All arithmetic on budgets, fees, and payouts happens in integer minor
/// units; fractional results of percentage math round to the nearest cent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub fn from_major(major: u64) -> Self {
        Self(major * MINOR_PER_MAJOR)
    }

    pub fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Parse a major-units float as it arrives in an API body. Rejects
    /// negatives, NaN, and infinities.
    pub fn try_from_major_f64(major: f64) -> Option<Self> {
        if !major.is_finite() || major < 0.0 {
            return None;
        }
        Some(Self((major * MINOR_PER_MAJOR as f64).round() as u64))
    }

    pub fn to_minor(&self) -> u64 {
        self.0
    }

    pub fn to_major_f64(&self) -> f64 {
        self.0 as f64 / MINOR_PER_MAJOR as f64
    }

    /// Fraction of this amount, rounded to the nearest minor unit.
    /// `frac` is a ratio in [0, 1], not a whole-number percent.
    pub fn mul_fraction(&self, frac: f64) -> Self {
        Self((self.0 as f64 * frac).round() as u64)
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.to_major_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_minor_round_trip() {
        let amount = Amount::from_major(1000);
        assert_eq!(amount.to_minor(), 100_000);
        assert_eq!(amount.to_major_f64(), 1000.0);
    }

    #[test]
    fn fraction_rounds_to_nearest_cent() {
        // 33.33% of $10.00 = $3.33
        assert_eq!(
            Amount::from_major(10).mul_fraction(0.3333),
            Amount::from_minor(333)
        );
    }

    #[test]
    fn rejects_bad_floats() {
        assert!(Amount::try_from_major_f64(-1.0).is_none());
        assert!(Amount::try_from_major_f64(f64::NAN).is_none());
        assert!(Amount::try_from_major_f64(f64::INFINITY).is_none());
        assert_eq!(
            Amount::try_from_major_f64(12.34),
            Some(Amount::from_minor(1234))
        );
    }

    #[test]
    fn display_formats_major_units() {
        assert_eq!(Amount::from_minor(105_200).to_string(), "$1052.00");
    }
}
