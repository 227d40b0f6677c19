//! Bandwidth to earnings conversion.
//!
//! EarnApp pays a per-device rate in USD per gigabyte and only credits whole
//! cents. Everything here works on exact decimals so the same counters and
//! rate always yield the same cents.

use crate::error::{EarnWatchError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const GIGABYTES: u64 = 1_000_000_000;
pub const MEGABYTES: u64 = 1_000_000;

/// One cent in USD.
fn cent() -> Decimal {
    Decimal::new(1, 2)
}

/// Payout rate in USD per gigabyte.
///
/// Stored records go through [`PayoutRate::new`] on load, same as API data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct PayoutRate(Decimal);

impl PayoutRate {
    /// Rejects negative rates and rates too far from zero for a cent to be
    /// expressed in bytes.
    pub fn new(usd_per_gb: Decimal) -> Result<Self> {
        let rate = Self(usd_per_gb);
        let unrepresentable = !usd_per_gb.is_zero() && rate.bytes_per_cent().is_none();
        if usd_per_gb < Decimal::ZERO || unrepresentable {
            return Err(EarnWatchError::InvalidRate(usd_per_gb.to_string()));
        }
        Ok(rate)
    }

    /// Parses the dashboard's display form, e.g. `$0.25/GB`. A bare number is
    /// accepted as well.
    pub fn parse(text: &str) -> Result<Self> {
        let amount = text
            .trim()
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .trim_start_matches('$');

        let value = Decimal::from_str(amount)
            .map_err(|_| EarnWatchError::InvalidRate(text.to_string()))?;
        Self::new(value)
    }

    pub fn usd_per_gb(&self) -> Decimal {
        self.0
    }

    /// Bytes that earn exactly one cent: `(0.01 / rate) * 1e9`.
    ///
    /// `None` for a zero rate, which never converts traffic into money, and
    /// for rates whose bytes/cent does not fit a `Decimal`.
    pub fn bytes_per_cent(&self) -> Option<Decimal> {
        if self.0.is_zero() {
            return None;
        }
        cent()
            .checked_div(self.0)?
            .checked_mul(Decimal::from(GIGABYTES))
            .filter(|per_cent| !per_cent.is_zero())
    }

    /// Whole cents earned by `bytes`. Fractions of a cent are dropped, never
    /// rounded. A quotient that overflows earns nothing.
    pub fn earned_cents(&self, bytes: Decimal) -> Decimal {
        self.bytes_per_cent()
            .and_then(|per_cent| bytes.checked_div(per_cent))
            .map(|cents| cents.trunc())
            .unwrap_or(Decimal::ZERO)
    }

    /// Bytes already turned into cents.
    pub fn credited_bytes(&self, bytes: Decimal) -> Decimal {
        self.bytes_per_cent()
            .and_then(|per_cent| self.earned_cents(bytes).checked_mul(per_cent))
            .unwrap_or(Decimal::ZERO)
    }

    /// Bytes still waiting to cross the next cent boundary.
    pub fn pending_bytes(&self, bytes: Decimal) -> Decimal {
        bytes - self.credited_bytes(bytes)
    }
}

impl TryFrom<Decimal> for PayoutRate {
    type Error = EarnWatchError;

    fn try_from(usd_per_gb: Decimal) -> Result<Self> {
        Self::new(usd_per_gb)
    }
}

impl From<PayoutRate> for Decimal {
    fn from(rate: PayoutRate) -> Self {
        rate.0
    }
}

impl fmt::Display for PayoutRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}/GB", self.0.normalize())
    }
}

pub fn cents_to_usd(cents: Decimal) -> Decimal {
    cents * cent()
}

pub fn bytes_to_megabytes(bytes: Decimal) -> Decimal {
    bytes / Decimal::from(MEGABYTES)
}

/// Two-decimal rendering used in notifications (half-even rounding).
pub fn format_2dp(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}
