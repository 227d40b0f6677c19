use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemDetails {
    pub email: String,
    pub payment_method: String,
    pub min_redeem: Decimal,
}

/// Account-level money state, one per owner email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub multiplier: Decimal,
    #[serde(default)]
    pub multiplier_icon: String,
    #[serde(default)]
    pub multiplier_hint: String,
    pub redeem_details: RedeemDetails,
    pub balance: Decimal,
    pub earnings_total: Decimal,
    #[serde(default)]
    pub ref_bonuses: Decimal,
    #[serde(default)]
    pub ref_bonuses_total: Decimal,
    #[serde(default)]
    pub promo_bonuses: Decimal,
    #[serde(default)]
    pub promo_bonuses_total: Decimal,
    #[serde(default)]
    pub referral_part: String,
}

impl BalanceSnapshot {
    pub fn owner(&self) -> &str {
        &self.redeem_details.email
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceDirection {
    Increase,
    Unchanged,
    Decrease,
}

/// Run-over-run balance movement. A decrease is an upstream anomaly and is
/// reported as is.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceDelta {
    pub previous: Decimal,
    pub current: Decimal,
    pub change: Decimal,
    pub multiplier: Decimal,
    pub earnings_total: Decimal,
}

impl BalanceDelta {
    /// A missing stored snapshot (first run) counts as a zero baseline.
    pub fn between(stored: Option<&BalanceSnapshot>, remote: &BalanceSnapshot) -> Self {
        let previous = stored.map(|s| s.balance).unwrap_or(Decimal::ZERO);
        Self {
            previous,
            current: remote.balance,
            change: remote.balance - previous,
            multiplier: remote.multiplier,
            earnings_total: remote.earnings_total,
        }
    }

    pub fn direction(&self) -> BalanceDirection {
        if self.change > Decimal::ZERO {
            BalanceDirection::Increase
        } else if self.change < Decimal::ZERO {
            BalanceDirection::Decrease
        } else {
            BalanceDirection::Unchanged
        }
    }
}
