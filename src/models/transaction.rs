use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[serde(alias = "pending")]
    PendingProcedure,
    Approved,
    Paid,
}

impl TransactionStatus {
    /// Paid is the only terminal status.
    pub fn is_final(&self) -> bool {
        matches!(self, TransactionStatus::Paid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::PendingProcedure => "pending_procedure",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A redemption request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub uuid: String,
    pub status: TransactionStatus,
    pub email: String,
    pub date: DateTime<Utc>,
    pub payment_method: String,
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
    pub money_amount: Decimal,
    #[serde(default)]
    pub ref_bonuses_amount: Decimal,
    #[serde(default)]
    pub promo_bonuses_amount: Decimal,
}
