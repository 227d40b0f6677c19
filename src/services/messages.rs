//! Human-readable renderings of a reconciliation run.

use crate::models::{
    bytes_to_megabytes, cents_to_usd, format_2dp, BalanceDelta, BalanceDirection, Color,
    Notification, TransactionRecord,
};
use crate::services::reconciler::TitleUsage;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub const FAILURE_TITLE: &str = "Earning Update Error 🤖";
pub const NEW_REDEEM_TITLE: &str = "New Redeem Request";
pub const STATUS_CHANGED_TITLE: &str = "Redeem Requests Status Changed!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionNoticeKind {
    NewRedeem,
    StatusChanged,
}

pub fn balance_summary(
    delta: &BalanceDelta,
    traffic: &[TitleUsage],
    device_count: usize,
    at: DateTime<Utc>,
) -> Notification {
    let change = format_2dp(delta.change);
    let balance = format_2dp(delta.current);
    let multiplier = format_2dp(delta.multiplier);

    let (title, color) = match delta.direction() {
        BalanceDirection::Increase => (
            format!("Balance [+{} → {}] ({})", change, balance, multiplier),
            Color::BALANCE_UP,
        ),
        BalanceDirection::Unchanged => (
            format!("Balance Unchanged! [{}] ({})", balance, multiplier),
            Color::BALANCE_UNCHANGED,
        ),
        // Upstream has been seen to take money back
        BalanceDirection::Decrease => (
            format!("Balance [{} → {}] ({})", change, balance, multiplier),
            Color::BALANCE_DOWN,
        ),
    };

    Notification::new(title, color)
        .field("Earned", signed_usd(delta.change))
        .field("Balance", balance)
        .field("Lifetime Balance", format_2dp(delta.earnings_total))
        .field("Traffic and Earnings", render_traffic(traffic))
        .field("Total Devices", device_count.to_string())
        .footer(format!("Version: {}", env!("CARGO_PKG_VERSION")))
        .timestamp(at)
}

fn signed_usd(amount: Decimal) -> String {
    if amount < Decimal::ZERO {
        format!("{}$", format_2dp(amount))
    } else {
        format!("+{}$", format_2dp(amount))
    }
}

/// One line per title: `title          :  2340.88MB| 0.58$`.
pub fn render_traffic(traffic: &[TitleUsage]) -> String {
    if traffic.is_empty() {
        return "No devices reported".to_string();
    }

    traffic
        .iter()
        .map(|row| {
            format!(
                "{:<15}: {:>8}MB|{:>5}$",
                row.title,
                format_2dp(bytes_to_megabytes(row.used_bytes)),
                format_2dp(cents_to_usd(row.earned_cents))
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `None` when there is nothing to report.
pub fn transaction_notice(
    transactions: &[TransactionRecord],
    kind: TransactionNoticeKind,
) -> Option<Notification> {
    let first = transactions.first()?;

    let (title, description) = match kind {
        TransactionNoticeKind::NewRedeem => (
            NEW_REDEEM_TITLE.to_string(),
            "New redeem request has been submitted",
        ),
        TransactionNoticeKind::StatusChanged => (
            format!("{}: {}", STATUS_CHANGED_TITLE, first.status),
            "Redeem request status updated.",
        ),
    };

    let mut notice = Notification::new(title, Color::REDEEM).description(description);
    for trx in transactions {
        notice = notice
            .field("UUID", trx.uuid.clone())
            .field("Amount", format!("+{}$", trx.money_amount))
            .field("Status", trx.status.to_string())
            .field("Redeem Date", trx.date.format("%Y-%m-%d").to_string());
    }

    Some(
        notice
            .field("Method", first.payment_method.clone())
            .field("Email", first.email.clone())
            .footer(format!(
                "Payment {} as on {} via {}",
                first.status,
                first.date.format("%Y-%m-%d"),
                first.payment_method
            )),
    )
}

pub fn failure_notice(reason: &str) -> Notification {
    Notification::new(FAILURE_TITLE, Color::FAILURE).description(reason)
}
