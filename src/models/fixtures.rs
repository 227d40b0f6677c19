//! Shared builders for unit tests.

use super::*;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

pub fn balance(email: &str, amount: Decimal) -> BalanceSnapshot {
    BalanceSnapshot {
        multiplier: Decimal::ONE,
        multiplier_icon: String::new(),
        multiplier_hint: String::new(),
        redeem_details: RedeemDetails {
            email: email.to_string(),
            payment_method: "paypal.com".to_string(),
            min_redeem: Decimal::new(250, 2),
        },
        balance: amount,
        earnings_total: amount,
        ref_bonuses: Decimal::ZERO,
        ref_bonuses_total: Decimal::ZERO,
        promo_bonuses: Decimal::ZERO,
        promo_bonuses_total: Decimal::ZERO,
        referral_part: "50%".to_string(),
    }
}

pub fn device(uuid: &str, title: &str, bw: u64, rate: &str) -> DeviceSnapshot {
    DeviceSnapshot {
        uuid: uuid.to_string(),
        appid: "node_earnapp.com".to_string(),
        title: title.to_string(),
        bw,
        total_bw: bw,
        redeem_bw: 0,
        rate: PayoutRate::parse(rate).unwrap(),
        earned: Decimal::ZERO,
        earned_total: Decimal::ZERO,
        country: "jp".to_string(),
        ips: vec!["218.225.136.137".parse().unwrap()],
    }
}

pub fn transaction(uuid: &str, status: TransactionStatus) -> TransactionRecord {
    TransactionRecord {
        uuid: uuid.to_string(),
        status,
        email: "owner@example.com".to_string(),
        date: Utc.with_ymd_and_hms(2022, 3, 1, 9, 30, 0).unwrap(),
        payment_method: "paypal.com".to_string(),
        payment_date: None,
        money_amount: Decimal::new(510, 2),
        ref_bonuses_amount: Decimal::ZERO,
        promo_bonuses_amount: Decimal::ZERO,
    }
}
