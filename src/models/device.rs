use crate::models::money::PayoutRate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Per-device counters as last seen on the dashboard.
///
/// Stored under (uuid, title), so one device can live under several titles
/// after a rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub uuid: String,
    #[serde(default)]
    pub appid: String,
    pub title: String,
    pub bw: u64,
    pub total_bw: u64,
    pub redeem_bw: u64,
    pub rate: PayoutRate,
    pub earned: Decimal,
    pub earned_total: Decimal,
    pub country: String,
    #[serde(default)]
    pub ips: Vec<IpAddr>,
}

impl DeviceSnapshot {
    pub fn store_key(&self) -> String {
        format!("{}|{}", self.uuid, self.title)
    }

    pub fn bandwidth(&self) -> Decimal {
        Decimal::from(self.bw)
    }

    pub fn earned_cents(&self) -> Decimal {
        self.rate.earned_cents(self.bandwidth())
    }

    pub fn pending_bytes(&self) -> Decimal {
        self.rate.pending_bytes(self.bandwidth())
    }

    /// Bandwidth already converted into money at this snapshot's rate. The
    /// next run measures new usage from here.
    pub fn credited_bytes(&self) -> Decimal {
        self.rate.credited_bytes(self.bandwidth())
    }
}
