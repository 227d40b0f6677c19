use crate::error::{EarnWatchError, Result};
use crate::models::{BalanceSnapshot, DeviceSnapshot, PayoutRate, TransactionRecord};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::net::IpAddr;

const APP_ID: &str = "earnapp_dashboard";

/// Read access to the dashboard. One call is one attempt; retrying is the
/// caller's job.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn fetch_balance(&self) -> Result<BalanceSnapshot>;
    async fn fetch_devices(&self) -> Result<Vec<DeviceSnapshot>>;
    async fn fetch_transactions(&self) -> Result<Vec<TransactionRecord>>;
}

pub struct EarnAppClient {
    client: reqwest::Client,
    base_url: String,
}

impl EarnAppClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let cookie = format!(
            "auth=1; auth-method=google; oauth-refresh-token={}",
            token
        );
        let mut cookie = HeaderValue::from_str(&cookie)
            .map_err(|e| EarnWatchError::ConfigError(format!("Invalid token: {}", e)))?;
        cookie.set_sensitive(true);
        headers.insert(COOKIE, cookie);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("appid", APP_ID)])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

#[async_trait]
impl RemoteClient for EarnAppClient {
    async fn fetch_balance(&self) -> Result<BalanceSnapshot> {
        let money: BalanceSnapshot = self.get_json("money").await?;
        tracing::info!(
            "Dashboard balance for {}: {} (x{})",
            money.owner(),
            money.balance,
            money.multiplier
        );
        Ok(money)
    }

    async fn fetch_devices(&self) -> Result<Vec<DeviceSnapshot>> {
        let wire: Vec<WireDevice> = self.get_json("devices").await?;
        let devices = wire
            .into_iter()
            .map(DeviceSnapshot::try_from)
            .collect::<Result<Vec<_>>>()?;
        tracing::info!("Dashboard reports {} devices", devices.len());
        Ok(devices)
    }

    async fn fetch_transactions(&self) -> Result<Vec<TransactionRecord>> {
        let transactions: Vec<TransactionRecord> = self.get_json("transactions").await?;
        tracing::info!("Dashboard reports {} transactions", transactions.len());
        Ok(transactions)
    }
}

/// Device as the dashboard sends it. The rate has been both a number and a
/// display string such as `$0.25/GB`.
#[derive(Debug, Deserialize)]
struct WireDevice {
    uuid: String,
    #[serde(default)]
    appid: Option<String>,
    title: String,
    bw: u64,
    total_bw: u64,
    redeem_bw: u64,
    rate: WireRate,
    earned: Decimal,
    earned_total: Decimal,
    country: String,
    #[serde(default)]
    ips: Vec<IpAddr>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireRate {
    Text(String),
    Number(Decimal),
}

impl TryFrom<WireRate> for PayoutRate {
    type Error = EarnWatchError;

    fn try_from(rate: WireRate) -> Result<Self> {
        match rate {
            WireRate::Text(text) => PayoutRate::parse(&text),
            WireRate::Number(value) => PayoutRate::new(value),
        }
    }
}

impl TryFrom<WireDevice> for DeviceSnapshot {
    type Error = EarnWatchError;

    fn try_from(wire: WireDevice) -> Result<Self> {
        Ok(DeviceSnapshot {
            rate: PayoutRate::try_from(wire.rate)?,
            uuid: wire.uuid,
            appid: wire.appid.unwrap_or_default(),
            title: wire.title,
            bw: wire.bw,
            total_bw: wire.total_bw,
            redeem_bw: wire.redeem_bw,
            earned: wire.earned,
            earned_total: wire.earned_total,
            country: wire.country,
            ips: wire.ips,
        })
    }
}
