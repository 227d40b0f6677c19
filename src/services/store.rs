use crate::error::{EarnWatchError, Result};
use crate::models::{BalanceSnapshot, DeviceSnapshot, TransactionRecord, TransactionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Last persisted snapshot. Every write is atomic on its own; nothing spans
/// record families.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_balance(&self, owner: &str) -> Result<Option<BalanceSnapshot>>;
    async fn put_balance(&self, snapshot: &BalanceSnapshot) -> Result<()>;

    async fn list_devices(&self) -> Result<Vec<DeviceSnapshot>>;
    /// Upsert keyed by (uuid, title).
    async fn put_device(&self, snapshot: &DeviceSnapshot) -> Result<()>;

    /// Transactions still pending or approved.
    async fn list_non_final_transactions(&self) -> Result<Vec<TransactionRecord>>;
    async fn insert_transactions(&self, records: &[TransactionRecord]) -> Result<()>;
    async fn update_transaction_status(
        &self,
        uuid: &str,
        status: TransactionStatus,
        payment_date: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

/// Redis layout:
/// - `{prefix}:balance:{email}` JSON string
/// - `{prefix}:devices` hash, field `{uuid}|{title}`
/// - `{prefix}:transactions` hash, field `{uuid}`
pub struct RedisStore {
    redis: redis::aio::ConnectionManager,
    prefix: String,
}

impl RedisStore {
    pub async fn connect(redis_url: &str, prefix: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let redis = client.get_connection_manager().await?;
        tracing::info!("Redis connected successfully");

        Ok(Self {
            redis,
            prefix: prefix.to_string(),
        })
    }

    fn balance_key(&self, owner: &str) -> String {
        balance_key(&self.prefix, owner)
    }

    fn devices_key(&self) -> String {
        devices_key(&self.prefix)
    }

    fn transactions_key(&self) -> String {
        transactions_key(&self.prefix)
    }

    pub async fn ping(&self) -> Result<()> {
        let mut redis = self.redis.clone();
        let reply: String = redis::cmd("PING").query_async(&mut redis).await?;
        expect_pong(&reply)
    }
}

fn expect_pong(reply: &str) -> Result<()> {
    if reply.eq_ignore_ascii_case("PONG") {
        Ok(())
    } else {
        Err(EarnWatchError::Store(format!("Unexpected PING reply: {}", reply)))
    }
}

fn balance_key(prefix: &str, owner: &str) -> String {
    format!("{}:balance:{}", prefix, owner)
}

fn devices_key(prefix: &str) -> String {
    format!("{}:devices", prefix)
}

fn transactions_key(prefix: &str) -> String {
    format!("{}:transactions", prefix)
}

#[async_trait]
impl StateStore for RedisStore {
    async fn get_balance(&self, owner: &str) -> Result<Option<BalanceSnapshot>> {
        let mut redis = self.redis.clone();
        let raw: Option<String> = redis.get(self.balance_key(owner)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => {
                tracing::info!("No stored balance for {}", owner);
                Ok(None)
            }
        }
    }

    async fn put_balance(&self, snapshot: &BalanceSnapshot) -> Result<()> {
        let mut redis = self.redis.clone();
        let json = serde_json::to_string(snapshot)?;
        redis
            .set::<_, _, ()>(self.balance_key(snapshot.owner()), json)
            .await?;
        tracing::debug!("Stored balance {} for {}", snapshot.balance, snapshot.owner());
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<DeviceSnapshot>> {
        let mut redis = self.redis.clone();
        let values: Vec<String> = redis.hvals(self.devices_key()).await?;
        decode_devices(&values)
    }

    async fn put_device(&self, snapshot: &DeviceSnapshot) -> Result<()> {
        let mut redis = self.redis.clone();
        let json = serde_json::to_string(snapshot)?;
        redis
            .hset::<_, _, _, ()>(self.devices_key(), snapshot.store_key(), json)
            .await?;
        Ok(())
    }

    async fn list_non_final_transactions(&self) -> Result<Vec<TransactionRecord>> {
        let mut redis = self.redis.clone();
        let values: Vec<String> = redis.hvals(self.transactions_key()).await?;
        decode_non_final(&values)
    }

    async fn insert_transactions(&self, records: &[TransactionRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let items = encode_transactions(records)?;

        let mut redis = self.redis.clone();
        redis
            .hset_multiple::<_, _, _, ()>(self.transactions_key(), items.as_slice())
            .await?;
        tracing::info!("Stored {} new transactions", records.len());
        Ok(())
    }

    async fn update_transaction_status(
        &self,
        uuid: &str,
        status: TransactionStatus,
        payment_date: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut redis = self.redis.clone();
        let key = self.transactions_key();
        let raw: Option<String> = redis.hget(&key, uuid).await?;
        let json = raw.ok_or_else(|| EarnWatchError::Store(format!("Unknown transaction {}", uuid)))?;

        let updated = restatus(&json, status, payment_date)?;

        redis.hset::<_, _, _, ()>(&key, uuid, updated).await?;
        tracing::info!("Transaction {} is now {}", uuid, status);
        Ok(())
    }
}

fn decode_devices(values: &[String]) -> Result<Vec<DeviceSnapshot>> {
    values
        .iter()
        .map(|json| serde_json::from_str(json).map_err(EarnWatchError::from))
        .collect()
}

/// Decodes transaction hash values, keeping those still pending or approved.
fn decode_non_final(values: &[String]) -> Result<Vec<TransactionRecord>> {
    let mut records = Vec::with_capacity(values.len());
    for json in values {
        let record: TransactionRecord = serde_json::from_str(json)?;
        if !record.status.is_final() {
            records.push(record);
        }
    }
    Ok(records)
}

/// `(field, value)` pairs for `HSET`, keyed by transaction uuid.
fn encode_transactions(records: &[TransactionRecord]) -> Result<Vec<(String, String)>> {
    records
        .iter()
        .map(|record| -> Result<(String, String)> {
            Ok((record.uuid.clone(), serde_json::to_string(record)?))
        })
        .collect()
}

fn restatus(
    json: &str,
    status: TransactionStatus,
    payment_date: Option<DateTime<Utc>>,
) -> Result<String> {
    let mut record: TransactionRecord = serde_json::from_str(json)?;
    apply_status(&mut record, status, payment_date);
    Ok(serde_json::to_string(&record)?)
}

/// Completion date is only overwritten when a new one is known.
fn apply_status(
    record: &mut TransactionRecord,
    status: TransactionStatus,
    payment_date: Option<DateTime<Utc>>,
) {
    record.status = status;
    if payment_date.is_some() {
        record.payment_date = payment_date;
    }
}

/// Process-local store with the same semantics as [`RedisStore`]. Counts
/// writes so callers can tell whether a run touched it.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    balances: RwLock<HashMap<String, BalanceSnapshot>>,
    devices: RwLock<BTreeMap<String, DeviceSnapshot>>,
    transactions: RwLock<BTreeMap<String, TransactionRecord>>,
    writes: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn transaction(&self, uuid: &str) -> Option<TransactionRecord> {
        self.transactions.read().await.get(uuid).cloned()
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn get_balance(&self, owner: &str) -> Result<Option<BalanceSnapshot>> {
        Ok(self.balances.read().await.get(owner).cloned())
    }

    async fn put_balance(&self, snapshot: &BalanceSnapshot) -> Result<()> {
        self.balances
            .write()
            .await
            .insert(snapshot.owner().to_string(), snapshot.clone());
        self.record_write();
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<DeviceSnapshot>> {
        Ok(self.devices.read().await.values().cloned().collect())
    }

    async fn put_device(&self, snapshot: &DeviceSnapshot) -> Result<()> {
        self.devices
            .write()
            .await
            .insert(snapshot.store_key(), snapshot.clone());
        self.record_write();
        Ok(())
    }

    async fn list_non_final_transactions(&self) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .transactions
            .read()
            .await
            .values()
            .filter(|t| !t.status.is_final())
            .cloned()
            .collect())
    }

    async fn insert_transactions(&self, records: &[TransactionRecord]) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        for record in records {
            transactions.insert(record.uuid.clone(), record.clone());
        }
        self.record_write();
        Ok(())
    }

    async fn update_transaction_status(
        &self,
        uuid: &str,
        status: TransactionStatus,
        payment_date: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        let record = transactions
            .get_mut(uuid)
            .ok_or_else(|| EarnWatchError::Store(format!("Unknown transaction {}", uuid)))?;
        apply_status(record, status, payment_date);
        self.record_write();
        Ok(())
    }
}
