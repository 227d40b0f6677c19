//! Run-over-run reconciliation of dashboard state against the stored snapshot.
//!
//! One run walks `Fetch -> Diff -> Decide -> Persist -> Notify -> Done`. An
//! exhausted fetch ends in `Failed` before anything is written.

use crate::error::{EarnWatchError, Result};
use crate::models::{
    BalanceDelta, BalanceSnapshot, DeviceSnapshot, Notification, PayoutRate, TransactionRecord,
    TransactionStatus,
};
use crate::services::messages::{self, TransactionNoticeKind};
use crate::services::{Notifier, RemoteClient, RetryPolicy, StateStore};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Fetch,
    Diff,
    Decide,
    Persist,
    Notify,
    Done,
    Failed,
}

/// Everything a run compares: remote state and the stored baseline.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub remote_balance: BalanceSnapshot,
    pub remote_devices: Vec<DeviceSnapshot>,
    pub remote_transactions: Vec<TransactionRecord>,
    pub stored_balance: Option<BalanceSnapshot>,
    pub stored_devices: Vec<DeviceSnapshot>,
    pub known_non_final: Vec<TransactionRecord>,
}

/// Bandwidth not yet credited and the cents it is worth, per display title.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleUsage {
    pub title: String,
    pub used_bytes: Decimal,
    pub earned_cents: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionChanges {
    pub new_approvals: Vec<TransactionRecord>,
    /// Remote versions of known transactions whose status moved.
    pub status_changes: Vec<TransactionRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diff {
    pub balance: BalanceDelta,
    pub traffic: Vec<TitleUsage>,
    pub transactions: TransactionChanges,
    pub device_count: usize,
}

impl Diff {
    pub fn compute(fetched: &Fetched) -> Self {
        Self {
            balance: BalanceDelta::between(fetched.stored_balance.as_ref(), &fetched.remote_balance),
            traffic: traffic_and_earnings(&fetched.remote_devices, &fetched.stored_devices),
            transactions: classify_transactions(
                &fetched.remote_transactions,
                &fetched.known_non_final,
            ),
            device_count: fetched.remote_devices.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionAction {
    None,
    InsertNew(Vec<TransactionRecord>),
    UpdateStatus(Vec<TransactionRecord>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub transactions: TransactionAction,
    pub transaction_notice: Option<Notification>,
    pub balance_summary: Notification,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: RunState,
    pub diff: Option<Diff>,
    pub failure: Option<String>,
    pub persistence_failures: usize,
    pub notifications_sent: usize,
}

/// Usage since the last run, grouped by title.
///
/// Stored devices are matched to remote ones by uuid and keep their stored
/// title; remote devices with no snapshot count in full under their own
/// title. A device renamed between runs can therefore show up twice.
pub fn traffic_and_earnings(
    remote: &[DeviceSnapshot],
    stored: &[DeviceSnapshot],
) -> Vec<TitleUsage> {
    let remote_by_id: HashMap<&str, &DeviceSnapshot> =
        remote.iter().map(|d| (d.uuid.as_str(), d)).collect();
    let stored_ids: HashSet<&str> = stored.iter().map(|d| d.uuid.as_str()).collect();

    let mut groups: BTreeMap<String, (Decimal, PayoutRate)> = BTreeMap::new();
    let mut fold = |title: &str, used: Decimal, rate: PayoutRate| {
        let entry = groups
            .entry(title.to_string())
            .or_insert((Decimal::ZERO, rate));
        entry.0 += used;
        entry.1 = rate;
    };

    for old in stored {
        let Some(current) = remote_by_id.get(old.uuid.as_str()) else {
            tracing::debug!("Device {} ({}) is no longer reported", old.uuid, old.title);
            continue;
        };
        fold(&old.title, current.bandwidth() - old.credited_bytes(), current.rate);
    }

    for fresh in remote.iter().filter(|d| !stored_ids.contains(d.uuid.as_str())) {
        tracing::info!("New device {} ({})", fresh.uuid, fresh.title);
        fold(&fresh.title, fresh.bandwidth(), fresh.rate);
    }

    for device in remote {
        tracing::debug!(
            device = %device.store_key(),
            rate = %device.rate,
            earned_cents = %device.earned_cents(),
            pending_bytes = %device.pending_bytes(),
            "device counters"
        );
    }

    groups
        .into_iter()
        .map(|(title, (used_bytes, rate))| TitleUsage {
            title,
            earned_cents: rate.earned_cents(used_bytes),
            used_bytes,
        })
        .collect()
}

pub fn classify_transactions(
    remote: &[TransactionRecord],
    known_non_final: &[TransactionRecord],
) -> TransactionChanges {
    let known: HashMap<&str, &TransactionRecord> = known_non_final
        .iter()
        .map(|t| (t.uuid.as_str(), t))
        .collect();
    let remote_by_id: HashMap<&str, &TransactionRecord> =
        remote.iter().map(|t| (t.uuid.as_str(), t)).collect();

    let new_approvals = remote
        .iter()
        .filter(|t| t.status == TransactionStatus::Approved)
        .filter(|t| !known.contains_key(t.uuid.as_str()))
        .cloned()
        .collect();

    let mut status_changes = Vec::new();
    for local in known_non_final {
        match remote_by_id.get(local.uuid.as_str()) {
            Some(current) if current.status != local.status => {
                status_changes.push((*current).clone());
            }
            Some(_) => {}
            None => tracing::warn!("Transaction {} is missing from the dashboard", local.uuid),
        }
    }

    TransactionChanges {
        new_approvals,
        status_changes,
    }
}

/// New approvals win over status changes; the balance summary is always sent.
pub fn decide(diff: &Diff, at: DateTime<Utc>) -> Decision {
    let changes = &diff.transactions;

    let (transactions, transaction_notice) = if !changes.new_approvals.is_empty() {
        (
            TransactionAction::InsertNew(changes.new_approvals.clone()),
            messages::transaction_notice(&changes.new_approvals, TransactionNoticeKind::NewRedeem),
        )
    } else if !changes.status_changes.is_empty() {
        (
            TransactionAction::UpdateStatus(changes.status_changes.clone()),
            messages::transaction_notice(
                &changes.status_changes,
                TransactionNoticeKind::StatusChanged,
            ),
        )
    } else {
        (TransactionAction::None, None)
    };

    Decision {
        transactions,
        transaction_notice,
        balance_summary: messages::balance_summary(
            &diff.balance,
            &diff.traffic,
            diff.device_count,
            at,
        ),
    }
}

pub struct Reconciler {
    remote: Arc<dyn RemoteClient>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
}

impl Reconciler {
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            remote,
            store,
            notifier,
            retry,
        }
    }

    /// Executes one run. Never fails: problems end up in the report and, for
    /// fetch failures, in a failure notification.
    pub async fn run(&self) -> RunReport {
        enter(RunState::Fetch);
        let fetched = match self.fetch().await {
            Ok(fetched) => fetched,
            Err(e) => return self.fail(e).await,
        };

        enter(RunState::Diff);
        let diff = Diff::compute(&fetched);
        tracing::info!(
            "Balance change {} ({} new approvals, {} status changes)",
            diff.balance.change,
            diff.transactions.new_approvals.len(),
            diff.transactions.status_changes.len()
        );

        enter(RunState::Decide);
        let decision = decide(&diff, Utc::now());

        enter(RunState::Persist);
        let persistence_failures = self.persist(&fetched, &decision).await;

        enter(RunState::Notify);
        let mut notifications_sent = 0;
        if let Some(notice) = &decision.transaction_notice {
            notifications_sent += self.notify(notice).await;
        }
        notifications_sent += self.notify(&decision.balance_summary).await;

        enter(RunState::Done);
        RunReport {
            state: RunState::Done,
            diff: Some(diff),
            failure: None,
            persistence_failures,
            notifications_sent,
        }
    }

    async fn fetch(&self) -> Result<Fetched> {
        let remote_balance = self
            .retry
            .run("fetch_balance", || self.remote.fetch_balance())
            .await?;
        let remote_devices = self
            .retry
            .run("fetch_devices", || self.remote.fetch_devices())
            .await?;
        let remote_transactions = self
            .retry
            .run("fetch_transactions", || self.remote.fetch_transactions())
            .await?;

        let stored_balance = self.store.get_balance(remote_balance.owner()).await?;
        let stored_devices = self.store.list_devices().await?;
        let known_non_final = self.store.list_non_final_transactions().await?;

        Ok(Fetched {
            remote_balance,
            remote_devices,
            remote_transactions,
            stored_balance,
            stored_devices,
            known_non_final,
        })
    }

    /// Returns the number of failed writes. Failures do not stop later
    /// writes; the next run diffs against whatever made it in.
    async fn persist(&self, fetched: &Fetched, decision: &Decision) -> usize {
        let mut failures = 0;

        match &decision.transactions {
            TransactionAction::InsertNew(records) => {
                if let Err(e) = self.store.insert_transactions(records).await {
                    tracing::error!("Failed to store new transactions: {}", e);
                    failures += 1;
                }
            }
            TransactionAction::UpdateStatus(records) => {
                for trx in records {
                    if let Err(e) = self
                        .store
                        .update_transaction_status(&trx.uuid, trx.status, trx.payment_date)
                        .await
                    {
                        tracing::error!("Failed to update transaction {}: {}", trx.uuid, e);
                        failures += 1;
                    }
                }
            }
            TransactionAction::None => {}
        }

        for device in &fetched.remote_devices {
            if let Err(e) = self.store.put_device(device).await {
                tracing::error!("Failed to store device {}: {}", device.store_key(), e);
                failures += 1;
            }
        }

        if let Err(e) = self.store.put_balance(&fetched.remote_balance).await {
            tracing::error!("Failed to store balance: {}", e);
            failures += 1;
        }

        failures
    }

    async fn notify(&self, notification: &Notification) -> usize {
        match self.notifier.send(notification).await {
            Ok(()) => 1,
            Err(e) => {
                tracing::warn!("Notification '{}' not delivered: {}", notification.title, e);
                0
            }
        }
    }

    async fn fail(&self, error: EarnWatchError) -> RunReport {
        let reason = if error.is_retry_exhausted() {
            "Cannot get information from Earnapp!!!"
        } else {
            "Cannot read the last snapshot from the store!!!"
        };
        tracing::error!("Reconciliation aborted: {}", error);

        enter(RunState::Failed);
        let notifications_sent = self.notify(&messages::failure_notice(reason)).await;

        RunReport {
            state: RunState::Failed,
            diff: None,
            failure: Some(error.to_string()),
            persistence_failures: 0,
            notifications_sent,
        }
    }
}

fn enter(state: RunState) {
    tracing::debug!(state = ?state, "reconciliation state");
}
