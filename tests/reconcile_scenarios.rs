use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use earnwatch::error::{EarnWatchError, Result};
use earnwatch::models::{
    BalanceSnapshot, Color, DeviceSnapshot, Notification, PayoutRate, RedeemDetails,
    TransactionRecord, TransactionStatus,
};
use earnwatch::services::{
    InMemoryStore, Notifier, Reconciler, RemoteClient, RetryPolicy, RunState, StateStore,
};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const OWNER: &str = "owner@example.com";

struct ScriptedRemote {
    balance: BalanceSnapshot,
    devices: Vec<DeviceSnapshot>,
    transactions: Vec<TransactionRecord>,
    fail: bool,
    calls: AtomicU32,
}

impl ScriptedRemote {
    fn new(
        balance: BalanceSnapshot,
        devices: Vec<DeviceSnapshot>,
        transactions: Vec<TransactionRecord>,
    ) -> Self {
        Self {
            balance,
            devices,
            transactions,
            fail: false,
            calls: AtomicU32::new(0),
        }
    }

    fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::new(balance(Decimal::ZERO), Vec::new(), Vec::new())
        }
    }

    fn attempt<T: Clone>(&self, value: &T) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(EarnWatchError::Store("connection refused".to_string()))
        } else {
            Ok(value.clone())
        }
    }
}

#[async_trait]
impl RemoteClient for ScriptedRemote {
    async fn fetch_balance(&self) -> Result<BalanceSnapshot> {
        self.attempt(&self.balance)
    }

    async fn fetch_devices(&self) -> Result<Vec<DeviceSnapshot>> {
        self.attempt(&self.devices)
    }

    async fn fetch_transactions(&self) -> Result<Vec<TransactionRecord>> {
        self.attempt(&self.transactions)
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

struct BrokenNotifier;

#[async_trait]
impl Notifier for BrokenNotifier {
    async fn send(&self, _: &Notification) -> Result<()> {
        Err(EarnWatchError::Notification("webhook down".to_string()))
    }
}

/// Serves a fixed baseline and drops every write.
struct FrozenStore {
    baseline: InMemoryStore,
}

#[async_trait]
impl StateStore for FrozenStore {
    async fn get_balance(&self, owner: &str) -> Result<Option<BalanceSnapshot>> {
        self.baseline.get_balance(owner).await
    }

    async fn put_balance(&self, _: &BalanceSnapshot) -> Result<()> {
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<DeviceSnapshot>> {
        self.baseline.list_devices().await
    }

    async fn put_device(&self, _: &DeviceSnapshot) -> Result<()> {
        Ok(())
    }

    async fn list_non_final_transactions(&self) -> Result<Vec<TransactionRecord>> {
        self.baseline.list_non_final_transactions().await
    }

    async fn insert_transactions(&self, _: &[TransactionRecord]) -> Result<()> {
        Ok(())
    }

    async fn update_transaction_status(
        &self,
        _: &str,
        _: TransactionStatus,
        _: Option<DateTime<Utc>>,
    ) -> Result<()> {
        Ok(())
    }
}

fn balance(amount: Decimal) -> BalanceSnapshot {
    BalanceSnapshot {
        multiplier: Decimal::ONE,
        multiplier_icon: String::new(),
        multiplier_hint: String::new(),
        redeem_details: RedeemDetails {
            email: OWNER.to_string(),
            payment_method: "paypal.com".to_string(),
            min_redeem: Decimal::new(250, 2),
        },
        balance: amount,
        earnings_total: amount,
        ref_bonuses: Decimal::ZERO,
        ref_bonuses_total: Decimal::ZERO,
        promo_bonuses: Decimal::ZERO,
        promo_bonuses_total: Decimal::ZERO,
        referral_part: "10%".to_string(),
    }
}

fn device(uuid: &str, title: &str, bw: u64) -> DeviceSnapshot {
    DeviceSnapshot {
        uuid: uuid.to_string(),
        appid: "node_earnapp.com".to_string(),
        title: title.to_string(),
        bw,
        total_bw: bw,
        redeem_bw: 0,
        rate: PayoutRate::parse("$0.25/GB").unwrap(),
        earned: Decimal::ZERO,
        earned_total: Decimal::ZERO,
        country: "jp".to_string(),
        ips: Vec::new(),
    }
}

fn transaction(uuid: &str, status: TransactionStatus) -> TransactionRecord {
    TransactionRecord {
        uuid: uuid.to_string(),
        status,
        email: OWNER.to_string(),
        date: Utc.with_ymd_and_hms(2022, 3, 1, 9, 30, 0).unwrap(),
        payment_method: "paypal.com".to_string(),
        payment_date: None,
        money_amount: Decimal::new(510, 2),
        ref_bonuses_amount: Decimal::ZERO,
        promo_bonuses_amount: Decimal::ZERO,
    }
}

fn instant_retry() -> RetryPolicy {
    RetryPolicy::fixed(5, Duration::ZERO)
}

fn reconciler(
    remote: Arc<ScriptedRemote>,
    store: Arc<InMemoryStore>,
    notifier: Arc<dyn Notifier>,
) -> Reconciler {
    Reconciler::new(remote, store, notifier, instant_retry())
}

#[tokio::test]
async fn balance_increase_is_announced_and_persisted() {
    let store = Arc::new(InMemoryStore::new());
    store.put_balance(&balance(Decimal::new(1000, 2))).await.unwrap();

    let remote = Arc::new(ScriptedRemote::new(
        balance(Decimal::new(1200, 2)),
        vec![device("d1", "middle", 40_000_000)],
        Vec::new(),
    ));
    let notifier = Arc::new(RecordingNotifier::default());

    let report = reconciler(remote, store.clone(), notifier.clone()).run().await;

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.diff.unwrap().balance.change, Decimal::new(200, 2));

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].title.starts_with("Balance [+2.00 → 12.00]"));
    assert_eq!(sent[0].color, Color::BALANCE_UP);

    let stored = store.get_balance(OWNER).await.unwrap().unwrap();
    assert_eq!(stored.balance, Decimal::new(1200, 2));
    assert_eq!(store.list_devices().await.unwrap().len(), 1);
}

#[tokio::test]
async fn unchanged_balance_still_rewrites_snapshots() {
    let store = Arc::new(InMemoryStore::new());
    store.put_balance(&balance(Decimal::new(500, 2))).await.unwrap();
    store.put_device(&device("d1", "middle", 10_000_000)).await.unwrap();
    let writes_before = store.writes();

    let remote = Arc::new(ScriptedRemote::new(
        balance(Decimal::new(500, 2)),
        vec![device("d1", "middle", 30_000_000)],
        Vec::new(),
    ));
    let notifier = Arc::new(RecordingNotifier::default());

    let report = reconciler(remote, store.clone(), notifier.clone()).run().await;

    assert_eq!(report.state, RunState::Done);
    assert_eq!(store.writes(), writes_before + 2);
    assert_eq!(store.list_devices().await.unwrap()[0].bw, 30_000_000);
    assert!(notifier.sent()[0].title.starts_with("Balance Unchanged!"));
}

#[tokio::test]
async fn withdrawal_is_reported_not_rejected() {
    let store = Arc::new(InMemoryStore::new());
    store.put_balance(&balance(Decimal::new(1000, 2))).await.unwrap();

    let remote = Arc::new(ScriptedRemote::new(
        balance(Decimal::new(800, 2)),
        Vec::new(),
        Vec::new(),
    ));
    let notifier = Arc::new(RecordingNotifier::default());

    let report = reconciler(remote, store.clone(), notifier.clone()).run().await;

    assert_eq!(report.state, RunState::Done);
    let sent = notifier.sent();
    assert_eq!(sent[0].color, Color::BALANCE_DOWN);
    assert_eq!(sent[0].field_value("Earned"), Some("-2.00$"));
    let stored = store.get_balance(OWNER).await.unwrap().unwrap();
    assert_eq!(stored.balance, Decimal::new(800, 2));
}

#[tokio::test]
async fn new_approval_is_inserted_and_announced() {
    let store = Arc::new(InMemoryStore::new());
    store.put_balance(&balance(Decimal::new(510, 2))).await.unwrap();

    let remote = Arc::new(ScriptedRemote::new(
        balance(Decimal::ZERO),
        Vec::new(),
        vec![transaction("x", TransactionStatus::Approved)],
    ));
    let notifier = Arc::new(RecordingNotifier::default());

    let report = reconciler(remote, store.clone(), notifier.clone()).run().await;

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.notifications_sent, 2);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].title, "New Redeem Request");
    assert_eq!(sent[0].field_value("UUID"), Some("x"));
    assert!(sent[1].title.starts_with("Balance"));

    let stored = store.transaction("x").await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Approved);
}

#[tokio::test]
async fn approved_transaction_moving_to_paid_is_updated() {
    let store = Arc::new(InMemoryStore::new());
    store.put_balance(&balance(Decimal::ZERO)).await.unwrap();
    store
        .insert_transactions(&[transaction("y", TransactionStatus::Approved)])
        .await
        .unwrap();

    let paid_at = Utc.with_ymd_and_hms(2022, 3, 4, 12, 0, 0).unwrap();
    let mut paid = transaction("y", TransactionStatus::Paid);
    paid.payment_date = Some(paid_at);

    let remote = Arc::new(ScriptedRemote::new(
        balance(Decimal::ZERO),
        Vec::new(),
        vec![paid],
    ));
    let notifier = Arc::new(RecordingNotifier::default());

    let report = reconciler(remote, store.clone(), notifier.clone()).run().await;

    assert_eq!(report.state, RunState::Done);
    let sent = notifier.sent();
    assert_eq!(sent[0].title, "Redeem Requests Status Changed!: paid");

    let stored = store.transaction("y").await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Paid);
    assert_eq!(stored.payment_date, Some(paid_at));
    assert!(store.list_non_final_transactions().await.unwrap().is_empty());
}

#[tokio::test]
async fn unchanged_transactions_trigger_no_transaction_notice() {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert_transactions(&[transaction("z", TransactionStatus::PendingProcedure)])
        .await
        .unwrap();

    let remote = Arc::new(ScriptedRemote::new(
        balance(Decimal::ZERO),
        Vec::new(),
        vec![
            transaction("z", TransactionStatus::PendingProcedure),
            transaction("archived", TransactionStatus::Paid),
        ],
    ));
    let notifier = Arc::new(RecordingNotifier::default());

    reconciler(remote, store, notifier.clone()).run().await;

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].title.starts_with("Balance"));
}

#[tokio::test]
async fn exhausted_fetch_sends_one_failure_and_writes_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let remote = Arc::new(ScriptedRemote::unreachable());
    let notifier = Arc::new(RecordingNotifier::default());

    let report = reconciler(remote.clone(), store.clone(), notifier.clone())
        .run()
        .await;

    assert_eq!(report.state, RunState::Failed);
    assert!(report.diff.is_none());
    assert_eq!(remote.calls.load(Ordering::SeqCst), 5);
    assert_eq!(store.writes(), 0);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "Earning Update Error 🤖");
    assert_eq!(sent[0].color, Color::FAILURE);
}

#[tokio::test]
async fn notification_failure_does_not_fail_the_run() {
    let store = Arc::new(InMemoryStore::new());
    let remote = Arc::new(ScriptedRemote::new(
        balance(Decimal::new(100, 2)),
        vec![device("d1", "middle", 1)],
        vec![transaction("x", TransactionStatus::Approved)],
    ));

    let report = reconciler(remote, store.clone(), Arc::new(BrokenNotifier))
        .run()
        .await;

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.notifications_sent, 0);
    assert!(store.transaction("x").await.is_some());
    assert!(store.get_balance(OWNER).await.unwrap().is_some());
}

#[tokio::test]
async fn consecutive_runs_measure_from_the_new_baseline() {
    let store = Arc::new(InMemoryStore::new());
    store.put_balance(&balance(Decimal::ZERO)).await.unwrap();
    let notifier = Arc::new(RecordingNotifier::default());

    let first = Arc::new(ScriptedRemote::new(
        balance(Decimal::new(1, 2)),
        vec![device("d1", "middle", 50_000_000)],
        Vec::new(),
    ));
    let diff = reconciler(first, store.clone(), notifier.clone())
        .run()
        .await
        .diff
        .unwrap();
    let row = &diff.traffic[0];
    assert_eq!(row.used_bytes, Decimal::from(50_000_000u64));
    assert_eq!(row.earned_cents, Decimal::ONE);

    // 40 MB were credited; the 10 MB remainder carries over
    let second = Arc::new(ScriptedRemote::new(
        balance(Decimal::new(2, 2)),
        vec![device("d1", "middle", 80_000_000)],
        Vec::new(),
    ));
    let diff = reconciler(second, store.clone(), notifier.clone())
        .run()
        .await
        .diff
        .unwrap();
    let row = &diff.traffic[0];
    assert_eq!(row.used_bytes, Decimal::from(40_000_000u64));
    assert_eq!(row.earned_cents, Decimal::ONE);
}

#[tokio::test]
async fn rerun_without_persisting_yields_the_same_diff() {
    let baseline = InMemoryStore::new();
    baseline.put_balance(&balance(Decimal::new(1000, 2))).await.unwrap();
    baseline.put_device(&device("d1", "old-name", 40_000_000)).await.unwrap();
    baseline.put_device(&device("d2", "shrunk", 400_000_000)).await.unwrap();
    baseline
        .insert_transactions(&[transaction("y", TransactionStatus::Approved)])
        .await
        .unwrap();
    let store = Arc::new(FrozenStore { baseline });

    let remote = Arc::new(ScriptedRemote::new(
        balance(Decimal::new(1200, 2)),
        vec![
            device("d1", "new-name", 80_000_000),
            device("d2", "shrunk", 100_000_000),
        ],
        vec![
            transaction("x", TransactionStatus::Approved),
            transaction("y", TransactionStatus::Paid),
        ],
    ));
    let notifier = Arc::new(RecordingNotifier::default());
    let reconciler = Reconciler::new(remote, store, notifier, instant_retry());

    let first = reconciler.run().await;
    let second = reconciler.run().await;

    assert_eq!(first.state, RunState::Done);
    assert_eq!(second.state, RunState::Done);
    assert!(first.diff.is_some());
    assert_eq!(first.diff, second.diff);
}
