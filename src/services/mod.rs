pub mod earnapp;
pub mod messages;
pub mod notifier;
pub mod reconciler;
pub mod retry;
pub mod store;

pub use earnapp::{EarnAppClient, RemoteClient};
pub use notifier::{DiscordNotifier, Notifier};
pub use reconciler::{Reconciler, RunReport, RunState};
pub use retry::RetryPolicy;
pub use store::{InMemoryStore, RedisStore, StateStore};
