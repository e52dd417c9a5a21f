//! Store change notifications, fanned out over broadcast channels.

use futures::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Default broadcast channel capacity.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Something changed in one of the client stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// Onboarding state changed (optimistically or after reconciliation).
    OnboardingChanged {
        current_step_id: Option<String>,
        pending_tasks: usize,
    },
    /// An optimistic onboarding change was undone.
    OnboardingRolledBack { operation: String, reason: String },
    /// Assets, liabilities or the summary changed.
    NetWorthChanged {
        assets: usize,
        liabilities: usize,
        stale: bool,
    },
    NetWorthRolledBack { operation: String, reason: String },
    /// Connected accounts or pending links changed.
    AccountsChanged {
        connected: usize,
        pending_links: usize,
    },
    AccountsRolledBack { operation: String, reason: String },
    /// Cached transactions or holdings for one account changed.
    AccountActivityChanged {
        account_id: String,
        transactions: usize,
        holdings: usize,
    },
}

impl StoreEvent {
    pub fn is_rollback(&self) -> bool {
        matches!(
            self,
            Self::OnboardingRolledBack { .. }
                | Self::NetWorthRolledBack { .. }
                | Self::AccountsRolledBack { .. }
        )
    }
}

/// `Stream` view of a receiver. Lagged gaps are logged and skipped.
pub fn event_stream(rx: broadcast::Receiver<StoreEvent>) -> impl Stream<Item = StoreEvent> {
    BroadcastStream::new(rx).filter_map(|item| async move {
        match item {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!("Event stream lagged: {}", e);
                None
            }
        }
    })
}
