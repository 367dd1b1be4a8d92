//! Shared handles threaded through every scheduled task.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::api::{AccountsService, DepotsService};
use crate::auth::Session;
use crate::client::ComdirectClient;

/// Serializes API reads against token refresh.
///
/// Pollers hold the shared side for a whole cycle. The refresh task holds
/// the exclusive side while it swaps the token.
#[derive(Debug, Clone, Default)]
pub struct RefreshGuard {
    lock: Arc<RwLock<()>>,
}

impl RefreshGuard {
    /// Create a new guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared access for a poll cycle.
    pub async fn poll(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().await
    }

    /// Exclusive access for a refresh.
    pub async fn refresh(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().await
    }
}

/// The authenticated client, the session and the refresh guard.
///
/// Every scheduled task gets its own clone.
#[derive(Debug, Clone)]
pub struct AppContext {
    client: ComdirectClient,
    session: Session,
    refresh_guard: RefreshGuard,
}

impl AppContext {
    /// Bundle an authenticated client with its session.
    pub fn new(client: ComdirectClient, session: Session) -> Self {
        Self {
            client,
            session,
            refresh_guard: RefreshGuard::new(),
        }
    }

    /// The authenticated client.
    pub fn client(&self) -> &ComdirectClient {
        &self.client
    }

    /// The activated session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The guard shared by pollers and the refresh task.
    pub fn refresh_guard(&self) -> &RefreshGuard {
        &self.refresh_guard
    }

    /// Get the accounts service.
    pub fn accounts(&self) -> AccountsService {
        AccountsService::new(self.client.clone(), self.session.clone())
    }

    /// Get the depots service.
    pub fn depots(&self) -> DepotsService {
        DepotsService::new(self.client.clone(), self.session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pollers_share_refresh_excludes() {
        let guard = RefreshGuard::new();

        let first = guard.poll().await;
        let second = guard.poll().await;

        // refresh must wait for both poll cycles
        let blocked = tokio::time::timeout(Duration::from_millis(20), guard.refresh()).await;
        assert!(blocked.is_err());

        drop(first);
        drop(second);
        let exclusive = tokio::time::timeout(Duration::from_millis(20), guard.refresh()).await;
        assert!(exclusive.is_ok());
    }

    #[tokio::test]
    async fn test_clones_share_guard() {
        let guard = RefreshGuard::new();
        let clone = guard.clone();

        let _refresh = guard.refresh().await;
        let blocked = tokio::time::timeout(Duration::from_millis(20), clone.poll()).await;
        assert!(blocked.is_err());
    }
}
