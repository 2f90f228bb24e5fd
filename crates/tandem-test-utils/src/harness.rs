// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end sync testing.
//!
//! `TestHarness` assembles a [`SyncHub`] over either the in-memory store or
//! a temp SQLite database, and provides helpers to create users, pair them,
//! and open connections whose frames can be asserted on.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tandem_config::model::StorageConfig;
use tandem_core::{AccountStore, ConnectionId, IdentityStore, TandemError, User, UserId};
use tandem_storage::SqliteStore;
use tandem_sync::{FrameReceiver, RegistryLimits, ServerFrame, SyncHub};

use crate::memory_store::MemoryIdentityStore;

/// How long [`TestConnection::next_frame`] waits before giving up.
const FRAME_WAIT: Duration = Duration::from_millis(500);

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    limits: RegistryLimits,
    sqlite: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            limits: RegistryLimits::default(),
            sqlite: false,
        }
    }

    /// Per-connection outbound buffer.
    pub fn with_send_buffer(mut self, send_buffer: usize) -> Self {
        self.limits.send_buffer = send_buffer;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.limits.max_connections_per_user = max;
        self
    }

    /// Back the hub with a temp SQLite database instead of memory.
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    pub async fn build(self) -> Result<TestHarness, TandemError> {
        let (identity, accounts, memory, temp_dir): (
            Arc<dyn IdentityStore>,
            Arc<dyn AccountStore>,
            Option<Arc<MemoryIdentityStore>>,
            Option<tempfile::TempDir>,
        ) = if self.sqlite {
            let temp_dir = tempfile::TempDir::new().map_err(TandemError::storage)?;
            let store = SqliteStore::new(StorageConfig {
                database_path: temp_dir.path().join("test.db").to_string_lossy().into_owned(),
                wal_mode: true,
            });
            store.initialize().await?;
            let store = Arc::new(store);
            (store.clone(), store, None, Some(temp_dir))
        } else {
            let store = Arc::new(MemoryIdentityStore::new());
            (store.clone(), store.clone(), Some(store), None)
        };

        Ok(TestHarness {
            hub: SyncHub::with_limits(identity, self.limits),
            accounts,
            memory,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete sync environment for assertions.
pub struct TestHarness {
    pub hub: SyncHub,
    pub accounts: Arc<dyn AccountStore>,
    memory: Option<Arc<MemoryIdentityStore>>,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// In-memory harness with default limits.
    pub async fn new() -> Result<Self, TandemError> {
        Self::builder().build().await
    }

    /// The in-memory store, when the harness uses one.
    pub fn memory(&self) -> Option<&Arc<MemoryIdentityStore>> {
        self.memory.as_ref()
    }

    /// Create an active account `<name>@example.com` named `name`.
    pub async fn user(&self, name: &str) -> Result<User, TandemError> {
        let password = SecretString::from(format!("{name}-password"));
        self.accounts
            .create_user(&format!("{name}@example.com"), name, &password)
            .await
    }

    /// Pair `a` with `b` through the pairing service.
    pub async fn pair(&self, a: &User, b: &User) -> Result<(), TandemError> {
        self.hub.pairing.propose_or_join(&a.id, &b.email).await?;
        Ok(())
    }

    /// Register a connection for `user`, announcing presence if it is the
    /// first one, as the gateway does.
    pub async fn connect(&self, user: &User) -> Result<TestConnection, TandemError> {
        let id = ConnectionId::generate();
        let registration = self.hub.registry.register(&user.id, id.clone(), None).await?;
        self.hub
            .presence
            .connected(&user.id, registration.first_for_user)
            .await;
        Ok(TestConnection {
            id,
            user: user.id.clone(),
            receiver: registration.receiver,
        })
    }

    /// Unregister a connection and announce offline if it was the last.
    pub async fn disconnect(&self, conn: &TestConnection) {
        if let Some(gone) = self.hub.registry.unregister(&conn.id).await {
            self.hub
                .presence
                .disconnected(&gone.user, gone.last_for_user)
                .await;
        }
    }
}

/// A registered connection and the frames routed to it.
#[derive(Debug)]
pub struct TestConnection {
    pub id: ConnectionId,
    pub user: UserId,
    pub receiver: FrameReceiver,
}

impl TestConnection {
    /// Wait briefly for the next frame.
    pub async fn next_frame(&mut self) -> Option<ServerFrame> {
        tokio::time::timeout(FRAME_WAIT, self.receiver.recv())
            .await
            .ok()
            .flatten()
    }

    /// Everything queued right now, without waiting.
    pub fn drain(&mut self) -> Vec<ServerFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.receiver.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Names of the queued event frames, in order.
    pub fn drain_event_names(&mut self) -> Vec<String> {
        self.drain()
            .iter()
            .filter_map(|f| f.event_name().map(|n| n.as_str().to_string()))
            .collect()
    }
}
