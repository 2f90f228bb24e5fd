// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection registry: live connections, their owners, and group membership.
//!
//! Three indexes are kept in [`DashMap`]s:
//! - connection handle -> entry (owner, groups, outbound sender)
//! - group -> set of connection handles
//! - user -> set of connection handles
//!
//! Membership is always derived from the identity store's `partner_id` under a
//! per-user async mutex, held across the partner read and the membership
//! write. A registration racing a pairing change therefore either runs before
//! the recompute (and is corrected by it) or after it (and reads the new
//! partner). Shard guards are never held across an `.await`, and when two
//! maps are touched the order is always connections, then groups, then users.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tandem_config::model::RealtimeConfig;
use tandem_core::{
    AuthRejection, ConnectionId, GroupId, IdentityStore, TandemError, TokenLookup, UserId,
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

use crate::frame::ServerFrame;
use crate::locks::KeyedLocks;

/// Receiving half handed to the transport for one connection.
pub type FrameReceiver = mpsc::Receiver<ServerFrame>;

/// Sizing limits for the registry.
#[derive(Debug, Clone, Copy)]
pub struct RegistryLimits {
    /// Outbound frames buffered per connection before delivery drops.
    pub send_buffer: usize,
    /// Live connections allowed per user.
    pub max_connections_per_user: usize,
}

impl From<&RealtimeConfig> for RegistryLimits {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            send_buffer: config.send_buffer,
            max_connections_per_user: config.max_connections_per_user,
        }
    }
}

impl Default for RegistryLimits {
    fn default() -> Self {
        (&RealtimeConfig::default()).into()
    }
}

struct Entry {
    user: UserId,
    token_id: Option<String>,
    groups: HashSet<GroupId>,
    /// `None` once the connection has been told to disconnect.
    sender: Option<mpsc::Sender<ServerFrame>>,
    established_at: DateTime<Utc>,
}

/// Point-in-time view of a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub user: UserId,
    pub token_id: Option<String>,
    pub groups: HashSet<GroupId>,
    pub established_at: DateTime<Utc>,
}

impl Connection {
    fn from_entry(id: &ConnectionId, entry: &Entry) -> Self {
        Self {
            id: id.clone(),
            user: entry.user.clone(),
            token_id: entry.token_id.clone(),
            groups: entry.groups.clone(),
            established_at: entry.established_at,
        }
    }
}

/// Result of a successful registration.
#[derive(Debug)]
pub struct Registration {
    pub connection: Connection,
    /// Frames routed to this connection.
    pub receiver: FrameReceiver,
    /// True when this is the user's only live connection.
    pub first_for_user: bool,
}

/// Result of removing a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unregistration {
    pub user: UserId,
    /// True when the user has no live connections left.
    pub last_for_user: bool,
}

/// Outcome of handing one frame to one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The connection's buffer is full.
    Full,
    /// The receiver is gone or the connection is shutting down.
    Closed,
    /// No such connection.
    Unknown,
}

/// Tracks live, authenticated connections and their broadcast groups.
pub struct ConnectionRegistry {
    identity: Arc<dyn IdentityStore>,
    limits: RegistryLimits,
    connections: DashMap<ConnectionId, Entry>,
    groups: DashMap<GroupId, HashSet<ConnectionId>>,
    by_user: DashMap<UserId, HashSet<ConnectionId>>,
    user_locks: KeyedLocks<UserId>,
}

impl ConnectionRegistry {
    pub fn new(identity: Arc<dyn IdentityStore>, limits: RegistryLimits) -> Self {
        Self {
            identity,
            limits,
            connections: DashMap::new(),
            groups: DashMap::new(),
            by_user: DashMap::new(),
            user_locks: KeyedLocks::new(),
        }
    }

    /// Register a freshly authenticated connection for `user`.
    ///
    /// Joins `user:<user>` and, if the store currently reports a partner,
    /// `user:<partner>`. Fails with [`TandemError::TooManyConnections`] when
    /// the user is at the configured limit, and with a storage error if the
    /// partner cannot be read; in both cases nothing is registered.
    pub async fn register(
        &self,
        user: &UserId,
        handle: ConnectionId,
        token_id: Option<String>,
    ) -> Result<Registration, TandemError> {
        let guard = self.user_locks.lock(user).await;
        let result = self.register_locked(user, handle, token_id).await;
        drop(guard);
        if result.is_err() {
            self.release_idle_lock(user);
        }
        result
    }

    /// Register a connection that authenticated with `token`, then resolve
    /// the token once more.
    ///
    /// A logout or deactivation that commits after the handshake but before
    /// the connection is visible to [`disconnect_token`](Self::disconnect_token)
    /// or [`disconnect_user`](Self::disconnect_user) is caught by the second
    /// lookup; one that commits later finds the connection registered. On a
    /// withdrawn credential the connection is removed again and the matching
    /// [`AuthRejection`] is returned.
    pub async fn register_session(
        &self,
        user: &UserId,
        handle: ConnectionId,
        token: &str,
        token_id: &str,
    ) -> Result<Registration, TandemError> {
        let registration = self
            .register(user, handle.clone(), Some(token_id.to_string()))
            .await?;

        let rejection = match self.identity.resolve_token(token).await {
            Ok(TokenLookup::Valid { .. }) => return Ok(registration),
            Ok(TokenLookup::Inactive(_)) => AuthRejection::InactiveUser,
            Ok(_) => AuthRejection::InvalidToken,
            Err(e) => {
                self.unregister(&handle).await;
                return Err(e);
            }
        };
        self.unregister(&handle).await;
        info!(
            user_id = %user,
            connection_id = %handle,
            reason = rejection.reason(),
            "credential withdrawn during registration"
        );
        Err(rejection.into())
    }

    async fn register_locked(
        &self,
        user: &UserId,
        handle: ConnectionId,
        token_id: Option<String>,
    ) -> Result<Registration, TandemError> {
        let existing = self.by_user.get(user).map(|set| set.len()).unwrap_or(0);
        if existing >= self.limits.max_connections_per_user {
            return Err(TandemError::TooManyConnections {
                user: user.to_string(),
                limit: self.limits.max_connections_per_user,
            });
        }
        if self.connections.contains_key(&handle) {
            return Err(TandemError::Internal(format!(
                "connection {handle} is already registered"
            )));
        }

        let partner = self.identity.partner_of(user).await?;
        let groups = membership_for(user, partner.as_ref());

        let (tx, rx) = mpsc::channel(self.limits.send_buffer.max(1));
        let entry = Entry {
            user: user.clone(),
            token_id,
            groups: groups.clone(),
            sender: Some(tx),
            established_at: Utc::now(),
        };
        let connection = Connection::from_entry(&handle, &entry);
        self.connections.insert(handle.clone(), entry);
        for group in &groups {
            self.groups
                .entry(group.clone())
                .or_default()
                .insert(handle.clone());
        }
        let first_for_user = {
            let mut owned = self.by_user.entry(user.clone()).or_default();
            owned.insert(handle.clone());
            owned.len() == 1
        };

        info!(
            user_id = %user,
            connection_id = %handle,
            partner_id = ?partner.as_ref().map(UserId::as_str),
            "connection registered"
        );
        Ok(Registration {
            connection,
            receiver: rx,
            first_for_user,
        })
    }

    /// Remove a connection from every group it belongs to.
    ///
    /// Returns `None` if the handle is not registered, so duplicate
    /// disconnect signals are harmless.
    pub async fn unregister(&self, handle: &ConnectionId) -> Option<Unregistration> {
        let user = self.connections.get(handle)?.user.clone();
        let guard = self.user_locks.lock(&user).await;

        let (_, entry) = self.connections.remove(handle)?;
        for group in &entry.groups {
            self.leave_group(group, handle);
        }
        let last_for_user = {
            let mut now_empty = false;
            if let Some(mut owned) = self.by_user.get_mut(&user) {
                owned.remove(handle);
                now_empty = owned.is_empty();
            }
            if now_empty {
                self.by_user.remove_if(&user, |_, set| set.is_empty());
            }
            !self.by_user.contains_key(&user)
        };

        drop(guard);
        if last_for_user {
            self.release_idle_lock(&user);
        }
        info!(
            user_id = %user,
            connection_id = %handle,
            last_for_user,
            "connection unregistered"
        );
        Some(Unregistration {
            user,
            last_for_user,
        })
    }

    /// Re-derive group membership for every live connection of `user` from
    /// the current `partner_id`. Returns the number of connections updated.
    pub async fn recompute_membership(&self, user: &UserId) -> Result<usize, TandemError> {
        let guard = self.user_locks.lock(user).await;
        let result = self.recompute_locked(user).await;
        drop(guard);
        self.release_idle_lock(user);
        result
    }

    async fn recompute_locked(&self, user: &UserId) -> Result<usize, TandemError> {
        let partner = self.identity.partner_of(user).await?;
        let desired = membership_for(user, partner.as_ref());
        let handles = self.connections_of_user(user);

        let mut updated = 0;
        for handle in &handles {
            let previous = match self.connections.get_mut(handle) {
                Some(mut entry) => std::mem::replace(&mut entry.groups, desired.clone()),
                None => continue,
            };
            for group in previous.difference(&desired) {
                self.leave_group(group, handle);
            }
            for group in desired.difference(&previous) {
                self.groups
                    .entry(group.clone())
                    .or_default()
                    .insert(handle.clone());
            }
            updated += 1;
        }

        debug!(
            user_id = %user,
            partner_id = ?partner.as_ref().map(UserId::as_str),
            connections = updated,
            "membership recomputed"
        );
        Ok(updated)
    }

    /// All live connections in `group`.
    pub fn connections_in_group(&self, group: &GroupId) -> HashSet<ConnectionId> {
        self.groups
            .get(group)
            .map(|set| set.clone())
            .unwrap_or_default()
    }

    /// All live connections owned by `user`.
    pub fn connections_of_user(&self, user: &UserId) -> HashSet<ConnectionId> {
        self.by_user
            .get(user)
            .map(|set| set.clone())
            .unwrap_or_default()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn owner_of(&self, handle: &ConnectionId) -> Option<UserId> {
        self.connections.get(handle).map(|entry| entry.user.clone())
    }

    pub fn snapshot(&self, handle: &ConnectionId) -> Option<Connection> {
        self.connections
            .get(handle)
            .map(|entry| Connection::from_entry(handle, &entry))
    }

    /// Hand a frame to one connection without waiting.
    pub fn try_send(&self, handle: &ConnectionId, frame: ServerFrame) -> SendOutcome {
        let Some(entry) = self.connections.get(handle) else {
            return SendOutcome::Unknown;
        };
        let Some(sender) = &entry.sender else {
            return SendOutcome::Closed;
        };
        match sender.try_send(frame) {
            Ok(()) => SendOutcome::Delivered,
            Err(TrySendError::Full(_)) => SendOutcome::Full,
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Tell every connection of `user` to go away. Returns how many were
    /// signalled. The transport notices the closed channel and unregisters.
    pub fn disconnect_user(&self, user: &UserId, reason: &str) -> usize {
        let handles = self.connections_of_user(user);
        let count = handles
            .iter()
            .filter(|handle| self.close_connection(handle, reason))
            .count();
        if count > 0 {
            info!(user_id = %user, reason, connections = count, "disconnecting user");
        }
        count
    }

    /// Tell every connection authenticated with `token_id` to go away.
    pub fn disconnect_token(&self, token_id: &str, reason: &str) -> usize {
        let handles: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|entry| entry.token_id.as_deref() == Some(token_id))
            .map(|entry| entry.key().clone())
            .collect();
        let count = handles
            .iter()
            .filter(|handle| self.close_connection(handle, reason))
            .count();
        if count > 0 {
            info!(reason, connections = count, "disconnecting token");
        }
        count
    }

    /// Tell every live connection to go away.
    pub fn disconnect_all(&self, reason: &str) -> usize {
        let handles: Vec<ConnectionId> =
            self.connections.iter().map(|e| e.key().clone()).collect();
        handles
            .iter()
            .filter(|handle| self.close_connection(handle, reason))
            .count()
    }

    /// Queue a disconnect frame and drop the sender so the receiver drains
    /// and then ends.
    fn close_connection(&self, handle: &ConnectionId, reason: &str) -> bool {
        let Some(mut entry) = self.connections.get_mut(handle) else {
            return false;
        };
        let Some(sender) = entry.sender.take() else {
            return false;
        };
        if sender.try_send(ServerFrame::disconnect(reason)).is_err() {
            debug!(connection_id = %handle, "disconnect frame not queued");
        }
        true
    }

    /// Drop `user`'s lock entry once they have no live connections.
    fn release_idle_lock(&self, user: &UserId) {
        if !self.by_user.contains_key(user) {
            self.user_locks.release(user);
        }
    }

    fn leave_group(&self, group: &GroupId, handle: &ConnectionId) {
        if let Some(mut members) = self.groups.get_mut(group) {
            members.remove(handle);
        }
        self.groups.remove_if(group, |_, members| members.is_empty());
    }
}

/// Own group always; partner group iff a partner exists.
fn membership_for(user: &UserId, partner: Option<&UserId>) -> HashSet<GroupId> {
    let mut groups = HashSet::with_capacity(2);
    groups.insert(GroupId::for_user(user));
    if let Some(partner) = partner {
        groups.insert(GroupId::for_user(partner));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_own_plus_partner() {
        let a = UserId::from("a");
        let b = UserId::from("b");
        let solo = membership_for(&a, None);
        assert_eq!(solo.len(), 1);
        assert!(solo.contains(&GroupId::for_user(&a)));

        let paired = membership_for(&a, Some(&b));
        assert_eq!(paired.len(), 2);
        assert!(paired.contains(&GroupId::for_user(&b)));
    }

    #[tokio::test]
    async fn user_locks_are_released_when_idle() {
        let store = Arc::new(tandem_test_utils::MemoryIdentityStore::new());
        let alice = store.insert_user("alice@example.com", "alice");
        let registry = ConnectionRegistry::new(
            store.clone(),
            RegistryLimits {
                send_buffer: 4,
                max_connections_per_user: 1,
            },
        );

        registry.recompute_membership(&alice.id).await.unwrap();
        assert_eq!(registry.user_locks.len(), 0);

        let _live = registry
            .register(&alice.id, ConnectionId::from("c1"), None)
            .await
            .unwrap();
        let over_limit = registry
            .register(&alice.id, ConnectionId::from("c2"), None)
            .await;
        assert!(over_limit.is_err());
        assert_eq!(registry.user_locks.len(), 1);

        registry.unregister(&ConnectionId::from("c1")).await.unwrap();
        assert_eq!(registry.user_locks.len(), 0);

        store.set_unavailable(true);
        assert!(
            registry
                .register(&alice.id, ConnectionId::from("c3"), None)
                .await
                .is_err()
        );
        assert!(registry.recompute_membership(&alice.id).await.is_err());
        assert_eq!(registry.user_locks.len(), 0);
    }

    #[test]
    fn limits_follow_config() {
        let config = RealtimeConfig {
            send_buffer: 3,
            max_connections_per_user: 2,
            ..RealtimeConfig::default()
        };
        let limits = RegistryLimits::from(&config);
        assert_eq!(limits.send_buffer, 3);
        assert_eq!(limits.max_connections_per_user, 2);
    }
}
