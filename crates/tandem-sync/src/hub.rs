// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-stop wiring of registry, router, pairing, and presence over a shared
//! identity store.

use std::sync::Arc;

use tandem_config::model::RealtimeConfig;
use tandem_core::IdentityStore;

use crate::emitter::{Domain, DomainEmitter};
use crate::pairing::PairingService;
use crate::presence::PresenceSignals;
use crate::registry::{ConnectionRegistry, RegistryLimits};
use crate::router::EventRouter;

/// Shared handles to every sync component. Cheap to clone.
#[derive(Clone)]
pub struct SyncHub {
    pub identity: Arc<dyn IdentityStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub router: Arc<EventRouter>,
    pub pairing: Arc<PairingService>,
    pub presence: Arc<PresenceSignals>,
}

impl SyncHub {
    pub fn new(identity: Arc<dyn IdentityStore>, config: &RealtimeConfig) -> Self {
        Self::with_limits(identity, RegistryLimits::from(config))
    }

    pub fn with_limits(identity: Arc<dyn IdentityStore>, limits: RegistryLimits) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(Arc::clone(&identity), limits));
        let router = Arc::new(EventRouter::new(
            Arc::clone(&identity),
            Arc::clone(&registry),
        ));
        let pairing = Arc::new(PairingService::new(
            Arc::clone(&identity),
            Arc::clone(&registry),
            Arc::clone(&router),
        ));
        let presence = Arc::new(PresenceSignals::new(Arc::clone(&router)));
        Self {
            identity,
            registry,
            router,
            pairing,
            presence,
        }
    }

    /// An emitter for one business feature.
    pub fn emitter(&self, domain: Domain) -> DomainEmitter {
        DomainEmitter::new(domain, Arc::clone(&self.router))
    }
}
