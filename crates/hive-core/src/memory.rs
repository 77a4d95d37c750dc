//! In-process transport.
//!
//! Drivers joined to the same `MemoryNetwork` behave like separate instances
//! sharing a message directory: a send reaches every other attached driver
//! synchronously on the sender's thread, and never the sender itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::delivery::Delivery;
use crate::driver::HiveDriver;
use crate::listener::{ListenerId, MessageListener};

/// Shared medium connecting [`MemoryDriver`]s.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    members: Arc<DashMap<String, Weak<MemoryDriver>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new driver with a fresh instance id.
    pub fn join(&self) -> Arc<MemoryDriver> {
        let driver = Arc::new(MemoryDriver {
            instance_id: Uuid::now_v7().to_string(),
            network: self.clone(),
            delivery: Delivery::new(),
            enabled: AtomicBool::new(true),
        });
        self.members
            .insert(driver.instance_id.clone(), Arc::downgrade(&driver));
        debug!(instance_id = %driver.instance_id, "memory driver joined network");
        driver
    }

    /// Number of drivers currently attached.
    pub fn member_count(&self) -> usize {
        self.members
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    fn broadcast(&self, sender: &str, message: &str) {
        // Collect first so no map guard is held while listeners run; a
        // listener may send again from inside the delivery.
        let mut recipients: Vec<Arc<MemoryDriver>> = Vec::new();
        let mut dropped: Vec<String> = Vec::new();
        for entry in self.members.iter() {
            match entry.value().upgrade() {
                Some(driver) if entry.key() != sender => recipients.push(driver),
                Some(_) => {}
                None => dropped.push(entry.key().clone()),
            }
        }
        // Drivers dropped without shutdown leave dead entries behind.
        for id in dropped {
            self.members.remove_if(&id, |_, member| member.strong_count() == 0);
            debug!(instance_id = %id, "pruned dropped memory driver");
        }
        for recipient in recipients {
            if recipient.is_enabled() {
                recipient.delivery.deliver(message.to_string());
            }
        }
    }

    fn leave(&self, instance_id: &str) {
        self.members.remove(instance_id);
    }
}

impl std::fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryNetwork")
            .field("members", &self.member_count())
            .finish()
    }
}

/// A driver attached to a [`MemoryNetwork`].
pub struct MemoryDriver {
    instance_id: String,
    network: MemoryNetwork,
    delivery: Delivery,
    enabled: AtomicBool,
}

impl HiveDriver for MemoryDriver {
    fn send(&self, message: &str) {
        if !self.is_enabled() {
            return;
        }
        self.network.broadcast(&self.instance_id, message);
    }

    fn add_listener(&self, listener: MessageListener) -> ListenerId {
        self.delivery.add_listener(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.delivery.remove_listener(id)
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        if self.enabled.swap(false, Ordering::AcqRel) {
            self.network.leave(&self.instance_id);
            debug!(instance_id = %self.instance_id, "memory driver shut down");
        }
        self.delivery.clear();
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn name(&self) -> &str {
        "Memory"
    }
}

impl std::fmt::Debug for MemoryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDriver")
            .field("instance_id", &self.instance_id)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
