//! The Hive bus context: one installed driver, user listeners and discovery.
//!
//! `Hive` is the single entry point application code talks to. It forwards
//! application messages to the installed driver and intercepts the ping/pong
//! protocol on the way in:
//!
//! - **Messaging:** `send` broadcasts to every other instance; `subscribe`
//!   registers a listener for non-protocol messages.
//! - **Discovery:** `ping_with` broadcasts a ping and blocks until the timeout
//!   elapses or the callback asks to stop; every instance answers pings with
//!   its id and its advertised properties.
//!
//! Construct one `Hive` in the application's composition root and share it by
//! cloning (clones refer to the same context).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use dashmap::DashMap;
use hive_types::pong::{PingControl, Pong};
use tracing::{debug, info};
use uuid::Uuid;

use crate::delivery::Delivery;
use crate::driver::HiveDriver;
use crate::listener::{ListenerId, listener};
use crate::ping::PingRound;
use crate::properties::{decode_properties, encode_properties};
use crate::protocol::{self, Frame};

/// Process-level bus context. Cheap to clone.
#[derive(Clone, Default)]
pub struct Hive {
    inner: Arc<HiveInner>,
}

#[derive(Default)]
struct HiveInner {
    /// Installed driver. The write lock doubles as the swap exclusion.
    installed: RwLock<Option<Installed>>,
    /// User listeners; never see protocol messages. Messages that arrive
    /// before the first subscription wait in its backlog.
    listeners: Delivery,
    /// Pending ping rounds keyed by ping id.
    pending: DashMap<String, Arc<PingRound>>,
    /// Properties advertised in pong responses.
    properties: RwLock<Arc<BTreeMap<String, String>>>,
}

struct Installed {
    driver: Arc<dyn HiveDriver>,
    dispatcher: Option<ListenerId>,
}

impl Hive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a driver, shutting down the previously installed one first.
    ///
    /// `None` detaches the current driver and disables messaging. Driver
    /// shutdown and listener registration happen outside the swap lock, since
    /// both may wait on or run user listeners.
    pub fn set_driver(&self, driver: Option<Arc<dyn HiveDriver>>) {
        let previous = {
            let mut slot = self
                .inner
                .installed
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if let (Some(current), Some(next)) = (slot.as_ref(), driver.as_ref()) {
                if same_driver(&current.driver, next) {
                    return;
                }
            }
            std::mem::replace(
                &mut *slot,
                driver.as_ref().map(|driver| Installed {
                    driver: Arc::clone(driver),
                    dispatcher: None,
                }),
            )
        };

        if let Some(previous) = previous {
            detach(previous);
        }

        let Some(driver) = driver else {
            info!("driver removed, messaging disabled");
            return;
        };

        let dispatcher = driver.add_listener(self.dispatcher_for(&driver));
        let mut slot = self
            .inner
            .installed
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match slot.as_mut() {
            Some(installed) if same_driver(&installed.driver, &driver) => {
                installed.dispatcher = Some(dispatcher);
                info!(
                    driver = driver.name(),
                    instance_id = driver.instance_id(),
                    "driver installed"
                );
            }
            _ => {
                // Another swap replaced this driver while we were attaching.
                drop(slot);
                driver.remove_listener(dispatcher);
            }
        }
    }

    /// The installed driver, if any.
    pub fn driver(&self) -> Option<Arc<dyn HiveDriver>> {
        self.inner
            .installed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|installed| Arc::clone(&installed.driver))
    }

    pub fn driver_name(&self) -> Option<String> {
        self.driver().map(|driver| driver.name().to_string())
    }

    /// This instance's id as known by the installed driver.
    pub fn instance_id(&self) -> Option<String> {
        self.driver().map(|driver| driver.instance_id().to_string())
    }

    /// True iff an enabled driver is installed.
    pub fn is_enabled(&self) -> bool {
        self.enabled_driver().is_some()
    }

    /// Broadcast a message to all other instances. No-op without an enabled
    /// driver.
    pub fn send(&self, message: &str) {
        if let Some(driver) = self.enabled_driver() {
            driver.send(message);
        }
    }

    /// Register a listener for application (non-protocol) messages.
    pub fn subscribe<F>(&self, on_message: F) -> ListenerId
    where
        F: Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.listeners.add_listener(listener(on_message))
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove_listener(id)
    }

    /// Replace the properties advertised in pong responses. An empty map
    /// clears them.
    pub fn set_instance_properties(&self, properties: BTreeMap<String, String>) {
        *self
            .inner
            .properties
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(properties);
    }

    /// Read-only view of the currently advertised properties.
    pub fn instance_properties(&self) -> Arc<BTreeMap<String, String>> {
        self.inner.properties()
    }

    /// Run a discovery round, blocking for up to `timeout`.
    ///
    /// `on_pong` is invoked for every response to this round until it returns
    /// [`PingControl::Stop`] (or panics), which ends the round early. Returns
    /// immediately when no enabled driver is installed.
    #[tracing::instrument(skip(self, on_pong), fields(ping_id = tracing::field::Empty))]
    pub fn ping_with<F>(&self, timeout: Duration, on_pong: F)
    where
        F: FnMut(&Pong) -> PingControl + Send + 'static,
    {
        let Some(driver) = self.enabled_driver() else {
            debug!("ping skipped, no enabled driver");
            return;
        };

        let ping_id = Uuid::now_v7().to_string();
        tracing::Span::current().record("ping_id", ping_id.as_str());

        let round = Arc::new(PingRound::new(Box::new(on_pong)));
        self.inner
            .pending
            .insert(ping_id.clone(), Arc::clone(&round));

        driver.send(&protocol::ping_message(&ping_id));
        let stopped_early = round.wait(timeout);

        self.inner.pending.remove(&ping_id);
        round.finish();
        debug!(stopped_early, "ping round finished");
    }

    /// Count the instances that answer within `timeout`. Always waits for the
    /// full timeout.
    pub fn ping(&self, timeout: Duration) -> usize {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        self.ping_with(timeout, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            PingControl::Continue
        });
        count.load(Ordering::SeqCst)
    }

    /// Whether any other instance answers within `timeout`. Returns as soon as
    /// the first one does.
    pub fn has_other_instances(&self, timeout: Duration) -> bool {
        let found = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&found);
        self.ping_with(timeout, move |_| {
            flag.store(true, Ordering::SeqCst);
            PingControl::Stop
        });
        found.load(Ordering::SeqCst)
    }

    /// Detach and shut down the driver, drop all listeners and queued
    /// messages, release every pending ping round and clear the advertised
    /// properties.
    pub fn shutdown(&self) {
        let previous = self
            .inner
            .installed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            detach(previous);
        }

        self.inner.listeners.clear();
        for round in self.inner.pending.iter() {
            round.value().finish();
        }
        self.inner.pending.clear();
        self.set_instance_properties(BTreeMap::new());
        info!("hive shut down");
    }

    fn enabled_driver(&self) -> Option<Arc<dyn HiveDriver>> {
        self.driver().filter(|driver| driver.is_enabled())
    }

    fn dispatcher_for(&self, driver: &Arc<dyn HiveDriver>) -> crate::listener::MessageListener {
        let inner = Arc::downgrade(&self.inner);
        let driver = Arc::downgrade(driver);
        listener(move |message| {
            if let Some(inner) = inner.upgrade() {
                inner.handle_message(message, &driver);
            }
            Ok(())
        })
    }
}

impl HiveInner {
    fn properties(&self) -> Arc<BTreeMap<String, String>> {
        Arc::clone(&self.properties.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Protocol dispatch for every message the driver delivers.
    fn handle_message(&self, message: &str, driver: &Weak<dyn HiveDriver>) {
        match protocol::parse(message) {
            Frame::Ping { ping_id } => self.answer_ping(ping_id, driver),
            Frame::Pong {
                ping_id,
                instance_id,
                properties,
            } => self.accept_pong(ping_id, instance_id, properties),
            Frame::MalformedPong => debug!("dropping malformed pong"),
            Frame::User(text) => self.listeners.deliver(text.to_string()),
        }
    }

    fn answer_ping(&self, ping_id: &str, driver: &Weak<dyn HiveDriver>) {
        let Some(driver) = driver.upgrade() else {
            return;
        };
        if !driver.is_enabled() {
            return;
        }
        let properties = self.properties();
        let pong = protocol::pong_message(
            ping_id,
            driver.instance_id(),
            &encode_properties(properties.iter()),
        );
        debug!(ping_id, "answering ping");
        driver.send(&pong);
    }

    fn accept_pong(&self, ping_id: &str, instance_id: &str, properties: &str) {
        // Clone the round out so no map guard is held while the callback runs.
        let Some(round) = self
            .pending
            .get(ping_id)
            .map(|entry| Arc::clone(entry.value()))
        else {
            debug!(ping_id, "pong for unknown or expired round");
            return;
        };
        let pong = Pong::new(instance_id, decode_properties(properties));
        round.deliver(&pong);
    }
}

fn detach(installed: Installed) {
    if let Some(dispatcher) = installed.dispatcher {
        installed.driver.remove_listener(dispatcher);
    }
    installed.driver.shutdown();
    info!(
        driver = installed.driver.name(),
        instance_id = installed.driver.instance_id(),
        "driver detached"
    );
}

fn same_driver(a: &Arc<dyn HiveDriver>, b: &Arc<dyn HiveDriver>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl std::fmt::Debug for Hive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hive")
            .field("driver", &self.driver_name())
            .field("listeners", &self.inner.listeners.listener_count())
            .field("pending_pings", &self.inner.pending.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
