//! The transport port every Hive driver implements.
//!
//! A driver physically moves message text between running instances of the
//! same application. The bus facade only ever talks to this trait, so the
//! protocol logic does not depend on which transport is installed.

use crate::listener::{ListenerId, MessageListener};

/// Capability set of a message transport.
///
/// Implementations must:
/// - never deliver a message back to the instance that sent it;
/// - invoke listeners in registration order, isolating each invocation;
/// - queue messages that arrive before the first listener registers;
/// - swallow transport failures instead of surfacing them from `send`.
pub trait HiveDriver: Send + Sync {
    /// Broadcast a message to every other instance. Fire-and-forget.
    fn send(&self, message: &str);

    /// Register a raw listener. It sees every non-self message, including
    /// protocol messages.
    fn add_listener(&self, listener: MessageListener) -> ListenerId;

    /// Unregister a listener. Returns `false` if it was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;

    /// Whether the driver is running and able to send and receive.
    fn is_enabled(&self) -> bool;

    /// Stop all background activity and release resources. Idempotent; no
    /// listener is invoked once this returns.
    fn shutdown(&self);

    /// Identity of this instance, stable for the driver's lifetime.
    fn instance_id(&self) -> &str;

    /// Human-readable transport name.
    fn name(&self) -> &str;
}
