//! Listener fan-out with an undelivered-message queue.
//!
//! Messages that arrive before anyone subscribed are held back and handed, in
//! arrival order, to the first listener registration. Transports embed a
//! `Delivery` instead of managing listeners themselves.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::listener::{ListenerId, ListenerRegistry, MessageListener};

pub struct Delivery {
    listeners: ListenerRegistry,
    undelivered: Mutex<Backlog>,
}

#[derive(Default)]
struct Backlog {
    messages: VecDeque<String>,
    /// Set while one thread drains the backlog; live messages queue behind it.
    flushing: bool,
}

impl Delivery {
    pub fn new() -> Self {
        Self {
            listeners: ListenerRegistry::new(),
            undelivered: Mutex::new(Backlog::default()),
        }
    }

    /// Register a listener and flush any queued messages to the listener set.
    ///
    /// Messages delivered while the flush runs are appended to the backlog and
    /// drained by the same flush, so arrival order is kept.
    pub fn add_listener(&self, listener: MessageListener) -> ListenerId {
        let id = self.listeners.add(listener);
        {
            let mut backlog = self.backlog();
            if backlog.flushing || backlog.messages.is_empty() {
                return id;
            }
            backlog.flushing = true;
            debug!(count = backlog.messages.len(), "flushing queued messages to listeners");
        }
        self.flush();
        id
    }

    fn flush(&self) {
        loop {
            let batch: Vec<String> = {
                let mut backlog = self.backlog();
                if backlog.messages.is_empty() {
                    backlog.flushing = false;
                    return;
                }
                backlog.messages.drain(..).collect()
            };
            for message in &batch {
                self.listeners.dispatch(message);
            }
        }
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Hand a message to every listener, or queue it if there are none yet or
    /// a backlog flush is still running.
    pub fn deliver(&self, message: String) {
        {
            // The checks and the push share the queue lock so a concurrent
            // `add_listener` can neither miss nor overtake the message.
            let mut backlog = self.backlog();
            if backlog.flushing || self.listeners.is_empty() {
                backlog.messages.push_back(message);
                debug!(queued = backlog.messages.len(), "message queued");
                return;
            }
        }
        self.listeners.dispatch(&message);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn queued_count(&self) -> usize {
        self.backlog().messages.len()
    }

    /// Drop all listeners and all queued messages.
    pub fn clear(&self) {
        self.listeners.clear();
        self.backlog().messages.clear();
    }

    fn backlog(&self) -> std::sync::MutexGuard<'_, Backlog> {
        self.undelivered.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Delivery {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("listeners", &self.listener_count())
            .field("queued", &self.queued_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::listener;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    fn collecting() -> (Arc<Mutex<Vec<String>>>, MessageListener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let l = listener(move |msg| {
            sink.lock().unwrap().push(msg.to_string());
            Ok(())
        });
        (log, l)
    }

    #[test]
    fn queues_until_first_listener() {
        let delivery = Delivery::new();
        delivery.deliver("one".to_string());
        delivery.deliver("two".to_string());
        assert_eq!(delivery.queued_count(), 2);

        let (log, l) = collecting();
        delivery.add_listener(l);

        assert_eq!(*log.lock().unwrap(), vec!["one", "two"]);
        assert_eq!(delivery.queued_count(), 0);
    }

    #[test]
    fn queued_messages_are_delivered_once() {
        let delivery = Delivery::new();
        delivery.deliver("early".to_string());

        let (first, l1) = collecting();
        delivery.add_listener(l1);
        let (second, l2) = collecting();
        delivery.add_listener(l2);

        assert_eq!(*first.lock().unwrap(), vec!["early"]);
        assert!(second.lock().unwrap().is_empty());
    }

    #[test]
    fn delivers_directly_when_subscribed() {
        let delivery = Delivery::new();
        let (log, l) = collecting();
        delivery.add_listener(l);
        delivery.deliver("live".to_string());

        assert_eq!(*log.lock().unwrap(), vec!["live"]);
        assert_eq!(delivery.queued_count(), 0);
    }

    #[test]
    fn clear_drops_listeners_and_queue() {
        let delivery = Delivery::new();
        delivery.deliver("stale".to_string());
        delivery.clear();
        assert_eq!(delivery.queued_count(), 0);

        let (log, l) = collecting();
        delivery.add_listener(l);
        assert!(log.lock().unwrap().is_empty());

        delivery.clear();
        assert_eq!(delivery.listener_count(), 0);
    }

    #[test]
    fn live_message_waits_for_backlog_flush() {
        let delivery = Arc::new(Delivery::new());
        delivery.deliver("q1".to_string());
        delivery.deliver("q2".to_string());

        let order = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&order);
        let slow = listener(move |msg| {
            if msg == "q1" {
                thread::sleep(Duration::from_millis(200));
            }
            sink.lock().unwrap().push(msg.to_string());
            Ok(())
        });

        let subscriber = {
            let delivery = Arc::clone(&delivery);
            thread::spawn(move || {
                delivery.add_listener(slow);
            })
        };
        thread::sleep(Duration::from_millis(50));
        delivery.deliver("live".to_string());
        subscriber.join().unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["q1", "q2", "live"]);
        assert_eq!(delivery.queued_count(), 0);

        // Once drained, delivery is direct again.
        delivery.deliver("after".to_string());
        assert_eq!(order.lock().unwrap().last().map(String::as_str), Some("after"));
    }
}
