// Key event callbacks and the ordered registry that delivers to them

use crate::key::{EventType, KeyIdentity};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Receiver of key events.
/// Runs on the capture thread, so implementations should return quickly.
pub trait KeyCallback: Send + Sync {
    fn on_key(&self, key: &KeyIdentity, event: EventType);
}

impl<F> KeyCallback for F
where
    F: Fn(&KeyIdentity, EventType) + Send + Sync,
{
    fn on_key(&self, key: &KeyIdentity, event: EventType) {
        self(key, event)
    }
}

/// Handle returned by [`CallbackRegistry::add_callback`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

struct Registration {
    id: CallbackId,
    callback: Arc<dyn KeyCallback>,
}

struct Registrations {
    next_id: u64,
    entries: Vec<Registration>,
}

/// Callbacks in registration order
pub struct CallbackRegistry {
    inner: Mutex<Registrations>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Registrations {
                next_id: 0,
                entries: Vec::new(),
            }),
        }
    }

    pub fn add_callback(&self, callback: Arc<dyn KeyCallback>) -> CallbackId {
        let mut inner = self.inner.lock();
        let id = CallbackId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push(Registration { id, callback });
        id
    }

    /// Returns false if `id` was not registered
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|r| r.id != id);
        inner.entries.len() != before
    }

    pub fn clear_callbacks(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every callback in registration order.
    ///
    /// The registry lock is not held during delivery, so callbacks may
    /// register or remove callbacks; changes apply from the next event.
    /// A panicking callback is logged and skipped.
    pub fn dispatch(&self, key: &KeyIdentity, event: EventType) {
        let callbacks: Vec<Arc<dyn KeyCallback>> = self
            .inner
            .lock()
            .entries
            .iter()
            .map(|r| r.callback.clone())
            .collect();

        for (index, callback) in callbacks.iter().enumerate() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback.on_key(key, event)));
            if result.is_err() {
                log::error!(
                    "Key callback #{} panicked while handling {} {}",
                    index,
                    event,
                    key
                );
            }
        }
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Arc<dyn KeyCallback> {
        let log = log.clone();
        Arc::new(move |_: &KeyIdentity, _: EventType| log.lock().push(name))
    }

    #[test]
    fn test_dispatch_follows_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = CallbackRegistry::new();
        registry.add_callback(recorder(&log, "c1"));
        registry.add_callback(recorder(&log, "c2"));
        registry.add_callback(recorder(&log, "c3"));

        registry.dispatch(&KeyIdentity::Char('a'), EventType::Press);

        assert_eq!(*log.lock(), vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_panicking_callback_does_not_block_later_ones() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = CallbackRegistry::new();

        let first = log.clone();
        registry.add_callback(Arc::new(move |_: &KeyIdentity, _: EventType| {
            first.lock().push("c1");
            panic!("c1 failed");
        }));
        registry.add_callback(recorder(&log, "c2"));
        registry.add_callback(recorder(&log, "c3"));

        registry.dispatch(&KeyIdentity::Char('a'), EventType::Press);

        assert_eq!(*log.lock(), vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_callback_receives_key_and_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = CallbackRegistry::new();
        let sink = seen.clone();
        registry.add_callback(Arc::new(move |key: &KeyIdentity, event: EventType| {
            sink.lock().push((key.clone(), event));
        }));

        registry.dispatch(&KeyIdentity::Named("Space".into()), EventType::Release);

        assert_eq!(
            *seen.lock(),
            vec![(KeyIdentity::Named("Space".into()), EventType::Release)]
        );
    }

    #[test]
    fn test_remove_callback() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = CallbackRegistry::new();
        let c1 = registry.add_callback(recorder(&log, "c1"));
        registry.add_callback(recorder(&log, "c2"));

        assert!(registry.remove_callback(c1));
        assert!(!registry.remove_callback(c1));
        assert_eq!(registry.len(), 1);

        registry.dispatch(&KeyIdentity::Char('x'), EventType::Press);
        assert_eq!(*log.lock(), vec!["c2"]);

        registry.clear_callbacks();
        assert!(registry.is_empty());
    }
}
