//! Generic callback registry used to broadcast typed events.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

/// Error type returned by a failing callback.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by every callback.
pub type CallbackResult = Result<(), CallbackError>;

type Callback<E> = Arc<dyn Fn(&E) -> CallbackResult + Send + Sync>;

/// A callback that returned an error or panicked during dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackFailure {
    /// Name of the hook the callback was registered on.
    pub hook: String,
    /// Key the callback was registered under.
    pub key: String,
    /// Rendered error or panic message.
    pub message: String,
}

impl fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.hook, self.key, self.message)
    }
}

/// An ordered key → callback table for one event type.
///
/// Dispatch takes a snapshot of the table before running any callback, so a
/// callback may register or remove callbacks (including itself) on the same
/// hook; the change applies from the next [`call`](Self::call) on.
pub struct CallbackHook<E> {
    name: &'static str,
    callbacks: RwLock<Vec<(String, Callback<E>)>>,
}

impl<E> CallbackHook<E> {
    /// Create an empty hook. The name only shows up in logs and failures.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Name of this hook.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register `callback` under `key`.
    ///
    /// Registering an existing key replaces its callback but keeps its
    /// position in the dispatch order.
    pub fn register_callback<F>(&self, key: impl Into<String>, callback: F)
    where
        F: Fn(&E) -> CallbackResult + Send + Sync + 'static,
    {
        let key = key.into();
        let callback: Callback<E> = Arc::new(callback);
        let mut callbacks = self.callbacks.write();
        match callbacks.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = callback,
            None => callbacks.push((key, callback)),
        }
    }

    /// Remove the callback registered under `key`. Returns whether one existed.
    pub fn remove_callback(&self, key: &str) -> bool {
        let mut callbacks = self.callbacks.write();
        let before = callbacks.len();
        callbacks.retain(|(k, _)| k != key);
        callbacks.len() != before
    }

    /// Whether a callback is registered under `key`.
    pub fn is_registered(&self, key: &str) -> bool {
        self.callbacks.read().iter().any(|(k, _)| k == key)
    }

    /// Registered keys in dispatch order.
    pub fn keys(&self) -> Vec<String> {
        self.callbacks.read().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Whether no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    /// Invoke every callback with `event`, in registration order.
    ///
    /// A callback that fails (or panics) is reported in the returned list and
    /// does not prevent the remaining callbacks from running.
    pub fn call(&self, event: &E) -> Vec<CallbackFailure> {
        let snapshot: Vec<(String, Callback<E>)> = self.callbacks.read().clone();
        let mut failures = Vec::new();

        for (key, callback) in snapshot {
            let Err(message) = guarded(|| callback(event)) else {
                continue;
            };
            warn!(
                target: "gatelens::event",
                hook = self.name,
                key = %key,
                error = %message,
                "event callback failed"
            );
            failures.push(CallbackFailure {
                hook: self.name.to_string(),
                key,
                message,
            });
        }

        failures
    }
}

impl<E> fmt::Debug for CallbackHook<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHook")
            .field("name", &self.name)
            .field("keys", &self.keys())
            .finish()
    }
}

/// Run one plugin or observer callback, turning a panic into an error
/// message like any other failure.
pub fn guarded<F>(callback: F) -> Result<(), String>
where
    F: FnOnce() -> CallbackResult,
{
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("callback panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("callback panicked: {s}")
    } else {
        "callback panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn callbacks_run_in_registration_order() {
        let hook: CallbackHook<u32> = CallbackHook::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));

        let l1 = Arc::clone(&log);
        hook.register_callback("first", move |v: &u32| {
            l1.lock().push(format!("first-start {v}"));
            l1.lock().push(format!("first-end {v}"));
            Ok(())
        });
        let l2 = Arc::clone(&log);
        hook.register_callback("second", move |v: &u32| {
            l2.lock().push(format!("second {v}"));
            Ok(())
        });

        assert!(hook.call(&7).is_empty());
        assert_eq!(
            *log.lock(),
            vec!["first-start 7", "first-end 7", "second 7"]
        );
    }

    #[test]
    fn failing_callback_does_not_stop_dispatch() {
        let hook: CallbackHook<()> = CallbackHook::new("test");
        let reached = Arc::new(Mutex::new(false));

        hook.register_callback("broken", |_: &()| Err("boom".into()));
        let r = Arc::clone(&reached);
        hook.register_callback("after", move |_: &()| {
            *r.lock() = true;
            Ok(())
        });

        let failures = hook.call(&());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].key, "broken");
        assert_eq!(failures[0].message, "boom");
        assert!(*reached.lock());
    }

    #[test]
    fn panicking_callback_is_reported() {
        let hook: CallbackHook<()> = CallbackHook::new("test");
        hook.register_callback("panics", |_: &()| panic!("bad state"));
        let failures = hook.call(&());
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("bad state"));
    }

    #[test]
    fn guarded_reports_errors_and_panics() {
        assert_eq!(guarded(|| Ok(())), Ok(()));
        assert_eq!(guarded(|| Err("no section".into())), Err("no section".to_string()));
        let owned = guarded(|| panic!("{} broke", "decoder"));
        assert_eq!(owned, Err("callback panicked: decoder broke".to_string()));
    }

    #[test]
    fn reregistering_key_replaces_in_place() {
        let hook: CallbackHook<()> = CallbackHook::new("test");
        hook.register_callback("a", |_: &()| Ok(()));
        hook.register_callback("b", |_: &()| Ok(()));
        hook.register_callback("a", |_: &()| Err("replaced".into()));

        assert_eq!(hook.keys(), vec!["a", "b"]);
        let failures = hook.call(&());
        assert_eq!(failures[0].message, "replaced");
    }

    #[test]
    fn registration_during_dispatch_applies_next_time() {
        let hook: Arc<CallbackHook<()>> = Arc::new(CallbackHook::new("test"));
        let count = Arc::new(Mutex::new(0u32));

        let inner_hook = Arc::clone(&hook);
        let inner_count = Arc::clone(&count);
        hook.register_callback("installer", move |_: &()| {
            let c = Arc::clone(&inner_count);
            inner_hook.register_callback("late", move |_: &()| {
                *c.lock() += 1;
                Ok(())
            });
            inner_hook.remove_callback("installer");
            Ok(())
        });

        hook.call(&());
        assert_eq!(*count.lock(), 0);
        assert_eq!(hook.keys(), vec!["late"]);

        hook.call(&());
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn remove_unknown_key() {
        let hook: CallbackHook<()> = CallbackHook::new("test");
        assert!(!hook.remove_callback("missing"));
        assert!(hook.is_empty());
    }
}
