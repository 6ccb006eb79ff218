//! Observer registration with explicit subscription handles.
//!
//! A component keeps an [`Observers`] registry; callers get a [`Subscription`]
//! back from `subscribe`. The registry holds a strong reference to the observer
//! only while the subscription is live. Dropping the handle (or calling
//! [`Subscription::unsubscribe`]) releases it.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

struct Registry<O: ?Sized> {
    next_id: u64,
    entries: Vec<(u64, Arc<O>)>,
    shut_down: bool,
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<O: ?Sized + Send + Sync> Detach for Mutex<Registry<O>> {
    fn detach(&self, id: u64) {
        self.lock().entries.retain(|(entry_id, _)| *entry_id != id);
    }
}

/// A set of observers notified in registration order.
pub struct Observers<O: ?Sized> {
    inner: Arc<Mutex<Registry<O>>>,
}

impl<O: ?Sized + Send + Sync + 'static> Observers<O> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
                shut_down: false,
            })),
        }
    }

    /// Register an observer.
    ///
    /// Registering after [`shutdown`](Self::shutdown) returns an inert handle.
    pub fn subscribe(&self, observer: Arc<O>) -> Subscription {
        let id = {
            let mut registry = self.inner.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            if !registry.shut_down {
                registry.entries.push((id, observer));
            }
            id
        };
        let registry = Arc::downgrade(&self.inner);
        let registry: Weak<dyn Detach> = registry;
        Subscription {
            id,
            registry: Some(registry),
        }
    }

    /// Call `f` for every live observer.
    ///
    /// The registry lock is not held while observers run, so observers may
    /// subscribe, unsubscribe, or call back into the owning component.
    pub fn notify(&self, mut f: impl FnMut(&O)) {
        let snapshot: Vec<Arc<O>> = {
            let registry = self.inner.lock();
            if registry.shut_down {
                return;
            }
            registry.entries.iter().map(|(_, o)| Arc::clone(o)).collect()
        };
        for observer in &snapshot {
            f(observer);
        }
    }

    /// Drop every observer and refuse further notifications.
    pub fn shutdown(&self) {
        let mut registry = self.inner.lock();
        registry.shut_down = true;
        registry.entries.clear();
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<O: ?Sized + Send + Sync + 'static> Default for Observers<O> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`Observers::subscribe`].
///
/// The observer stays registered for as long as this handle lives.
#[must_use = "dropping a Subscription unregisters the observer"]
pub struct Subscription {
    id: u64,
    registry: Option<Weak<dyn Detach>>,
}

impl Subscription {
    /// Unregister the observer now.
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(registry) = self.registry.take().and_then(|weak| weak.upgrade()) {
            registry.detach(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Counter: Send + Sync {
        fn hit(&self);
    }

    #[derive(Default)]
    struct Hits(AtomicUsize);

    impl Counter for Hits {
        fn hit(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_notify_reaches_subscribers() {
        let observers: Observers<dyn Counter> = Observers::new();
        let hits = Arc::new(Hits::default());
        let _sub = observers.subscribe(hits.clone());

        observers.notify(|o| o.hit());
        observers.notify(|o| o.hit());
        assert_eq!(hits.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropping_subscription_releases_observer() {
        let observers: Observers<dyn Counter> = Observers::new();
        let hits = Arc::new(Hits::default());
        let sub = observers.subscribe(hits.clone());
        assert_eq!(Arc::strong_count(&hits), 2);

        drop(sub);
        assert_eq!(Arc::strong_count(&hits), 1);
        observers.notify(|o| o.hit());
        assert_eq!(hits.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let observers: Observers<dyn Counter> = Observers::new();
        let first = Arc::new(Hits::default());
        let second = Arc::new(Hits::default());
        let sub = observers.subscribe(first.clone());
        let _keep = observers.subscribe(second.clone());

        sub.unsubscribe();
        observers.notify(|o| o.hit());
        assert_eq!(first.0.load(Ordering::SeqCst), 0);
        assert_eq!(second.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_stops_notifications() {
        let observers: Observers<dyn Counter> = Observers::new();
        let hits = Arc::new(Hits::default());
        let _sub = observers.subscribe(hits.clone());

        observers.shutdown();
        observers.notify(|o| o.hit());
        assert_eq!(hits.0.load(Ordering::SeqCst), 0);
        assert!(observers.is_empty());

        let _late = observers.subscribe(hits.clone());
        assert!(observers.is_empty());
    }

    #[test]
    fn test_subscription_outliving_registry() {
        let observers: Observers<dyn Counter> = Observers::new();
        let sub = observers.subscribe(Arc::new(Hits::default()));
        drop(observers);
        drop(sub);
    }
}
