use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, Weak};

type Listener<T> = Box<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// Typed observer channel. Multiple independent listeners, each isolated:
/// a panicking listener is logged and skipped, delivery to the rest
/// continues. Registration returns a guard that unregisters on drop.
pub struct EventBus<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> ListenerGuard<T> {
        let mut registry = self.registry.lock().expect("event bus poisoned");
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Box::new(listener)));

        ListenerGuard {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn emit(&self, event: &T) {
        let registry = self.registry.lock().expect("event bus poisoned");

        for (id, listener) in &registry.listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                log::error!("listener {id} panicked; continuing delivery");
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.lock().expect("event bus poisoned").listeners.len()
    }
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

/// Keeps its listener registered for as long as it lives.
pub struct ListenerGuard<T> {
    id: u64,
    registry: Weak<Mutex<Registry<T>>>,
}

impl<T> ListenerGuard<T> {
    pub fn unsubscribe(self) {}
}

impl<T> Drop for ListenerGuard<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().expect("event bus poisoned");
            registry.listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn delivers_to_all_listeners() {
        let bus: EventBus<u32> = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let a = hits.clone();
        let _guard_a = bus.subscribe(move |v| {
            a.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let b = hits.clone();
        let _guard_b = bus.subscribe(move |v| {
            b.fetch_add(*v as usize, Ordering::SeqCst);
        });

        bus.emit(&3);
        assert_eq!(hits.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn panicking_listener_does_not_block_the_rest() {
        let bus: EventBus<()> = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let _bad = bus.subscribe(|_| panic!("listener bug"));
        let counter = hits.clone();
        let _good = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&());
        bus.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_the_guard_unregisters() {
        let bus: EventBus<()> = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let guard = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.listener_count(), 1);

        bus.emit(&());
        drop(guard);

        bus.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 0);
    }
}
