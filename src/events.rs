use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
    thread,
};

use crossbeam_channel::{Sender, TrySendError, bounded};

use crate::{
    config::DEFAULT_LISTENER_QUEUE_CAPACITY,
    error::{RecognizerError, Result},
    types::GestureEvent,
};

/// Consumer of gesture events. Called on the listener's own delivery thread.
pub trait GestureListener: Send + Sync {
    fn gesture_detected(&self, event: &GestureEvent) -> anyhow::Result<()>;

    /// `false` once the listener can never receive again. The hub then
    /// retires its delivery thread and subscription.
    fn is_alive(&self) -> bool {
        true
    }
}

impl<F> GestureListener for F
where
    F: Fn(&GestureEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn gesture_detected(&self, event: &GestureEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Forwards to a listener the hub does not own. Events arriving after the
/// listener is gone are dropped.
pub(crate) struct WeakListener(pub(crate) Weak<dyn GestureListener>);

impl GestureListener for WeakListener {
    fn gesture_detected(&self, event: &GestureEvent) -> anyhow::Result<()> {
        match self.0.upgrade() {
            Some(listener) => listener.gesture_detected(event),
            None => Ok(()),
        }
    }

    fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Subscriber {
    id: ListenerId,
    tx: Sender<GestureEvent>,
    handle: Option<thread::JoinHandle<()>>,
}

/// Fans gesture events out to subscribed listeners.
///
/// Each listener gets a bounded queue drained by its own delivery thread, so
/// events reach one listener in publish order while a slow or failing
/// listener never holds up the publisher or the other listeners. When a
/// queue is full the event is dropped for that listener only.
pub struct EventHub {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LISTENER_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn GestureListener>) -> Result<ListenerId> {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = bounded::<GestureEvent>(self.capacity);

        let handle = thread::Builder::new()
            .name(format!("gesture-listener-{}", id.0))
            .spawn(move || {
                for event in rx {
                    if !listener.is_alive() {
                        log::debug!("listener {} is gone, stopping delivery", id.0);
                        break;
                    }
                    deliver(listener.as_ref(), &event);
                }
            })
            .map_err(|err| RecognizerError::ThreadSpawn(format!("listener delivery: {err}")))?;

        self.lock().push(Subscriber {
            id,
            tx,
            handle: Some(handle),
        });
        log::debug!("listener {} subscribed", id.0);
        Ok(id)
    }

    /// Removes a listener. Events already queued for it are still delivered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let removed = {
            let mut subscribers = self.lock();
            subscribers
                .iter()
                .position(|s| s.id == id)
                .map(|idx| subscribers.remove(idx))
        };
        // Dropping the sender lets the delivery thread drain and exit on its own.
        let found = removed.is_some();
        if found {
            log::debug!("listener {} unsubscribed", id.0);
        }
        found
    }

    /// Queues `event` for every current listener. `None` is a no-op.
    pub fn publish(&self, event: impl Into<Option<GestureEvent>>) {
        let Some(event) = event.into() else {
            return;
        };

        let targets: Vec<(ListenerId, Sender<GestureEvent>)> = self
            .lock()
            .iter()
            .map(|s| (s.id, s.tx.clone()))
            .collect();

        let mut gone = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    log::warn!("listener {} queue full, dropping {event}", id.0);
                }
                Err(TrySendError::Disconnected(_)) => gone.push(id),
            }
        }

        if !gone.is_empty() {
            self.lock().retain(|s| !gone.contains(&s.id));
            log::debug!("pruned {} departed listener(s)", gone.len());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventHub {
    fn drop(&mut self) {
        let subscribers = std::mem::take(
            self.subscribers
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let current = thread::current().id();
        let mut handles = Vec::with_capacity(subscribers.len());
        for Subscriber { tx, handle, .. } in subscribers {
            drop(tx);
            handles.extend(handle);
        }
        for handle in handles {
            // A listener dropping the last hub reference must not join itself.
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }
}

fn deliver(listener: &dyn GestureListener, event: &GestureEvent) {
    match panic::catch_unwind(AssertUnwindSafe(|| listener.gesture_detected(event))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => log::warn!("gesture listener failed on {event}: {err:?}"),
        Err(_) => log::warn!("gesture listener panicked on {event}"),
    }
}
