//! Push-event boundary from the backend to the session.
//!
//! Three channels (progress, completion, failure) with handler registration
//! returning an RAII [`Subscription`]. Handlers on one channel run in
//! registration order; no ordering is guaranteed across channels beyond
//! causal order. Dispatch runs on a snapshot of the registry, so a handler
//! may itself subscribe or unsubscribe mid-delivery.

use crate::protocol::{ConversionEvent, EventChannel, EventEnvelope, JobId, ProgressPayload};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type ProgressHandler = Arc<dyn Fn(JobId, &ProgressPayload) + Send + Sync>;
type CompletionHandler = Arc<dyn Fn(JobId, &Path) + Send + Sync>;
type FailureHandler = Arc<dyn Fn(JobId, &str) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    progress: Vec<(u64, ProgressHandler)>,
    completion: Vec<(u64, CompletionHandler)>,
    failure: Vec<(u64, FailureHandler)>,
}

impl Registry {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn remove(&mut self, channel: EventChannel, id: u64) {
        match channel {
            EventChannel::Progress => self.progress.retain(|(hid, _)| *hid != id),
            EventChannel::Complete => self.completion.retain(|(hid, _)| *hid != id),
            EventChannel::Error => self.failure.retain(|(hid, _)| *hid != id),
        }
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct EventGateway {
    registry: Arc<Mutex<Registry>>,
}

impl EventGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(
        &self,
        handler: impl Fn(JobId, &ProgressPayload) + Send + Sync + 'static,
    ) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.allocate_id();
        registry.progress.push((id, Arc::new(handler)));
        self.subscription(EventChannel::Progress, id)
    }

    pub fn on_completion(
        &self,
        handler: impl Fn(JobId, &Path) + Send + Sync + 'static,
    ) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.allocate_id();
        registry.completion.push((id, Arc::new(handler)));
        self.subscription(EventChannel::Complete, id)
    }

    pub fn on_failure(
        &self,
        handler: impl Fn(JobId, &str) + Send + Sync + 'static,
    ) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.allocate_id();
        registry.failure.push((id, Arc::new(handler)));
        self.subscription(EventChannel::Error, id)
    }

    /// Emitter handle for the backend side of the channel.
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher {
            registry: Arc::clone(&self.registry),
        }
    }

    pub fn subscriber_count(&self, channel: EventChannel) -> usize {
        let registry = lock(&self.registry);
        match channel {
            EventChannel::Progress => registry.progress.len(),
            EventChannel::Complete => registry.completion.len(),
            EventChannel::Error => registry.failure.len(),
        }
    }

    fn subscription(&self, channel: EventChannel, id: u64) -> Subscription {
        Subscription {
            registry: Arc::downgrade(&self.registry),
            channel,
            id,
        }
    }
}

#[derive(Clone)]
pub struct EventPublisher {
    registry: Arc<Mutex<Registry>>,
}

impl EventPublisher {
    /// Delivers one envelope to every handler on the matching channel, in
    /// registration order. The registry lock is released before any handler
    /// runs, so handlers may subscribe or unsubscribe.
    pub fn publish(&self, envelope: EventEnvelope) {
        match &envelope.event {
            ConversionEvent::Progress(payload) => {
                let handlers: Vec<ProgressHandler> = {
                    let registry = lock(&self.registry);
                    registry.progress.iter().map(|(_, h)| Arc::clone(h)).collect()
                };
                for handler in handlers {
                    handler(envelope.job, payload);
                }
            }
            ConversionEvent::Completed { output_path } => {
                let handlers: Vec<CompletionHandler> = {
                    let registry = lock(&self.registry);
                    registry.completion.iter().map(|(_, h)| Arc::clone(h)).collect()
                };
                for handler in handlers {
                    handler(envelope.job, output_path);
                }
            }
            ConversionEvent::Failed { error } => {
                let handlers: Vec<FailureHandler> = {
                    let registry = lock(&self.registry);
                    registry.failure.iter().map(|(_, h)| Arc::clone(h)).collect()
                };
                for handler in handlers {
                    handler(envelope.job, error);
                }
            }
        }
    }
}

/// Listener handle. Unsubscribing is idempotent and also happens on drop,
/// so handler lifetime is scoped to whoever owns the subscription.
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    channel: EventChannel,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(self.channel, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
