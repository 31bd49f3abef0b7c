//! Input Abstraction Layer: one event bus for every input source.
//!
//! Adapters are keyed by `InputSource` (at most one each, re-registering
//! hot-swaps). Subscribers get every event from every running adapter,
//! synchronously and in subscription order.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::kernel::event::{IalEvent, InputSource};

/// Handed to adapters; called once per emitted event.
pub type EventCallback = Arc<dyn Fn(IalEvent) + Send + Sync>;

/// Subscriber hook. An `Err` is logged and delivery continues.
pub type Subscriber = Arc<dyn Fn(&IalEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Contract for an input source. `start`/`stop` are independent per source.
#[async_trait]
pub trait InputAdapter: Send + Sync {
    fn source(&self) -> InputSource;

    fn set_callback(&self, callback: EventCallback);

    async fn start(&self) -> anyhow::Result<()>;

    async fn stop(&self) -> anyhow::Result<()>;
}

#[derive(Default)]
struct Dispatcher {
    running: AtomicBool,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
}

impl Dispatcher {
    fn dispatch(&self, event: IalEvent) {
        if !self.running.load(Ordering::Acquire) {
            debug!("IAL stopped, dropping {:?} from {}", event.event_type(), event.source());
            return;
        }

        // Snapshot so subscribers may (un)subscribe from inside a callback.
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|(_, s)| s.clone())
            .collect();

        for subscriber in subscribers {
            match catch_unwind(AssertUnwindSafe(|| subscriber(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("IAL subscriber failed: {:#}", e),
                Err(_) => error!("IAL subscriber panicked"),
            }
        }
    }
}

pub struct Ial {
    adapters: BTreeMap<InputSource, Arc<dyn InputAdapter>>,
    started: Mutex<BTreeSet<InputSource>>,
    dispatcher: Arc<Dispatcher>,
    next_subscription: AtomicU64,
}

impl Default for Ial {
    fn default() -> Self {
        Self::new()
    }
}

impl Ial {
    pub fn new() -> Self {
        Self {
            adapters: BTreeMap::new(),
            started: Mutex::new(BTreeSet::new()),
            dispatcher: Arc::new(Dispatcher::default()),
            next_subscription: AtomicU64::new(0),
        }
    }

    /// Stores `adapter` under its source, replacing any previous one.
    /// While the bus is running the old adapter is stopped and the new one started.
    pub async fn register(&mut self, adapter: Arc<dyn InputAdapter>) {
        let source = adapter.source();

        let dispatcher = Arc::clone(&self.dispatcher);
        adapter.set_callback(Arc::new(move |event| dispatcher.dispatch(event)));

        if let Some(previous) = self.adapters.insert(source, Arc::clone(&adapter)) {
            warn!("Replacing existing adapter for {}", source);
            if self.is_running() {
                if let Err(e) = previous.stop().await {
                    error!("Failed to stop replaced adapter {}: {:#}", source, e);
                }
                self.mark_started(source, false);
                self.start_one(source, &adapter).await;
            }
        } else if self.is_running() {
            self.start_one(source, &adapter).await;
        }
        info!("Registered adapter: {}", source);
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&IalEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.dispatcher
            .subscribers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.dispatcher.subscribers.lock().unwrap_or_else(|p| p.into_inner());
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Starts every adapter in turn. A failing adapter is logged and left inactive.
    pub async fn start(&self) {
        self.dispatcher.running.store(true, Ordering::Release);
        for (source, adapter) in &self.adapters {
            self.start_one(*source, adapter).await;
        }
    }

    pub async fn stop(&self) {
        self.dispatcher.running.store(false, Ordering::Release);
        for (source, adapter) in &self.adapters {
            if let Err(e) = adapter.stop().await {
                error!("Failed to stop adapter {}: {:#}", source, e);
            }
            self.mark_started(*source, false);
        }
    }

    async fn start_one(&self, source: InputSource, adapter: &Arc<dyn InputAdapter>) {
        match adapter.start().await {
            Ok(()) => {
                self.mark_started(source, true);
                info!("Started adapter: {}", source);
            }
            Err(e) => error!("Failed to start adapter {}: {:#}", source, e),
        }
    }

    fn mark_started(&self, source: InputSource, started: bool) {
        let mut set = self.started.lock().unwrap_or_else(|p| p.into_inner());
        if started {
            set.insert(source);
        } else {
            set.remove(&source);
        }
    }

    pub fn is_running(&self) -> bool {
        self.dispatcher.running.load(Ordering::Acquire)
    }

    /// Registered sources, whether or not they started.
    pub fn active_sources(&self) -> Vec<InputSource> {
        self.adapters.keys().copied().collect()
    }

    /// Sources whose adapter started successfully and has not been stopped.
    pub fn running_sources(&self) -> Vec<InputSource> {
        self.started.lock().unwrap_or_else(|p| p.into_inner()).iter().copied().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.dispatcher.subscribers.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}
