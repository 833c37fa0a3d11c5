use std::sync::Arc;
use parking_lot::Mutex;
use ahash::AHashMap;

/// Engine-wide event bus
pub struct EventBus {
    handlers: Arc<Mutex<AHashMap<std::any::TypeId, Vec<Box<dyn EventHandler>>>>>,
}

/// Event trait that all events must implement
pub trait Event: Send + Sync + 'static {
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Handler trait for event handlers
pub trait EventHandler: Send + Sync {
    fn handle(&mut self, event: &dyn Event);
}

/// Events published by the tabular data engine
pub mod events {
    use super::Event;

    /// A dataset became the one on display (upload, undo/redo, commit, reconcile)
    #[derive(Debug, Clone)]
    pub struct DatasetActivated {
        pub version_number: u32,
        pub row_count: usize,
        pub column_count: usize,
    }

    /// A server-side transformation was recorded as a new version
    #[derive(Debug, Clone)]
    pub struct VersionCommitted {
        pub version_number: u32,
        pub description: String,
        pub row_count: usize,
    }

    /// A version was removed on the server
    #[derive(Debug, Clone)]
    pub struct VersionDeleted {
        pub version_number: u32,
    }

    /// The history was replaced by the server's list
    #[derive(Debug, Clone)]
    pub struct HistoryReconciled {
        pub version_count: usize,
        pub viewed_version: u32,
    }

    /// A page of rows was delivered to the view
    #[derive(Debug, Clone)]
    pub struct PageLoaded {
        pub page_index: usize,
        pub total_pages: usize,
        pub row_count: usize,
        /// Rows came from the local fallback after a failed remote fetch
        pub fallback: bool,
    }

    /// An engine operation failed and left state untouched
    #[derive(Debug, Clone)]
    pub struct OperationFailed {
        pub operation: &'static str,
        pub error: String,
    }

    macro_rules! impl_event {
        ($($t:ty),*) => {
            $(
                impl Event for $t {
                    fn as_any(&self) -> &dyn std::any::Any {
                        self
                    }
                }
            )*
        }
    }

    impl_event!(
        DatasetActivated,
        VersionCommitted,
        VersionDeleted,
        HistoryReconciled,
        PageLoaded,
        OperationFailed
    );
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe<E: Event>(&self, handler: Box<dyn EventHandler>) {
        let type_id = std::any::TypeId::of::<E>();
        let mut handlers = self.handlers.lock();
        handlers.entry(type_id).or_insert_with(Vec::new).push(handler);
    }

    /// Subscribe a closure that receives the concrete event type
    pub fn subscribe_fn<E, F>(&self, mut f: F)
    where
        E: Event,
        F: FnMut(&E) + Send + Sync + 'static,
    {
        self.subscribe::<E>(handler_from_fn(move |event: &dyn Event| {
            if let Some(event) = event.as_any().downcast_ref::<E>() {
                f(event);
            }
        }));
    }

    /// Publish an event
    ///
    /// Handlers run with the bus unlocked, so they may publish or subscribe
    /// themselves. A handler added during delivery first sees the next event,
    /// and an event of the same type published from inside a handler skips
    /// the handlers currently running.
    pub fn publish<E: Event>(&self, event: E) {
        let type_id = std::any::TypeId::of::<E>();
        let Some(mut running) = self.handlers.lock().remove(&type_id) else {
            return;
        };

        for handler in running.iter_mut() {
            handler.handle(&event);
        }

        let mut handlers = self.handlers.lock();
        let added = handlers.entry(type_id).or_default();
        running.append(added);
        *added = running;
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapter turning a closure into an [`EventHandler`]
pub struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> EventHandler for ClosureEventHandler<F>
where
    F: FnMut(&dyn Event) + Send + Sync,
{
    fn handle(&mut self, event: &dyn Event) {
        (self.handler)(event);
    }
}

/// Create an event handler from a closure
pub fn handler_from_fn<F>(f: F) -> Box<dyn EventHandler>
where
    F: FnMut(&dyn Event) + Send + Sync + 'static,
{
    Box::new(ClosureEventHandler { handler: f })
}
