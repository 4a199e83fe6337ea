//! The default `processor` facet: the accept → queue → process pipeline
//! (§4.5). Wired to its owning `Subsystem` after construction via
//! `attach_host`, since route/queue/queries lookups can only happen once the
//! sibling facets are themselves built — a hook factory must not reach into
//! siblings, but the processor calling back into its host after `build()`
//! has finished is a different thing entirely.

use crate::error::SubflowError;
use crate::facet::{DispatchStatistics, Facet, FacetInitCtx, ProcessorFacet};
use crate::message::{DispatchOptions, DispatchResult, Message};
use crate::subsystem::Subsystem;
use async_trait::async_trait;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::warn;

pub struct ProcessorFacetImpl {
    source: String,
    host: RwLock<Option<Weak<Subsystem>>>,
    stats: Mutex<DispatchStatistics>,
    initialized: AtomicBool,
    disposed: AtomicBool,
}

impl ProcessorFacetImpl {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            host: RwLock::new(None),
            stats: Mutex::new(DispatchStatistics::default()),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn attach_host(&self, host: Weak<Subsystem>) {
        *self.host.write().unwrap() = Some(host);
    }

    fn host(&self) -> Option<Arc<Subsystem>> {
        self.host.read().unwrap().clone().and_then(|w| w.upgrade())
    }

    /// Resolve a route and invoke its handler (§4.5, step-by-step
    /// `processMessageCore`). Used by `process_tick` and
    /// `process_immediately` alike.
    async fn process_message_core(&self, message: Message, options: DispatchOptions) -> DispatchResult {
        let correlation_id = message.correlation_id.clone();

        let Some(host) = self.host() else {
            self.stats.lock().unwrap().messages_failed += 1;
            return DispatchResult::err("processor facet has no attached subsystem")
                .with_correlation_id(correlation_id);
        };

        let route = match host.find("router").await.and_then(|f| f.as_router()?.resolve_route(&message.path)) {
            Some(route) => route,
            None => {
                self.stats.lock().unwrap().messages_failed += 1;
                return DispatchResult::err(format!("No route handler found: {}", message.path))
                    .with_correlation_id(correlation_id);
            }
        };

        let params = route.params;
        let path = message.path.clone();
        match (route.handler)(message, params, options).await {
            Ok(data) => {
                self.stats.lock().unwrap().messages_processed += 1;
                DispatchResult::ok(data).with_correlation_id(correlation_id)
            }
            Err(error) => {
                self.stats.lock().unwrap().messages_failed += 1;
                warn!(path, error, "route handler returned failure");
                host.notify_error(&error);
                DispatchResult::err(error).with_correlation_id(correlation_id)
            }
        }
    }
}

#[async_trait]
impl ProcessorFacet for ProcessorFacetImpl {
    async fn accept(
        &self,
        message: Message,
        _options: DispatchOptions,
    ) -> Result<Option<DispatchResult>, SubflowError> {
        let host = self
            .host()
            .ok_or_else(|| SubflowError::build("processor facet has no attached subsystem"))?;

        if message.is_query {
            if let Some(queries) = host.find("queries").await.and_then(|f| f.as_queries().map(|_| f)) {
                let queries = queries.as_queries().expect("checked above");
                let correlation_id = message.correlation_id.clone();
                let result = queries.process_query(&message).await;
                self.stats.lock().unwrap().queries_answered += 1;
                let dispatch = match result {
                    Ok(data) => DispatchResult::ok(data),
                    Err(err) => DispatchResult::err(err),
                }
                .with_correlation_id(correlation_id);
                return Ok(Some(dispatch));
            }
        }

        let queue_facet = host
            .find("queue")
            .await
            .ok_or_else(|| SubflowError::dependency("missing queue facet"))?;
        let queue = queue_facet
            .as_queue()
            .ok_or_else(|| SubflowError::dependency("missing queue facet"))?;
        queue.enqueue(message)?;
        self.stats.lock().unwrap().messages_accepted += 1;
        Ok(None)
    }

    async fn process_tick(&self) -> Option<DispatchResult> {
        let host = self.host()?;
        let queue_facet = host.find("queue").await?;
        let queue = queue_facet.as_queue()?;
        let message = queue.dequeue()?;
        Some(self.process_message_core(message, DispatchOptions::new()).await)
    }

    async fn process_immediately(&self, message: Message, options: DispatchOptions) -> DispatchResult {
        self.process_message_core(message, options).await
    }

    fn stats(&self) -> DispatchStatistics {
        *self.stats.lock().unwrap()
    }
}

#[async_trait]
impl Facet for ProcessorFacetImpl {
    fn kind(&self) -> &'static str {
        "processor"
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    async fn init(&self, _init_ctx: &FacetInitCtx<'_>) -> Result<(), SubflowError> {
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    async fn dispose(&self) -> Result<(), SubflowError> {
        self.disposed.store(true, Ordering::Release);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_processor(&self) -> Option<&dyn ProcessorFacet> {
        Some(self)
    }
}
