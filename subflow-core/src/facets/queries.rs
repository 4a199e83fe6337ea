//! The optional `queries` facet: a caller-synchronous fast path that
//! bypasses the queue entirely (§4.5).

use crate::error::SubflowError;
use crate::facet::{Facet, FacetInitCtx, QueriesFacet, QueryHandler};
use crate::message::{DispatchOptions, HandlerResult, Message};
use crate::subsystem::Subsystem;
use async_trait::async_trait;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

pub struct QueriesFacetImpl {
    source: String,
    host: RwLock<Option<Weak<Subsystem>>>,
    override_handler: RwLock<Option<QueryHandler>>,
    initialized: AtomicBool,
    disposed: AtomicBool,
}

impl QueriesFacetImpl {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            host: RwLock::new(None),
            override_handler: RwLock::new(None),
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
}

#[async_trait]
impl QueriesFacet for QueriesFacetImpl {
    /// Without an override installed, answers by resolving a route exactly
    /// like a queued message would, just without ever touching the queue.
    async fn process_query(&self, message: &Message) -> HandlerResult {
        if let Some(handler) = self.override_handler.read().unwrap().clone() {
            return handler(message).await;
        }

        let host = self
            .host()
            .ok_or_else(|| "queries facet has no attached subsystem".to_string())?;
        let route = host
            .find("router")
            .await
            .and_then(|f| f.as_router().and_then(|r| r.resolve_route(&message.path)));

        match route {
            Some(route) => (route.handler)(message.clone(), route.params, DispatchOptions::new()).await,
            None => Err(format!("No route handler found: {}", message.path)),
        }
    }

    fn enable_query_handler(&self, handler: QueryHandler) {
        *self.override_handler.write().unwrap() = Some(handler);
    }
}

#[async_trait]
impl Facet for QueriesFacetImpl {
    fn kind(&self) -> &'static str {
        "queries"
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

    fn as_queries(&self) -> Option<&dyn QueriesFacet> {
        Some(self)
    }
}
