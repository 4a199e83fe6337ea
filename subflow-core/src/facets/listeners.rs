//! The default `listeners` facet: named-event pub/sub for lifecycle and
//! dispatch notifications, in the spirit of the event-bus pattern but scoped
//! to a single Subsystem rather than process-wide.

use crate::error::SubflowError;
use crate::facet::{Facet, FacetInitCtx, Listener, ListenersFacet};
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::warn;

pub struct ListenersFacetImpl {
    source: String,
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
    initialized: AtomicBool,
    disposed: AtomicBool,
}

impl ListenersFacetImpl {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            listeners: RwLock::new(HashMap::new()),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }
}

impl ListenersFacet for ListenersFacetImpl {
    fn on(&self, event: &str, listener: Listener) {
        self.listeners
            .write()
            .unwrap()
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    fn emit(&self, event: &str, payload: &Value) {
        let listeners = self.listeners.read().unwrap();
        let Some(subscribers) = listeners.get(event) else {
            return;
        };
        for listener in subscribers {
            listener(payload);
        }
    }
}

#[async_trait]
impl Facet for ListenersFacetImpl {
    fn kind(&self) -> &'static str {
        "listeners"
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
        let count: usize = self.listeners.read().unwrap().values().map(Vec::len).sum();
        if count > 0 {
            warn!(count, "disposing listeners facet with subscribers still attached");
        }
        self.disposed.store(true, Ordering::Release);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_listeners(&self) -> Option<&dyn ListenersFacet> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn emit_invokes_subscribed_listeners_in_registration_order() {
        let facet = ListenersFacetImpl::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_a = Arc::clone(&seen);
        facet.on("message.processed", Arc::new(move |v| seen_a.lock().unwrap().push(v.clone())));
        let seen_b = Arc::clone(&seen);
        facet.on("message.processed", Arc::new(move |v| seen_b.lock().unwrap().push(v.clone())));

        facet.emit("message.processed", &json!({"id": "m1"}));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn emit_on_unknown_event_is_a_no_op() {
        let facet = ListenersFacetImpl::new("test");
        facet.emit("nothing.subscribed", &json!(null));
    }
}
