//! The optional `hierarchy` facet: a notification hook for parent/child
//! mutations. The built-in children map on `Subsystem` always does the
//! actual bookkeeping; attaching this facet only adds an observer on top of
//! it (§9, "Hierarchy facet delegation with fallback").

use crate::error::SubflowError;
use crate::facet::{Facet, FacetInitCtx, HierarchyFacet};
use async_trait::async_trait;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// A hierarchy facet that logs structural changes. Concrete deployments
/// that need to mirror the tree elsewhere (a registry, a metrics counter)
/// implement `HierarchyFacet` directly instead of reaching for this one.
pub struct LoggingHierarchyFacet {
    source: String,
    events: Mutex<Vec<String>>,
    initialized: AtomicBool,
    disposed: AtomicBool,
}

impl LoggingHierarchyFacet {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            events: Mutex::new(Vec::new()),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    /// Events recorded so far, oldest first — mainly useful to tests.
    pub fn recorded_events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl HierarchyFacet for LoggingHierarchyFacet {
    fn child_added(&self, parent_name: &str, child_name: &str) {
        debug!(parent_name, child_name, "child added");
        self.events.lock().unwrap().push(format!("+{parent_name}/{child_name}"));
    }

    fn child_removed(&self, parent_name: &str, child_name: &str) {
        debug!(parent_name, child_name, "child removed");
        self.events.lock().unwrap().push(format!("-{parent_name}/{child_name}"));
    }
}

#[async_trait]
impl Facet for LoggingHierarchyFacet {
    fn kind(&self) -> &'static str {
        "hierarchy"
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

    fn as_hierarchy(&self) -> Option<&dyn HierarchyFacet> {
        Some(self)
    }
}
