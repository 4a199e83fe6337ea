//! The optional `scheduler` facet: pause/resume gating over a Subsystem's
//! `processTick` (§4.5). The fallback with no scheduler attached is to
//! always run `processTick` — gating happens at the call site in
//! `Subsystem`, not inside the processor itself.

use crate::error::SubflowError;
use crate::facet::{Facet, FacetInitCtx, SchedulerFacet};
use async_trait::async_trait;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct SchedulerFacetImpl {
    source: String,
    paused: AtomicBool,
    initialized: AtomicBool,
    disposed: AtomicBool,
}

impl SchedulerFacetImpl {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            paused: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }
}

impl SchedulerFacet for SchedulerFacetImpl {
    fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Facet for SchedulerFacetImpl {
    fn kind(&self) -> &'static str {
        "scheduler"
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

    fn as_scheduler(&self) -> Option<&dyn SchedulerFacet> {
        Some(self)
    }
}
