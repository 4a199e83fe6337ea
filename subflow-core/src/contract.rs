//! `FacetContract` / `FacetContractRegistry`: the default six kinds a
//! `SubsystemBuilder` knows about and the per-kind check it runs once a
//! facet has been constructed (§4.3, §4.5).

use crate::facet::Facet;
use std::collections::HashMap;
use std::sync::Arc;

/// A named requirement on a facet kind: `probe` returns `Err` if the built
/// facet doesn't actually satisfy the contract it was registered for (most
/// commonly, that it exposes the matching `as_*` accessor on [`Facet`]).
#[derive(Clone)]
pub struct FacetContract {
    pub kind: &'static str,
    probe: Arc<dyn Fn(&dyn Facet) -> Result<(), String> + Send + Sync>,
}

impl FacetContract {
    pub fn new(
        kind: &'static str,
        probe: impl Fn(&dyn Facet) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            probe: Arc::new(probe),
        }
    }

    pub fn check(&self, facet: &dyn Facet) -> Result<(), String> {
        (self.probe)(facet)
    }
}

impl std::fmt::Debug for FacetContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacetContract").field("kind", &self.kind).finish()
    }
}

/// Registry of contracts a builder enforces after construction, keyed by
/// kind. Kinds with no registered contract (custom facets) are left
/// unchecked beyond the base `Facet` trait itself.
#[derive(Clone, Default)]
pub struct FacetContractRegistry {
    contracts: HashMap<&'static str, FacetContract>,
}

impl FacetContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry pre-loaded with the six built-in contracts.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(FacetContract::new("router", |f| {
            f.as_router().map(|_| ()).ok_or_else(|| "router facet does not implement RouterFacet".to_string())
        }));
        registry.register(FacetContract::new("queue", |f| {
            f.as_queue().map(|_| ()).ok_or_else(|| "queue facet does not implement QueueFacet".to_string())
        }));
        registry.register(FacetContract::new("processor", |f| {
            f.as_processor().map(|_| ()).ok_or_else(|| "processor facet does not implement ProcessorFacet".to_string())
        }));
        registry.register(FacetContract::new("listeners", |f| {
            f.as_listeners().map(|_| ()).ok_or_else(|| "listeners facet does not implement ListenersFacet".to_string())
        }));
        registry.register(FacetContract::new("hierarchy", |f| {
            f.as_hierarchy().map(|_| ()).ok_or_else(|| "hierarchy facet does not implement HierarchyFacet".to_string())
        }));
        registry.register(FacetContract::new("scheduler", |f| {
            f.as_scheduler().map(|_| ()).ok_or_else(|| "scheduler facet does not implement SchedulerFacet".to_string())
        }));
        registry
    }

    pub fn register(&mut self, contract: FacetContract) {
        self.contracts.insert(contract.kind, contract);
    }

    pub fn enforce(&self, facet: &dyn Facet) -> Result<(), String> {
        match self.contracts.get(facet.kind()) {
            Some(contract) => contract.check(facet),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::FacetInitCtx;
    use async_trait::async_trait;
    use std::any::Any;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeRouter {
        initialized: AtomicBool,
        disposed: AtomicBool,
    }

    #[async_trait]
    impl Facet for FakeRouter {
        fn kind(&self) -> &'static str {
            "router"
        }
        fn source(&self) -> &str {
            "test"
        }
        fn is_initialized(&self) -> bool {
            self.initialized.load(Ordering::SeqCst)
        }
        fn is_disposed(&self) -> bool {
            self.disposed.load(Ordering::SeqCst)
        }
        async fn init(&self, _: &FacetInitCtx<'_>) -> Result<(), crate::error::SubflowError> {
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn dispose(&self) -> Result<(), crate::error::SubflowError> {
            self.disposed.store(true, Ordering::SeqCst);
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct FakeQueueMissingContract;

    #[async_trait]
    impl Facet for FakeQueueMissingContract {
        fn kind(&self) -> &'static str {
            "queue"
        }
        fn source(&self) -> &str {
            "test"
        }
        fn is_initialized(&self) -> bool {
            true
        }
        fn is_disposed(&self) -> bool {
            false
        }
        async fn init(&self, _: &FacetInitCtx<'_>) -> Result<(), crate::error::SubflowError> {
            Ok(())
        }
        async fn dispose(&self) -> Result<(), crate::error::SubflowError> {
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        // deliberately does not override as_queue()
    }

    #[test]
    fn unregistered_kind_passes_trivially() {
        let registry = FacetContractRegistry::new();
        let facet = FakeRouter {
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        };
        assert!(registry.enforce(&facet).is_ok());
    }

    #[test]
    fn default_registry_rejects_facet_missing_accessor() {
        let registry = FacetContractRegistry::with_defaults();
        let facet = FakeQueueMissingContract;
        assert!(registry.enforce(&facet).is_err());
    }
}
