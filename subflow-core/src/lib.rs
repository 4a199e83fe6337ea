//! Facet lifecycle engine and message dispatch core for the subflow
//! runtime: a dependency-ordered, cached, transactional builder that
//! assembles a [`Subsystem`] from declarative [`Hook`]s, plus the
//! accept → queue → process pipeline that dispatches [`Message`]s once
//! built.
//!
//! Capability-mediated messaging (Principals, PKRs, ReaderWriterSets,
//! `sendProtected`) lives one layer up, in `subflow-security`, which
//! depends on the types here rather than the other way around.

pub mod builder;
pub mod contract;
pub mod ctx;
pub mod error;
pub mod facet;
pub mod facets;
pub mod graph_cache;
pub mod hook;
pub mod manager;
pub mod message;
pub mod subsystem;

pub use builder::{Plan, SubsystemBuilder};
pub use contract::{FacetContract, FacetContractRegistry};
pub use ctx::SubsystemCtx;
pub use error::SubflowError;
pub use facet::{
    BoxFuture, DispatchStatistics, Facet, FacetInitCtx, HierarchyFacet, Listener, ListenersFacet,
    ProcessorFacet, QueriesFacet, QueryHandler, QueueFacet, ResolvedRoute, RouteHandler,
    RouterFacet, SchedulerFacet,
};
pub use facets::hierarchy::LoggingHierarchyFacet;
pub use facets::listeners::ListenersFacetImpl;
pub use facets::processor::ProcessorFacetImpl;
pub use facets::queries::QueriesFacetImpl;
pub use facets::queue::QueueFacetImpl;
pub use facets::router::RouterFacetImpl;
pub use facets::scheduler::SchedulerFacetImpl;
pub use graph_cache::DependencyGraphCache;
pub use hook::{Hook, HookFactory, HookList};
pub use manager::{AddOptions, FacetManager};
pub use message::{DispatchOptions, DispatchResult, HandlerResult, Message, MessagePair, RouteParams};
pub use subsystem::{LifecycleCallback, Subsystem};

/// A [`HookList`] wired to the seven built-in facets (router, queue,
/// processor, listeners, hierarchy, scheduler) in their natural
/// dependency order — `processor` depends on `queue` and `router`,
/// everything else is independent. Callers that want the optional
/// `queries` facet register it themselves via `use_hook`, since it is not
/// one of the six default contracts (§4.1).
pub fn default_hooks() -> HookList {
    use std::sync::Arc;

    let mut hooks = HookList::new();
    hooks.push(Hook::new("queue", "subflow-core::default", Arc::new(|| {
        Arc::new(facets::queue::QueueFacetImpl::unbounded("subflow-core::default"))
    })));
    hooks.push(Hook::new("router", "subflow-core::default", Arc::new(|| {
        Arc::new(facets::router::RouterFacetImpl::new("subflow-core::default"))
    })));
    hooks.push(
        Hook::new("processor", "subflow-core::default", Arc::new(|| {
            Arc::new(facets::processor::ProcessorFacetImpl::new("subflow-core::default"))
        }))
        .requiring(vec!["queue", "router"]),
    );
    hooks.push(Hook::new("listeners", "subflow-core::default", Arc::new(|| {
        Arc::new(facets::listeners::ListenersFacetImpl::new("subflow-core::default"))
    })));
    hooks.push(Hook::new("hierarchy", "subflow-core::default", Arc::new(|| {
        Arc::new(facets::hierarchy::LoggingHierarchyFacet::new("subflow-core::default"))
    })));
    hooks.push(Hook::new("scheduler", "subflow-core::default", Arc::new(|| {
        Arc::new(facets::scheduler::SchedulerFacetImpl::new("subflow-core::default"))
    })));
    hooks
}
