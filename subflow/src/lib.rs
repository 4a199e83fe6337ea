//! subflow — an in-process message-dispatch runtime.
//!
//! A [`MessageSystem`] is the root of a tree of `Subsystem`s (re-exported
//! from `subflow_core`), each assembled from pluggable Facets (router,
//! queue, processor, listeners, hierarchy, scheduler, and the optional
//! queries/synchronous variants). Subsystems accept messages on named
//! paths, enqueue or immediately process them, invoke registered route
//! handlers, and return results or errors.
//!
//! Capability-checked messaging — Principals, PKRs, ReaderWriterSets, and
//! `Identity::sendProtected` — lives in `subflow_security` and is
//! re-exported here for convenience; [`MessageSystem`] implements
//! `subflow_security::MessageKernel` so an `Identity` created against it
//! can forward messages through the capability layer without either crate
//! depending on the other in the wrong direction.

pub mod error_ctx;
pub mod system;

pub use error_ctx::ErrorCtx;
pub use system::{ErrorHandler, MessageSystem};

pub use subflow_core::{
    default_hooks, DispatchOptions, DispatchResult, DispatchStatistics, Facet, FacetInitCtx, Hook,
    HookList, Listener, ListenersFacet, Message, ProcessorFacet, QueriesFacet, QueryHandler,
    QueueFacet, ResolvedRoute, RouteHandler, RouteParams, RouterFacet, SchedulerFacet, Subsystem,
    SubsystemCtx, SubflowError,
};

pub use subflow_security::{
    create_identity, Friend, Identity, MessageKernel, Pkr, Principal, PrincipalKind,
    PrincipalRegistry, ReaderWriterSet, SecurityError,
};
