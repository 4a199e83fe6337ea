//! The `Facet` trait and the typed contract-accessor pattern that replaces
//! the source's dynamic `facet.someMethod()` property access (§9, "Dynamic
//! facet dispatch").
//!
//! Rather than reach for a downcast-to-trait-object crate, each contract
//! trait (`RouterFacet`, `QueueFacet`, …) is exposed through an `as_*`
//! accessor on the base trait with a `None` default; a concrete facet type
//! overrides the one accessor matching what it implements. `Subsystem::find`
//! and `FacetContractRegistry::enforce` both go through these accessors
//! instead of runtime reflection.

use crate::ctx::SubsystemCtx;
use crate::error::SubflowError;
use crate::message::{DispatchOptions, DispatchResult, HandlerResult, Message, MessagePair, RouteParams};
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Context handed to a facet's `init`. Deliberately thin: a facet's factory
/// and `init` must not reach into sibling facets (§4.3 step 4) — anything a
/// facet needs from the rest of the system is either in `ctx` or supplied as
/// a constructor argument by its own hook's factory closure.
pub struct FacetInitCtx<'a> {
    pub ctx: &'a SubsystemCtx,
    pub subsystem_name: &'a str,
}

/// A pluggable capability attached to a Subsystem.
///
/// Implementors seal themselves on `init` (flip an internal `AtomicBool`,
/// typically) rather than relying on the trait to enforce immutability —
/// Rust has no language-level "freeze this object" primitive, so sealing is
/// a convention concrete facets observe themselves (see `RouterFacetImpl`
/// for the pattern).
#[async_trait]
pub trait Facet: Any + Send + Sync {
    fn kind(&self) -> &'static str;
    fn source(&self) -> &str;

    /// Whether this facet should be published on the Subsystem's API under
    /// its kind name once initialized. Defaults to `true`.
    fn should_attach(&self) -> bool {
        true
    }

    fn is_initialized(&self) -> bool;
    fn is_disposed(&self) -> bool;

    async fn init(&self, init_ctx: &FacetInitCtx<'_>) -> Result<(), SubflowError>;

    /// Must be idempotent: a second call after a successful dispose is a no-op.
    async fn dispose(&self) -> Result<(), SubflowError>;

    fn as_any(&self) -> &dyn Any;

    fn as_router(&self) -> Option<&dyn RouterFacet> {
        None
    }
    fn as_queue(&self) -> Option<&dyn QueueFacet> {
        None
    }
    fn as_processor(&self) -> Option<&dyn ProcessorFacet> {
        None
    }
    fn as_listeners(&self) -> Option<&dyn ListenersFacet> {
        None
    }
    fn as_hierarchy(&self) -> Option<&dyn HierarchyFacet> {
        None
    }
    fn as_scheduler(&self) -> Option<&dyn SchedulerFacet> {
        None
    }
    fn as_queries(&self) -> Option<&dyn QueriesFacet> {
        None
    }
}

impl fmt::Debug for dyn Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facet")
            .field("kind", &self.kind())
            .field("source", &self.source())
            .field("initialized", &self.is_initialized())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A resolved route: the handler to invoke plus the named-segment params
/// captured from the path that matched.
pub struct ResolvedRoute {
    pub handler: RouteHandler,
    pub params: RouteParams,
}

pub type RouteHandler =
    Arc<dyn Fn(Message, RouteParams, DispatchOptions) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Contract for the `router` kind: pattern registration and resolution
/// (§4.5). Exact paths take precedence over patterns with named segments.
pub trait RouterFacet: Send + Sync {
    fn register_route(
        &self,
        pattern: &str,
        handler: RouteHandler,
        overwrite: bool,
    ) -> Result<(), SubflowError>;

    fn unregister_route(&self, pattern: &str) -> bool;

    fn resolve_route(&self, path: &str) -> Option<ResolvedRoute>;
}

/// Contract for the `queue` kind: a bounded-or-unbounded FIFO (§4.5).
pub trait QueueFacet: Send + Sync {
    fn enqueue(&self, message: Message) -> Result<(), SubflowError>;
    fn dequeue(&self) -> Option<Message>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn capacity(&self) -> Option<usize>;
}

/// Contract for the `processor` kind (or the `synchronous` drop-in): the
/// accept → queue/fast-path → process pipeline (§4.5).
#[async_trait]
pub trait ProcessorFacet: Send + Sync {
    /// Queues `message` for later `process_tick`, or — if a queries facet
    /// is attached and `message.is_query` — answers it inline and returns
    /// the result immediately (§4.5, the query fast path).
    async fn accept(
        &self,
        message: Message,
        options: DispatchOptions,
    ) -> Result<Option<DispatchResult>, SubflowError>;
    async fn process_tick(&self) -> Option<DispatchResult>;
    async fn process_immediately(&self, message: Message, options: DispatchOptions) -> DispatchResult;

    /// The bare `(msg, options)` call shape of `processMessage`: never
    /// queues, invokes `processMessageCore` directly (§4.5). Defaults to
    /// `process_immediately`, which does exactly that.
    async fn process_message(&self, message: Message, options: DispatchOptions) -> DispatchResult {
        self.process_immediately(message, options).await
    }

    /// The `{msg, options}` pair call shape of `processMessage`: `pair`'s
    /// own options apply first, `options` passed alongside the pair
    /// overrides them (§4.5).
    async fn process_message_pair(&self, pair: MessagePair, options: DispatchOptions) -> DispatchResult {
        let merged = pair.options.merged_with(&options);
        self.process_message(pair.message, merged).await
    }

    fn stats(&self) -> DispatchStatistics;
}

/// Counters owned by the processor facet (§3, Statistics).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStatistics {
    pub messages_accepted: u64,
    pub messages_processed: u64,
    pub messages_failed: u64,
    pub queries_answered: u64,
}

pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Contract for the `listeners` kind: in-process named-event pub/sub used
/// for lifecycle and dispatch notifications.
pub trait ListenersFacet: Send + Sync {
    fn on(&self, event: &str, listener: Listener);
    fn emit(&self, event: &str, payload: &Value);
}

/// Contract for the `hierarchy` kind: lets a facet override the Subsystem's
/// built-in parent/child bookkeeping (§9, "delegation with fallback").
/// Optional — a Subsystem with no hierarchy facet falls back to its own
/// field mutations.
pub trait HierarchyFacet: Send + Sync {
    fn child_added(&self, parent_name: &str, child_name: &str);
    fn child_removed(&self, parent_name: &str, child_name: &str);
}

/// Contract for the `scheduler` kind: an optional override of
/// `processTick`, e.g. for batching or time-slicing (§4.5).
#[async_trait]
pub trait SchedulerFacet: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    fn is_paused(&self) -> bool;
}

pub type QueryHandler = Arc<dyn Fn(&Message) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Contract for the optional `queries` kind: a synchronous-from-the-caller
/// fast path that bypasses the queue entirely (§4.5).
#[async_trait]
pub trait QueriesFacet: Send + Sync {
    async fn process_query(&self, message: &Message) -> HandlerResult;
    fn enable_query_handler(&self, handler: QueryHandler);
}
