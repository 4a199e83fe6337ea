//! The `Message` value object and the shapes that flow through `accept` →
//! `processMessageCore` → a route handler.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// A message accepted by a Subsystem's processor facet.
///
/// `body` and `runtime_meta` are opaque `serde_json::Value`s: this crate
/// does not parse or validate transport-specific payload shapes, only
/// routes and dispatches them (§6, Transport contract).
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub path: String,
    pub body: Value,
    pub correlation_id: Option<String>,
    pub is_query: bool,
    pub runtime_meta: Value,
    /// Set by a query handler during the fast-path in `accept`; absent for
    /// queued (non-query) messages.
    pub query_result: Option<Value>,
}

impl Message {
    pub fn new(path: impl Into<String>, body: Value) -> Self {
        let id = NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("msg-{id}"),
            path: path.into(),
            body,
            correlation_id: None,
            is_query: false,
            runtime_meta: Value::Null,
            query_result: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn as_query(mut self) -> Self {
        self.is_query = true;
        self
    }

    pub fn with_runtime_meta(mut self, meta: Value) -> Self {
        self.runtime_meta = meta;
        self
    }
}

/// Named-segment parameters captured by the route matched for a message
/// (e.g. `"users/:id"` matching `"users/42"` yields `{"id": "42"}`).
pub type RouteParams = HashMap<String, String>;

/// The `{msg, options}` call shape `processMessage` accepts in addition to
/// a bare `(msg, options)` pair (§4.5). `options` here are pair-level and
/// merge under whatever the caller passes alongside the pair, via
/// [`DispatchOptions::merged_with`].
#[derive(Debug, Clone)]
pub struct MessagePair {
    pub message: Message,
    pub options: DispatchOptions,
}

impl MessagePair {
    pub fn new(message: Message, options: DispatchOptions) -> Self {
        Self { message, options }
    }
}

/// Per-call dispatch options. Mirrors the distilled spec's free-form
/// `options` bag; `current_piece` is the one field the spec names
/// explicitly as transport-injected runtime metadata.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    pub current_piece: Option<Value>,
    pub extra: HashMap<String, Value>,
}

impl DispatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_current_piece(mut self, value: Value) -> Self {
        self.current_piece = Some(value);
        self
    }

    /// Merge `other` on top of `self`: fields set in `other` win. Used by
    /// `process_message_pair`, where pair-level options apply first and the
    /// caller's options override them (§4.5).
    pub fn merged_with(&self, other: &DispatchOptions) -> DispatchOptions {
        let mut extra = self.extra.clone();
        extra.extend(other.extra.clone());
        DispatchOptions {
            current_piece: other.current_piece.clone().or_else(|| self.current_piece.clone()),
            extra,
        }
    }
}

/// The outcome of dispatching a message through a route handler.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub correlation_id: Option<String>,
}

impl DispatchResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            correlation_id: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

/// What a route handler returns: `Ok(data)` becomes a successful
/// `DispatchResult`, `Err(message)` becomes a failed one with
/// `messages_failed` incremented by the processor.
pub type HandlerResult = Result<Value, String>;
