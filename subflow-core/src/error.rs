//! Error taxonomy for the facet lifecycle engine and message dispatch core.
//!
//! Every variant's `Display` carries the stable textual fragment referenced
//! by tests and, eventually, by operators reading logs — do not reword a
//! fragment without checking who matches on it.

use std::fmt;

/// The unified error type for `subflow-core`.
///
/// Mirrors the taxonomy of error kinds (`ValidationError`, `DependencyError`,
/// `BuildError`, `HandlerError`, `DisposeError`) as enum variants rather than
/// a class hierarchy. `RouteNotFound` is deliberately *not* a variant here:
/// per the dispatch contract it is returned inline as `Err(String)` inside a
/// handler result, never thrown.
#[derive(Debug, Clone)]
pub enum SubflowError {
    /// Invalid input to a host-facing API call, or a contract that a facet
    /// failed to satisfy.
    Validation(String),
    /// A missing required facet, a duplicate kind registered without
    /// `overwrite`, or a dependency cycle.
    Dependency(String),
    /// A hook factory or a facet's `init` failed.
    Build(String),
    /// A route handler returned an error result.
    Handler(String),
    /// A facet or lifecycle callback failed during `dispose`. Always
    /// logged, never propagated to the caller of `dispose`.
    Dispose(String),
}

impl SubflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::Dependency(msg.into())
    }

    pub fn build(msg: impl Into<String>) -> Self {
        Self::Build(msg.into())
    }

    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }

    pub fn dispose(msg: impl Into<String>) -> Self {
        Self::Dispose(msg.into())
    }

    /// The bare message, without the kind prefix `Display` adds.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m) | Self::Dependency(m) | Self::Build(m) | Self::Handler(m) | Self::Dispose(m) => m,
        }
    }
}

impl fmt::Display for SubflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
            Self::Dependency(msg) => write!(f, "dependency error: {msg}"),
            Self::Build(msg) => write!(f, "build error: {msg}"),
            Self::Handler(msg) => write!(f, "{msg}"),
            Self::Dispose(msg) => write!(f, "dispose error: {msg}"),
        }
    }
}

impl std::error::Error for SubflowError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_display_has_no_prefix() {
        let err = SubflowError::handler("No route handler found: foo/bar");
        assert_eq!(err.to_string(), "No route handler found: foo/bar");
    }

    #[test]
    fn validation_display_contains_message() {
        let err = SubflowError::validation("parent must be an object");
        assert!(err.to_string().contains("parent must be an object"));
    }
}
