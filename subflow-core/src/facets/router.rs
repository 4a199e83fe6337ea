//! The default `router` facet: pattern registration and resolution with
//! named segments (§4.5).

use crate::error::SubflowError;
use crate::facet::{Facet, FacetInitCtx, ResolvedRoute, RouteHandler, RouterFacet};
use crate::message::RouteParams;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

#[derive(Clone)]
enum Segment {
    Exact(String),
    Named(String),
}

struct Route {
    pattern: String,
    segments: Vec<Segment>,
    handler: RouteHandler,
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                Segment::Named(name.to_string())
            } else {
                Segment::Exact(segment.to_string())
            }
        })
        .collect()
}

fn is_exact(segments: &[Segment]) -> bool {
    segments.iter().all(|s| matches!(s, Segment::Exact(_)))
}

fn match_path(segments: &[Segment], path: &str) -> Option<RouteParams> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if parts.len() != segments.len() {
        return None;
    }
    let mut params = RouteParams::new();
    for (segment, part) in segments.iter().zip(parts.iter()) {
        match segment {
            Segment::Exact(expected) if expected == part => {}
            Segment::Exact(_) => return None,
            Segment::Named(name) => {
                params.insert(name.clone(), (*part).to_string());
            }
        }
    }
    Some(params)
}

/// Pluggable facet handling route registration and path resolution.
///
/// Routes are stored in registration order; resolution checks exact-only
/// patterns before patterns with named segments, matching the first
/// registered candidate within each tier (§4.5).
pub struct RouterFacetImpl {
    source: String,
    routes: RwLock<Vec<Route>>,
    initialized: AtomicBool,
    disposed: AtomicBool,
}

impl RouterFacetImpl {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            routes: RwLock::new(Vec::new()),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }
}

impl Default for RouterFacetImpl {
    fn default() -> Self {
        Self::new("default-router")
    }
}

impl RouterFacet for RouterFacetImpl {
    fn register_route(&self, pattern: &str, handler: RouteHandler, overwrite: bool) -> Result<(), SubflowError> {
        let mut routes = self.routes.write().unwrap();
        if let Some(pos) = routes.iter().position(|r| r.pattern == pattern) {
            if !overwrite {
                return Err(SubflowError::validation(format!(
                    "route pattern '{pattern}' already exists"
                )));
            }
            routes[pos] = Route {
                pattern: pattern.to_string(),
                segments: parse_pattern(pattern),
                handler,
            };
            return Ok(());
        }
        routes.push(Route {
            pattern: pattern.to_string(),
            segments: parse_pattern(pattern),
            handler,
        });
        Ok(())
    }

    fn unregister_route(&self, pattern: &str) -> bool {
        let mut routes = self.routes.write().unwrap();
        let before = routes.len();
        routes.retain(|r| r.pattern != pattern);
        routes.len() != before
    }

    fn resolve_route(&self, path: &str) -> Option<ResolvedRoute> {
        let routes = self.routes.read().unwrap();

        for route in routes.iter().filter(|r| is_exact(&r.segments)) {
            if let Some(params) = match_path(&route.segments, path) {
                return Some(ResolvedRoute {
                    handler: route.handler.clone(),
                    params,
                });
            }
        }

        for route in routes.iter().filter(|r| !is_exact(&r.segments)) {
            if let Some(params) = match_path(&route.segments, path) {
                return Some(ResolvedRoute {
                    handler: route.handler.clone(),
                    params,
                });
            }
        }

        None
    }
}

#[async_trait]
impl Facet for RouterFacetImpl {
    fn kind(&self) -> &'static str {
        "router"
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

    fn as_router(&self) -> Option<&dyn RouterFacet> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn echo_handler() -> RouteHandler {
        Arc::new(move |message, params, _options| {
            Box::pin(async move { Ok(json!({"id": message.id, "params": params})) })
        })
    }

    #[test]
    fn exact_path_takes_precedence_over_wildcard() {
        let router = RouterFacetImpl::new("test");
        router.register_route("users/:id", echo_handler(), false).unwrap();
        router.register_route("users/me", echo_handler(), false).unwrap();

        let resolved = router.resolve_route("users/me").unwrap();
        assert!(resolved.params.is_empty());
    }

    #[test]
    fn named_segment_is_captured() {
        let router = RouterFacetImpl::new("test");
        router.register_route("users/:id", echo_handler(), false).unwrap();
        let resolved = router.resolve_route("users/42").unwrap();
        assert_eq!(resolved.params.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn duplicate_pattern_without_overwrite_fails() {
        let router = RouterFacetImpl::new("test");
        router.register_route("a/b", echo_handler(), false).unwrap();
        assert!(router.register_route("a/b", echo_handler(), false).is_err());
        assert!(router.register_route("a/b", echo_handler(), true).is_ok());
    }

    #[test]
    fn unregister_reports_whether_anything_was_removed() {
        let router = RouterFacetImpl::new("test");
        router.register_route("a/b", echo_handler(), false).unwrap();
        assert!(router.unregister_route("a/b"));
        assert!(!router.unregister_route("a/b"));
    }
}
