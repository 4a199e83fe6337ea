//! `SecurityError`: the `PermissionError` class of the core error taxonomy,
//! plus the identity-construction failures `createIdentity` documents with
//! stable messages (§4.6, §7).

use std::fmt;

/// Errors raised by the capability/permission layer.
///
/// `Display` carries the exact fragments `createIdentity` and the
/// `require*` wrappers promise callers — tests match on these with
/// `.to_string().contains(...)`, so reword with care.
#[derive(Debug, Clone)]
pub enum SecurityError {
    /// `createIdentity` was handed a registry that couldn't resolve the
    /// owner PKR, or some other malformed-registry condition.
    InvalidRegistry(String),
    /// The owner PKR passed to `createIdentity` doesn't resolve to a
    /// known Principal.
    InvalidOwner(String),
    /// The kernel passed to `createIdentity` does not implement
    /// `MessageKernel` (checked at the type level in Rust, but the
    /// message is kept for parity with callers building on dynamic
    /// dispatch, e.g. a trait object resolved at runtime).
    MissingSendProtected,
    /// `requireAuth` was called with something other than `"read"`,
    /// `"write"`, or `"grant"`.
    UnknownAuthType(String),
    /// `requireAuth` was handed `None` where a handler was required.
    MissingHandler,
    /// `requireRead`/`requireWrite`/`requireGrant` denied the call.
    PermissionDenied(String),
}

impl fmt::Display for SecurityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRegistry(msg) => write!(f, "invalid principals registry: {msg}"),
            Self::InvalidOwner(msg) => write!(f, "invalid owner PKR: {msg}"),
            Self::MissingSendProtected => write!(f, "must support sendProtected"),
            Self::UnknownAuthType(kind) => write!(f, "unknown auth type: '{kind}'"),
            Self::MissingHandler => write!(f, "handler must be a function"),
            Self::PermissionDenied(msg) => write!(f, "permission denied: {msg}"),
        }
    }
}

impl std::error::Error for SecurityError {}

impl From<SecurityError> for subflow_core::SubflowError {
    fn from(err: SecurityError) -> Self {
        subflow_core::SubflowError::validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_send_protected_has_stable_message() {
        assert_eq!(SecurityError::MissingSendProtected.to_string(), "must support sendProtected");
    }

    #[test]
    fn invalid_owner_contains_fragment() {
        let err = SecurityError::InvalidOwner("not found".into());
        assert!(err.to_string().contains("invalid owner PKR"));
    }
}
