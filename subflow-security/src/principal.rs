//! `Principal`, `Pkr`, and `PrincipalRegistry` (§3, §4.6).
//!
//! A `Pkr` is deliberately a bare newtype over a `uuid::Uuid` with a
//! crate-private constructor: nothing outside this crate can mint one
//! except by cloning a `Pkr` a `PrincipalRegistry` already handed out,
//! which is what "opaque and non-forgeable within the process" means in a
//! language with no capability-secure reference type of its own.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Instant;
use uuid::Uuid;

/// An opaque, non-forgeable reference to a [`Principal`] held by a
/// [`PrincipalRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pkr(Uuid);

impl Pkr {
    pub(crate) fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for Pkr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pkr:{}", self.0)
    }
}

/// The kind of capability a [`Principal`] holds (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalKind {
    /// A first-class actor with no further restriction on what it can own
    /// or be granted.
    TopLevel,
    /// A remote peer reachable through a transport connection; see
    /// [`Friend`] for the connection-state fields this kind carries.
    Friend,
    /// A capability scoped to one owned resource rather than an actor.
    Resource,
}

/// Connection bookkeeping for a `Friend`-kind principal (§4.6).
///
/// `connect`/`disconnect` only flip `connected`; `disconnect` leaves
/// `last_seen` at whatever it was stamped to on the most recent
/// `connect`, matching the source's asymmetric behavior rather than
/// "fixing" it into a richer disconnect timestamp.
pub struct FriendState {
    pub endpoint: String,
    pub session_key: Option<String>,
    connected: AtomicBool,
    last_seen: RwLock<Option<Instant>>,
}

impl FriendState {
    pub fn new(endpoint: impl Into<String>, session_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            session_key,
            connected: AtomicBool::new(false),
            last_seen: RwLock::new(None),
        }
    }

    pub fn connect(&self) {
        self.connected.store(true, Ordering::Release);
        *self.last_seen.write().unwrap() = Some(Instant::now());
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn last_seen(&self) -> Option<Instant> {
        *self.last_seen.read().unwrap()
    }
}

/// A capability-holding entity: a stable UUID plus the kind of capability
/// it holds (§3). `Friend` principals additionally carry connection state.
pub struct Principal {
    id: Uuid,
    kind: PrincipalKind,
    friend: Option<FriendState>,
}

impl Principal {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    /// `Some` only for `PrincipalKind::Friend` principals.
    pub fn friend(&self) -> Option<&FriendState> {
        self.friend.as_ref()
    }
}

/// Process-global-by-convention registry of live Principals, resolving
/// [`Pkr`]s to the [`Principal`] they name (§4.6).
///
/// Constructed explicitly by the host rather than reached for as an
/// implicit singleton (§9, "Global mutable state") — a `MessageSystem`
/// holds one `Arc<PrincipalRegistry>` and shares it with every `Identity`
/// it creates.
#[derive(Default)]
pub struct PrincipalRegistry {
    principals: DashMap<Uuid, Principal>,
}

impl PrincipalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a fresh, non-forgeable PKR for a new Principal of `kind`.
    pub fn create_principal(&self, kind: PrincipalKind) -> Pkr {
        self.create_friend(kind, None)
    }

    /// Creates a `Friend`-kind principal with endpoint/session-key state.
    /// `kind` is accepted for symmetry with `create_principal` but is
    /// expected to be `PrincipalKind::Friend` when `friend` is `Some`.
    pub fn create_friend(&self, kind: PrincipalKind, friend: Option<FriendState>) -> Pkr {
        let id = Uuid::new_v4();
        self.principals.insert(id, Principal { id, kind, friend });
        Pkr::new(id)
    }

    /// Resolves a PKR to its Principal. Per §4.6 this "throws" on an
    /// unknown PKR in the source; here that's `Err` rather than a panic.
    pub fn resolve_pkr(&self, pkr: Pkr) -> Result<dashmap::mapref::one::Ref<'_, Uuid, Principal>, String> {
        self.principals
            .get(&pkr.uuid())
            .ok_or_else(|| format!("no principal registered for {pkr}"))
    }

    pub fn contains(&self, pkr: Pkr) -> bool {
        self.principals.contains_key(&pkr.uuid())
    }

    /// All known PKRs, in no particular order (`DashMap` iteration order
    /// is not meaningful).
    pub fn list_principals(&self) -> Vec<Pkr> {
        self.principals.iter().map(|entry| Pkr::new(*entry.key())).collect()
    }
}
