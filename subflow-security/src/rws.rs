//! `ReaderWriterSet`: the read/write/grant PKR sets associated with one
//! owned resource (§3).

use crate::principal::Pkr;
use std::collections::HashSet;
use std::sync::RwLock;

/// Per-resource authorization sets, always including the owner in all
/// three.
///
/// Invariants enforced by construction and by every mutator: the owner is
/// never removable from any set; `write ⊆ read ∪ {owner}` (granting write
/// also grants read); grant membership only changes through
/// `add_reader`/`add_writer`'s own grant flag, never implicitly.
pub struct ReaderWriterSet {
    owner: Pkr,
    readers: RwLock<HashSet<Pkr>>,
    writers: RwLock<HashSet<Pkr>>,
    granters: RwLock<HashSet<Pkr>>,
}

impl ReaderWriterSet {
    pub fn new(owner: Pkr) -> Self {
        let mut readers = HashSet::new();
        readers.insert(owner);
        let mut writers = HashSet::new();
        writers.insert(owner);
        let mut granters = HashSet::new();
        granters.insert(owner);
        Self {
            owner,
            readers: RwLock::new(readers),
            writers: RwLock::new(writers),
            granters: RwLock::new(granters),
        }
    }

    pub fn owner(&self) -> Pkr {
        self.owner
    }

    pub fn can_read(&self, pkr: Pkr) -> bool {
        self.readers.read().unwrap().contains(&pkr)
    }

    pub fn can_write(&self, pkr: Pkr) -> bool {
        self.writers.read().unwrap().contains(&pkr)
    }

    pub fn can_grant(&self, pkr: Pkr) -> bool {
        self.granters.read().unwrap().contains(&pkr)
    }

    /// Adds `target` to the readers set. `also_grant` additionally adds it
    /// to the granters set — the RWS itself doesn't decide whether the
    /// caller was authorized to do this; that check belongs to
    /// `Identity::grant_reader`.
    pub fn add_reader(&self, target: Pkr, also_grant: bool) {
        self.readers.write().unwrap().insert(target);
        if also_grant {
            self.granters.write().unwrap().insert(target);
        }
    }

    /// Adds `target` to both writers and readers (`write ⊆ read ∪
    /// {owner}`).
    pub fn add_writer(&self, target: Pkr, also_grant: bool) {
        self.writers.write().unwrap().insert(target);
        self.readers.write().unwrap().insert(target);
        if also_grant {
            self.granters.write().unwrap().insert(target);
        }
    }

    /// The owner can never be removed from any set.
    pub fn remove_reader(&self, target: Pkr) {
        if target == self.owner {
            return;
        }
        self.readers.write().unwrap().remove(&target);
        self.granters.write().unwrap().remove(&target);
    }

    pub fn remove_writer(&self, target: Pkr) {
        if target == self.owner {
            return;
        }
        self.writers.write().unwrap().remove(&target);
    }

    /// Strips `target`'s grant right only, leaving read/write membership
    /// untouched (used by `Identity::demote`).
    pub fn remove_granter(&self, target: Pkr) {
        if target == self.owner {
            return;
        }
        self.granters.write().unwrap().remove(&target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn pkr() -> Pkr {
        Pkr::new(Uuid::new_v4())
    }

    #[test]
    fn owner_is_a_member_of_every_set() {
        let owner = pkr();
        let rws = ReaderWriterSet::new(owner);
        assert!(rws.can_read(owner));
        assert!(rws.can_write(owner));
        assert!(rws.can_grant(owner));
    }

    #[test]
    fn write_access_implies_read_access() {
        let rws = ReaderWriterSet::new(pkr());
        let target = pkr();
        rws.add_writer(target, false);
        assert!(rws.can_write(target));
        assert!(rws.can_read(target));
    }

    #[test]
    fn owner_survives_removal_attempts() {
        let owner = pkr();
        let rws = ReaderWriterSet::new(owner);
        rws.remove_reader(owner);
        rws.remove_writer(owner);
        assert!(rws.can_read(owner));
        assert!(rws.can_write(owner));
    }

    #[test]
    fn grant_is_independent_of_plain_reader_add() {
        let rws = ReaderWriterSet::new(pkr());
        let target = pkr();
        rws.add_reader(target, false);
        assert!(rws.can_read(target));
        assert!(!rws.can_grant(target));
    }

    #[test]
    fn remove_granter_leaves_read_membership_intact() {
        let rws = ReaderWriterSet::new(pkr());
        let target = pkr();
        rws.add_reader(target, true);
        assert!(rws.can_grant(target));
        rws.remove_granter(target);
        assert!(!rws.can_grant(target));
        assert!(rws.can_read(target));
    }
}
