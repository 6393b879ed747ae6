use crate::error::{EstateError, Result};
use crate::estate::{LocalEstate, RemoteEstate};
use std::collections::HashMap;

/// Owns the single local estate and the set of known remotes, indexed by
/// eid, name, and (host, port) for O(1) lookup along any axis.
///
/// Mutation is serialized by the stack's service loop (the registry itself
/// does no locking); external readers see a consistent snapshot between
/// service ticks.
pub struct EstateRegistry {
    local: LocalEstate,
    remotes: HashMap<u32, RemoteEstate>,
    by_name: HashMap<String, u32>,
    by_hostport: HashMap<(String, u16), u32>,
    next_eid: u32,
    pub auto_accept: bool,
}

impl EstateRegistry {
    pub fn new(local: LocalEstate, auto_accept: bool) -> Self {
        Self {
            local,
            remotes: HashMap::new(),
            by_name: HashMap::new(),
            by_hostport: HashMap::new(),
            next_eid: 2,
            auto_accept,
        }
    }

    pub fn local(&self) -> &LocalEstate {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut LocalEstate {
        &mut self.local
    }

    /// Hand out the next unused remote eid. Only meaningful when
    /// `local.main` is true -- only a main estate assigns eids.
    pub fn next_remote_eid(&mut self) -> u32 {
        while self.remotes.contains_key(&self.next_eid) || self.next_eid == self.local.eid {
            self.next_eid = self.next_eid.wrapping_add(1).max(1);
        }
        let eid = self.next_eid;
        self.next_eid = self.next_eid.wrapping_add(1).max(1);
        eid
    }

    fn check_no_collision(&self, remote: &RemoteEstate, replacing: Option<u32>) -> Result<()> {
        if let Some(existing) = self.remotes.get(&remote.eid) {
            if replacing != Some(existing.eid) {
                return Err(EstateError::DuplicateEid(remote.eid));
            }
        }
        if let Some(&owner) = self.by_name.get(&remote.name) {
            if Some(owner) != replacing && owner != remote.eid {
                return Err(EstateError::DuplicateName(remote.name.clone()));
            }
        }
        let key = (remote.host.clone(), remote.port);
        if let Some(&owner) = self.by_hostport.get(&key) {
            if Some(owner) != replacing && owner != remote.eid {
                return Err(EstateError::DuplicateHostPort(remote.host.clone(), remote.port));
            }
        }
        Ok(())
    }

    /// Insert a new remote, or overwrite the one at the same eid (key
    /// rotation on a repeat Join). Rejects a collision on name or
    /// (host, port) with a *different* eid.
    pub fn insert_remote(&mut self, remote: RemoteEstate) -> Result<()> {
        let replacing = self.remotes.contains_key(&remote.eid).then_some(remote.eid);
        self.check_no_collision(&remote, replacing)?;

        if let Some(old) = self.remotes.get(&remote.eid) {
            self.by_name.remove(&old.name);
            self.by_hostport.remove(&(old.host.clone(), old.port));
        }

        self.by_name.insert(remote.name.clone(), remote.eid);
        self.by_hostport
            .insert((remote.host.clone(), remote.port), remote.eid);
        self.remotes.insert(remote.eid, remote);
        Ok(())
    }

    pub fn remove_remote(&mut self, eid: u32) -> Option<RemoteEstate> {
        let remote = self.remotes.remove(&eid)?;
        self.by_name.remove(&remote.name);
        self.by_hostport.remove(&(remote.host.clone(), remote.port));
        Some(remote)
    }

    pub fn get_remote(&self, eid: u32) -> Option<&RemoteEstate> {
        self.remotes.get(&eid)
    }

    pub fn get_remote_mut(&mut self, eid: u32) -> Option<&mut RemoteEstate> {
        self.remotes.get_mut(&eid)
    }

    pub fn all_remotes(&self) -> impl Iterator<Item = &RemoteEstate> {
        self.remotes.values()
    }

    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }

    pub fn fetch_by_host_port(&self, host: &str, port: u16) -> Option<&RemoteEstate> {
        let eid = self.by_hostport.get(&(host.to_string(), port))?;
        self.remotes.get(eid)
    }

    pub fn fetch_by_keys(&self, verhex: &str, pubhex: &str) -> Option<&RemoteEstate> {
        self.remotes
            .values()
            .find(|r| r.verhex == verhex || r.pubhex == pubhex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estate::Acceptance;

    fn local() -> LocalEstate {
        LocalEstate::new("main-estate", true, "127.0.0.1", 7530)
    }

    fn remote(eid: u32, name: &str, port: u16) -> RemoteEstate {
        RemoteEstate::new(eid, name, "127.0.0.1", port, Acceptance::Pending, "ver", "pub")
    }

    #[test]
    fn insert_and_lookup_by_all_indices() {
        let mut registry = EstateRegistry::new(local(), true);
        registry.insert_remote(remote(2, "b", 7531)).unwrap();

        assert_eq!(registry.get_remote(2).unwrap().name, "b");
        assert_eq!(registry.fetch_by_host_port("127.0.0.1", 7531).unwrap().eid, 2);
        assert_eq!(
            registry
                .fetch_by_keys("ver", "nope")
                .unwrap()
                .eid,
            2
        );
    }

    #[test]
    fn insert_rejects_duplicate_hostport_different_eid() {
        let mut registry = EstateRegistry::new(local(), true);
        registry.insert_remote(remote(2, "b", 7531)).unwrap();

        let err = registry.insert_remote(remote(3, "c", 7531)).unwrap_err();
        assert!(matches!(err, EstateError::DuplicateHostPort(_, 7531)));
    }

    #[test]
    fn insert_allows_key_rotation_at_same_eid() {
        let mut registry = EstateRegistry::new(local(), true);
        registry.insert_remote(remote(2, "b", 7531)).unwrap();

        let mut rotated = remote(2, "b", 7531);
        rotated.verhex = "new-ver".to_string();
        registry.insert_remote(rotated).unwrap();

        assert_eq!(registry.get_remote(2).unwrap().verhex, "new-ver");
        assert_eq!(registry.remote_count(), 1);
    }

    #[test]
    fn remove_clears_all_indices() {
        let mut registry = EstateRegistry::new(local(), true);
        registry.insert_remote(remote(2, "b", 7531)).unwrap();
        registry.remove_remote(2);

        assert!(registry.get_remote(2).is_none());
        assert!(registry.fetch_by_host_port("127.0.0.1", 7531).is_none());
    }

    #[test]
    fn next_remote_eid_skips_taken_and_local() {
        let mut registry = EstateRegistry::new(local(), true);
        registry.local_mut().assign_eid(1);
        registry.insert_remote(remote(2, "b", 7531)).unwrap();

        let eid = registry.next_remote_eid();
        assert_eq!(eid, 3);
    }
}
