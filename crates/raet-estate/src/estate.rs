use raet_crypto::KeyPairBundle;
use serde::{Deserialize, Serialize};

/// Trust state of a remote estate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Acceptance {
    Pending,
    Accepted,
    Rejected,
}

impl Acceptance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Acceptance::Pending => "pending",
            Acceptance::Accepted => "accepted",
            Acceptance::Rejected => "rejected",
        }
    }
}

/// The process-local identity: a unique eid (0 means unassigned), a name,
/// bound (host, port), a monotonic session id, the `main` flag, and the two
/// asymmetric keypairs (signing + private/encryption).
pub struct LocalEstate {
    pub eid: u32,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub sid: u32,
    pub main: bool,
    pub keys: KeyPairBundle,
}

impl LocalEstate {
    pub fn new(name: impl Into<String>, main: bool, host: impl Into<String>, port: u16) -> Self {
        Self {
            eid: 0,
            name: name.into(),
            host: host.into(),
            port,
            sid: 1,
            main,
            keys: KeyPairBundle::generate(),
        }
    }

    pub fn is_unbound(&self) -> bool {
        self.eid == 0
    }

    /// Adopt an authoritative eid assigned by a main estate during Join.
    /// Only legal while the local estate is still unbound.
    pub fn assign_eid(&mut self, eid: u32) {
        if self.is_unbound() {
            self.eid = eid;
        }
    }

    /// Advance to a fresh session, e.g. after a restart that did not
    /// restore a persisted `sid`.
    pub fn bump_sid(&mut self) {
        self.sid = self.sid.wrapping_add(1);
    }
}

/// A known peer. Created on completion of a Join correspondence, mutated by
/// subsequent Joins (key rotation) or Allows, destroyed by explicit removal.
#[derive(Debug, Clone)]
pub struct RemoteEstate {
    pub eid: u32,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub sid: u32,
    pub rsid: u32,
    pub tid: u32,
    pub acceptance: Acceptance,
    pub verhex: String,
    pub pubhex: String,
}

impl RemoteEstate {
    pub fn new(
        eid: u32,
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        acceptance: Acceptance,
        verhex: impl Into<String>,
        pubhex: impl Into<String>,
    ) -> Self {
        Self {
            eid,
            name: name.into(),
            host: host.into(),
            port,
            sid: 0,
            rsid: 0,
            tid: 0,
            acceptance,
            verhex: verhex.into(),
            pubhex: pubhex.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.acceptance == Acceptance::Accepted
    }

    /// Allocate the next transaction id for a conversation initiated with
    /// this remote.
    pub fn next_tid(&mut self) -> u32 {
        self.tid = self.tid.wrapping_add(1);
        self.tid
    }
}
