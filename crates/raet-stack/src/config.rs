use raet_packet::{BodyKind, CoatKind, FootKind, HeadKind};
use std::path::PathBuf;

/// Options recognized when constructing a `RoadStack`, matching the
/// protocol's `{ name, main, dirpath, eid, ha, bufcnt, auto_accept, Hk,
/// Bk, Fk, Ck, Bf, Wf }` configuration surface.
#[derive(Debug, Clone)]
pub struct StackConfig {
    pub name: String,
    pub main: bool,
    pub dirpath: PathBuf,
    pub eid: u32,
    pub host: String,
    pub port: u16,
    pub bufcnt: usize,
    pub auto_accept: bool,
    pub hk: HeadKind,
    pub bk: BodyKind,
    pub fk: FootKind,
    pub ck: CoatKind,
    /// Default broadcast flag for outbound Messages that don't override it.
    pub bf: bool,
    /// Default wait-for-ack flag for outbound Messages that don't override it.
    pub wf: bool,
}

impl StackConfig {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            main: false,
            dirpath: PathBuf::from("."),
            eid: 0,
            host: host.into(),
            port,
            bufcnt: 2,
            auto_accept: false,
            hk: HeadKind::Raet,
            bk: BodyKind::Json,
            fk: FootKind::Nacl,
            ck: CoatKind::Nacl,
            bf: false,
            wf: false,
        }
    }

    pub fn main(mut self, main: bool) -> Self {
        self.main = main;
        self
    }

    pub fn dirpath(mut self, dirpath: impl Into<PathBuf>) -> Self {
        self.dirpath = dirpath.into();
        self
    }

    pub fn eid(mut self, eid: u32) -> Self {
        self.eid = eid;
        self
    }

    pub fn bufcnt(mut self, bufcnt: usize) -> Self {
        self.bufcnt = bufcnt;
        self
    }

    pub fn auto_accept(mut self, auto_accept: bool) -> Self {
        self.auto_accept = auto_accept;
        self
    }
}
