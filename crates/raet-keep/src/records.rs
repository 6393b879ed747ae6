use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// A record that can be checked against its own declared field schema
/// before being flushed to disk.
///
/// Every concrete record type names the exact set of fields a valid instance
/// must carry (`REQUIRED_FIELDS`). `verify()` serializes the record and
/// compares the resulting object's key set against that schema -- set
/// equality, not order, per the on-disk format contract.
pub trait Verify: Serialize {
    const REQUIRED_FIELDS: &'static [&'static str];

    fn verify(&self) -> bool {
        let value = match serde_json::to_value(self) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let Value::Object(map) = value else {
            return false;
        };
        let present: BTreeSet<&str> = map.keys().map(String::as_str).collect();
        let required: BTreeSet<&str> = Self::REQUIRED_FIELDS.iter().copied().collect();
        present == required
    }
}

/// Non-secret fields of the local estate (the "road keep").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct RoadRecordLocal {
    pub eid: u32,
    pub name: String,
    pub main: bool,
    pub host: String,
    pub port: u16,
    pub sid: u32,
}

impl Verify for RoadRecordLocal {
    const REQUIRED_FIELDS: &'static [&'static str] =
        &["eid", "name", "main", "host", "port", "sid"];
}

/// Secret-adjacent fields of the local estate (the "safe keep").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct SafeRecordLocal {
    pub eid: u32,
    pub name: String,
    pub sighex: String,
    pub prihex: String,
}

impl Verify for SafeRecordLocal {
    const REQUIRED_FIELDS: &'static [&'static str] = &["eid", "name", "sighex", "prihex"];
}

/// Non-secret fields of a remote estate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct RoadRecordRemote {
    pub uid: u32,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub sid: u32,
    pub rsid: u32,
}

impl Verify for RoadRecordRemote {
    const REQUIRED_FIELDS: &'static [&'static str] =
        &["uid", "name", "host", "port", "sid", "rsid"];
}

/// Secret-adjacent fields of a remote estate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct SafeRecordRemote {
    pub eid: u32,
    pub name: String,
    pub acceptance: String,
    pub verhex: String,
    pub pubhex: String,
}

impl Verify for SafeRecordRemote {
    const REQUIRED_FIELDS: &'static [&'static str] =
        &["eid", "name", "acceptance", "verhex", "pubhex"];
}

/// Blanket helper so callers can round-trip through `serde_json::Value`
/// without repeating the `DeserializeOwned` bound at every call site.
pub(crate) fn to_value<T: Serialize>(record: &T) -> serde_json::Result<Value> {
    serde_json::to_value(record)
}

pub(crate) fn from_value<T: DeserializeOwned>(value: Value) -> serde_json::Result<T> {
    serde_json::from_value(value)
}
