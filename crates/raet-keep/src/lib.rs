//! Durable key/value persistence for RAET estate records.
//!
//! One file per record under `<root>/<stackname>/{local,remote}/`, written
//! atomically (temp file + fsync + rename). The road keep (non-secret fields)
//! and the safe keep (key material) share the same directory tree and differ
//! only by filename prefix (`"road"` / `"safe"`).

mod error;
mod paths;
mod records;

pub use error::{KeepError, Result};
pub use paths::KeepPaths;
pub use records::{RoadRecordLocal, RoadRecordRemote, SafeRecordLocal, SafeRecordRemote, Verify};

/// Filename prefix for non-secret estate fields.
pub const ROAD_PREFIX: &str = "road";
/// Filename prefix for secret-adjacent estate fields.
pub const SAFE_PREFIX: &str = "safe";

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_local() -> RoadRecordLocal {
        RoadRecordLocal {
            eid: 1,
            name: "alpha".into(),
            main: true,
            host: "127.0.0.1".into(),
            port: 7530,
            sid: 5,
        }
    }

    #[test]
    fn verify_accepts_exact_schema() {
        assert!(sample_local().verify());
    }

    #[test]
    fn round_trip_local_record() {
        let dir = tempdir().unwrap();
        let keep = KeepPaths::new(dir.path(), "stack1").unwrap();
        let record = sample_local();

        keep.dump_local(ROAD_PREFIX, &record).unwrap();
        let loaded: RoadRecordLocal = keep.load_local(ROAD_PREFIX).unwrap().expect("present");
        assert_eq!(loaded, record);
    }

    #[test]
    fn missing_local_record_is_none() {
        let dir = tempdir().unwrap();
        let keep = KeepPaths::new(dir.path(), "stack1").unwrap();
        let loaded: Option<RoadRecordLocal> = keep.load_local(ROAD_PREFIX).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn clear_local_is_idempotent() {
        let dir = tempdir().unwrap();
        let keep = KeepPaths::new(dir.path(), "stack1").unwrap();
        keep.dump_local(ROAD_PREFIX, &sample_local()).unwrap();

        keep.clear_local(ROAD_PREFIX).unwrap();
        keep.clear_local(ROAD_PREFIX).unwrap();

        let loaded: Option<RoadRecordLocal> = keep.load_local(ROAD_PREFIX).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn load_all_remote_skips_malformed_filenames_and_unreadable_entries() {
        let dir = tempdir().unwrap();
        let keep = KeepPaths::new(dir.path(), "stack1").unwrap();

        let good = RoadRecordRemote {
            uid: 2,
            name: "beta".into(),
            host: "127.0.0.1".into(),
            port: 7531,
            sid: 1,
            rsid: 0,
        };
        keep.dump_remote(ROAD_PREFIX, "2", &good).unwrap();

        // Malformed filename: wrong prefix, no uid segment, wrong extension.
        std::fs::write(dir.path().join("stack1/remote/road..json"), b"{}").unwrap();
        std::fs::write(dir.path().join("stack1/remote/other.2.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("stack1/remote/road.3.txt"), b"{}").unwrap();
        // Truncated / unreadable JSON under a well-formed filename.
        std::fs::write(dir.path().join("stack1/remote/road.9.json"), b"not json").unwrap();

        let all: std::collections::BTreeMap<String, RoadRecordRemote> =
            keep.load_all_remote(ROAD_PREFIX).unwrap();

        assert_eq!(all.len(), 1);
        assert_eq!(all["2"], good);
    }

    #[test]
    fn dump_rejects_whitespace_in_path() {
        let dir = tempdir().unwrap();
        let keep = KeepPaths::new(dir.path(), "stack with space").unwrap_err();
        assert!(matches!(keep, KeepError::InvalidPath(_)));
    }

    #[test]
    fn dump_rejects_record_failing_verify() {
        #[derive(serde::Serialize)]
        struct Bogus {
            eid: u32,
        }
        impl Verify for Bogus {
            const REQUIRED_FIELDS: &'static [&'static str] = &["eid", "name"];
        }

        let dir = tempdir().unwrap();
        let keep = KeepPaths::new(dir.path(), "stack1").unwrap();
        let err = keep.dump_local(ROAD_PREFIX, &Bogus { eid: 1 }).unwrap_err();
        assert!(matches!(err, KeepError::SchemaMismatch(_)));
    }
}
