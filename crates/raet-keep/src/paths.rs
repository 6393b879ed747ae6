use crate::error::{KeepError, Result};
use crate::records::Verify;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Scoped directory tree for one stack's persisted state:
/// `<root>/<stackname>/{local,remote}/`.
///
/// A single `KeepPaths` is shared by the road keep and the safe keep -- they
/// differ only in the `prefix` passed to each call, not in the directory
/// layout.
#[derive(Debug, Clone)]
pub struct KeepPaths {
    local_dir: PathBuf,
    remote_dir: PathBuf,
    ext: String,
}

fn reject_whitespace(path: &Path) -> Result<()> {
    if path.to_string_lossy().chars().any(char::is_whitespace) {
        return Err(KeepError::InvalidPath(path.to_path_buf()));
    }
    Ok(())
}

impl KeepPaths {
    pub fn new(root: impl AsRef<Path>, stackname: &str) -> Result<Self> {
        Self::with_ext(root, stackname, "json")
    }

    pub fn with_ext(root: impl AsRef<Path>, stackname: &str, ext: &str) -> Result<Self> {
        let base = root.as_ref().join(stackname);
        reject_whitespace(&base)?;

        let local_dir = base.join("local");
        let remote_dir = base.join("remote");
        for dir in [&local_dir, &remote_dir] {
            fs::create_dir_all(dir).map_err(|source| KeepError::Io {
                path: dir.clone(),
                source,
            })?;
        }

        Ok(Self {
            local_dir,
            remote_dir,
            ext: ext.to_string(),
        })
    }

    fn local_file(&self, prefix: &str) -> PathBuf {
        self.local_dir.join(format!("{prefix}.{}", self.ext))
    }

    fn remote_file(&self, prefix: &str, uid: &str) -> PathBuf {
        self.remote_dir
            .join(format!("{prefix}.{uid}.{}", self.ext))
    }

    /// Write `data` to `path` atomically: serialize to a sibling temp file,
    /// fsync it, then rename over the destination.
    fn atomic_dump(path: &Path, data: &serde_json::Value) -> Result<()> {
        reject_whitespace(path)?;

        let tmp_path = path.with_extension(format!(
            "{}.tmp",
            path.extension().and_then(|e| e.to_str()).unwrap_or("json")
        ));

        let bytes = serde_json::to_vec_pretty(data).map_err(KeepError::Serialize)?;

        {
            let mut file = File::create(&tmp_path).map_err(|source| KeepError::Io {
                path: tmp_path.clone(),
                source,
            })?;
            file.write_all(&bytes).map_err(|source| KeepError::Io {
                path: tmp_path.clone(),
                source,
            })?;
            file.sync_all().map_err(|source| KeepError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        }

        fs::rename(&tmp_path, path).map_err(|source| KeepError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }

    fn load(path: &Path) -> Result<Option<serde_json::Value>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(None),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(_) => Ok(None),
        }
    }

    fn clear(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(KeepError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn dump_local<T: Verify>(&self, prefix: &str, record: &T) -> Result<()> {
        if !record.verify() {
            return Err(KeepError::SchemaMismatch(prefix.to_string()));
        }
        let value = crate::records::to_value(record).map_err(KeepError::Serialize)?;
        Self::atomic_dump(&self.local_file(prefix), &value)
    }

    pub fn load_local<T: DeserializeOwned>(&self, prefix: &str) -> Result<Option<T>> {
        match Self::load(&self.local_file(prefix))? {
            Some(value) => Ok(crate::records::from_value(value).ok()),
            None => Ok(None),
        }
    }

    pub fn clear_local(&self, prefix: &str) -> Result<()> {
        Self::clear(&self.local_file(prefix))
    }

    pub fn dump_remote<T: Verify>(&self, prefix: &str, uid: &str, record: &T) -> Result<()> {
        if !record.verify() {
            return Err(KeepError::SchemaMismatch(format!("{prefix}.{uid}")));
        }
        let value = crate::records::to_value(record).map_err(KeepError::Serialize)?;
        Self::atomic_dump(&self.remote_file(prefix, uid), &value)
    }

    pub fn load_remote<T: DeserializeOwned>(&self, prefix: &str, uid: &str) -> Result<Option<T>> {
        match Self::load(&self.remote_file(prefix, uid))? {
            Some(value) => Ok(crate::records::from_value(value).ok()),
            None => Ok(None),
        }
    }

    pub fn clear_remote(&self, prefix: &str, uid: &str) -> Result<()> {
        Self::clear(&self.remote_file(prefix, uid))
    }

    /// Parse a remote-directory filename as `<prefix>.<uid>.<ext>`.
    /// Returns `None` for anything that doesn't match (malformed names are
    /// skipped silently, never treated as an error).
    fn parse_remote_filename<'a>(&self, filename: &'a str, prefix: &str) -> Option<&'a str> {
        let head = format!("{prefix}.");
        let tail = format!(".{}", self.ext);
        let rest = filename.strip_prefix(&head)?;
        let uid = rest.strip_suffix(&tail)?;
        if uid.is_empty() || uid.contains('.') {
            return None;
        }
        Some(uid)
    }

    pub fn load_all_remote<T: DeserializeOwned>(&self, prefix: &str) -> Result<BTreeMap<String, T>> {
        let mut out = BTreeMap::new();
        let entries = match fs::read_dir(&self.remote_dir) {
            Ok(entries) => entries,
            Err(source) => {
                return Err(KeepError::Io {
                    path: self.remote_dir.clone(),
                    source,
                })
            }
        };

        for entry in entries.flatten() {
            let filename = entry.file_name();
            let Some(filename) = filename.to_str() else {
                continue;
            };
            let Some(uid) = self.parse_remote_filename(filename, prefix) else {
                continue;
            };
            if let Some(record) = self.load_remote::<T>(prefix, uid)? {
                out.insert(uid.to_string(), record);
            }
        }
        Ok(out)
    }

    pub fn clear_all_remote(&self, prefix: &str) -> Result<()> {
        let entries = match fs::read_dir(&self.remote_dir) {
            Ok(entries) => entries,
            Err(source) => {
                return Err(KeepError::Io {
                    path: self.remote_dir.clone(),
                    source,
                })
            }
        };

        for entry in entries.flatten() {
            let filename = entry.file_name();
            let Some(filename) = filename.to_str() else {
                continue;
            };
            if self.parse_remote_filename(filename, prefix).is_some() {
                Self::clear(&entry.path())?;
            }
        }
        Ok(())
    }
}
