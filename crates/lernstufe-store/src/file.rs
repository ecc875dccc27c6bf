//! One JSON document per student under a state directory.
//!
//! The file name is the lowercase hex encoding of the UTF-8 student id, so
//! every id maps to exactly one path and no id can escape the directory. Ids
//! longer than [`MAX_ID_BYTES`] are named by the SHA-256 of the id instead;
//! the document records the full id, so a colliding name reads as corrupt.
//! History and statistics live in the same document, so a reset removes both
//! at once.
//!
//! Next to each document sits an empty `<key>.lock` file. Readers take a
//! shared advisory lock on it, writers an exclusive one, which keeps
//! separate processes on one directory from overwriting each other. Lock
//! files are never deleted: a process blocked on a removed lock file would
//! hold a lock nobody else can see.

use crate::backend::{BackendLock, StateBackend};
use crate::error::{Result, StoreError};
use fs4::fs_std::FileExt;
use lernstufe_core::{BanditState, StudentId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Current on-disk document version.
const DOCUMENT_VERSION: u32 = 1;
/// Longest id (in bytes) stored under its plain hex name; longer ids are
/// named by digest so every file name stays portable.
pub const MAX_ID_BYTES: usize = 120;
const DIGEST_PREFIX: &str = "sha256-";
const FALLBACK_TIMESTAMP: &str = "1970-01-01T00:00:00Z";
const TMP_SUFFIX: &str = ".tmp";
const LOCK_SUFFIX: &str = ".lock";

#[derive(Debug, Serialize, Deserialize)]
struct StoredState {
    version: u32,
    student_id: StudentId,
    updated_at: String,
    state: BanditState,
}

/// File-per-student backend with atomic commits.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    tmp_seq: AtomicU64,
}

impl FileBackend {
    /// Opens (and creates if needed) the state directory.
    ///
    /// # Errors
    /// [`StoreError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self {
            dir,
            tmp_seq: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Canonical path of the document for `id`.
    #[must_use]
    pub fn path_for(&self, id: &StudentId) -> PathBuf {
        self.dir.join(format!("{}.json", storage_key(id)))
    }

    fn lock_file(&self, id: &StudentId) -> Result<(PathBuf, File)> {
        let path = self.dir.join(format!("{}{LOCK_SUFFIX}", storage_key(id)));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        Ok((path, file))
    }

    fn tmp_path(&self, key: &str) -> PathBuf {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{key}.{}.{seq}{TMP_SUFFIX}", std::process::id()))
    }

    fn write_tmp(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    #[cfg(unix)]
    fn sync_dir(&self) {
        if let Err(e) = File::open(&self.dir).and_then(|d| d.sync_all()) {
            warn!(
                "Warning: failed to sync state directory {}: {}",
                self.dir.display(),
                e
            );
        }
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) {}

    /// Removes leftover temporary files of `key` from interrupted commits.
    /// Only called under the exclusive lock of the id, so no commit of
    /// another process can be in flight.
    fn sweep_tmp(&self, key: &str) -> Result<()> {
        let prefix = format!(".{key}.");
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name.ends_with(TMP_SUFFIX) {
                let path = entry.path();
                match fs::remove_file(&path) {
                    Ok(()) => debug!("removed stale temp file {}", path.display()),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(StoreError::io(path, e)),
                }
            }
        }
        Ok(())
    }
}

/// Lowercase hex of the UTF-8 bytes of `id`, or `sha256-<hex digest>` for
/// ids past [`MAX_ID_BYTES`]. The prefix is not hex, so the two forms never
/// collide.
fn storage_key(id: &StudentId) -> String {
    let bytes = id.as_str().as_bytes();
    if bytes.len() > MAX_ID_BYTES {
        let mut key = String::from(DIGEST_PREFIX);
        key.push_str(&hex(&Sha256::digest(bytes)));
        key
    } else {
        hex(bytes)
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

fn iso8601_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| FALLBACK_TIMESTAMP.to_string())
}

impl StateBackend for FileBackend {
    fn load(&self, id: &StudentId) -> Result<Option<BanditState>> {
        let path = self.path_for(id);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        let corrupt = |reason: String| StoreError::Corrupt {
            path: path.clone(),
            reason,
        };
        let doc: StoredState = serde_json::from_slice(&raw).map_err(|e| corrupt(e.to_string()))?;
        if doc.version != DOCUMENT_VERSION {
            return Err(corrupt(format!("unsupported version {}", doc.version)));
        }
        if &doc.student_id != id {
            return Err(corrupt(format!(
                "document belongs to student {:?}",
                doc.student_id.as_str()
            )));
        }
        if !doc.state.is_consistent() {
            return Err(corrupt(
                "per-arm statistics disagree with recorded history".to_string(),
            ));
        }
        Ok(Some(doc.state))
    }

    fn commit(&self, id: &StudentId, state: &BanditState) -> Result<()> {
        let key = storage_key(id);
        let target = self.dir.join(format!("{key}.json"));
        let doc = StoredState {
            version: DOCUMENT_VERSION,
            student_id: id.clone(),
            updated_at: iso8601_now(),
            state: state.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)?;

        let tmp = self.tmp_path(&key);
        if let Err(e) = Self::write_tmp(&tmp, &bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::io(tmp, e));
        }
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::io(target, e));
        }
        self.sync_dir();
        debug!(
            "committed {} observations to {}",
            state.history().len(),
            target.display()
        );
        Ok(())
    }

    fn remove(&self, id: &StudentId) -> Result<()> {
        let key = storage_key(id);
        let path = self.dir.join(format!("{key}.json"));
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(path, e)),
        }
        self.sweep_tmp(&key)?;
        self.sync_dir();
        Ok(())
    }

    fn lock_shared(&self, id: &StudentId) -> Result<BackendLock> {
        let (path, file) = self.lock_file(id)?;
        FileExt::lock_shared(&file).map_err(|e| StoreError::io(path, e))?;
        Ok(BackendLock::file(file))
    }

    fn lock_exclusive(&self, id: &StudentId) -> Result<BackendLock> {
        let (path, file) = self.lock_file(id)?;
        FileExt::lock_exclusive(&file).map_err(|e| StoreError::io(path, e))?;
        Ok(BackendLock::file(file))
    }
}
