use super::KeyValueStore;
use crate::errors::{FinderError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// File-backed store: each key maps to `<data_dir>/<key>.json`.
///
/// Readers take a shared lock on `<data_dir>/.store.lock`, writers an
/// exclusive one, so two processes pointed at the same directory serialize
/// their writes. Values are replaced through a temp file and `rename`.
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        // Keys become file names; keep them to a conservative charset
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(FinderError::Storage(format!("invalid key {:?}", key)));
        }
        Ok(self.data_dir.join(format!("{}.json", key)))
    }

    fn lock_file(&self) -> Result<File> {
        let path = self.data_dir.join(".store.lock");
        Ok(OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key)?;
        let lock = self.lock_file()?;
        lock.lock_shared()?;
        let result = match File::open(&path) {
            Ok(mut f) => {
                let mut s = String::new();
                match f.read_to_string(&mut s) {
                    Ok(_) => Ok(Some(s)),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        };
        let _ = lock.unlock();
        result
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key)?;
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;

        let tmp_path = self
            .data_dir
            .join(format!(".{}.json.tmp-{}", key, std::process::id()));
        let written = (|| -> std::io::Result<()> {
            let mut tmp = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            tmp.write_all(value.as_bytes())?;
            tmp.flush()?;
            tmp.sync_all()?;
            fs::rename(&tmp_path, &path)?;
            // Persist the rename itself (best-effort)
            if let Ok(dir) = File::open(&self.data_dir) {
                let _ = dir.sync_all();
            }
            Ok(())
        })();
        if written.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        let _ = lock.unlock();
        written.map_err(FinderError::from)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;
        let result = match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        };
        let _ = lock.unlock();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn set_get_remove_roundtrip() {
        let tmp = tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        assert_eq!(store.get("lastUnlockTime").unwrap(), None);
        store.set("lastUnlockTime", "1700000000000").unwrap();
        assert_eq!(
            store.get("lastUnlockTime").unwrap().as_deref(),
            Some("1700000000000")
        );
        store.set("lastUnlockTime", "1").unwrap();
        assert_eq!(store.get("lastUnlockTime").unwrap().as_deref(), Some("1"));
        store.remove("lastUnlockTime").unwrap();
        assert_eq!(store.get("lastUnlockTime").unwrap(), None);
        // Removing twice is fine
        store.remove("lastUnlockTime").unwrap();
    }

    #[test]
    fn survives_reopen() {
        let tmp = tempdir().unwrap();
        {
            let store = FileStore::open(tmp.path()).unwrap();
            store.set("amiiboFinderUserList", "[]").unwrap();
        }
        let store = FileStore::open(tmp.path()).unwrap();
        assert_eq!(
            store.get("amiiboFinderUserList").unwrap().as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn no_temp_files_left_behind() {
        let tmp = tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn rejects_path_like_keys() {
        let tmp = tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        assert!(store.set("../escape", "x").is_err());
        assert!(store.get("").is_err());
    }
}
