//! Durable key-value storage used for persisted state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::Result;

/// Key under which the persisted state snapshot is written.
pub const STORAGE_KEY: &str = "sprig:state";

pub trait Storage: Debug + 'static {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn store(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory storage. Clones share the same backing map, so a test can keep
/// a handle and read back what the app wrote.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage(Rc<RefCell<HashMap<String, String>>>);

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.borrow_mut().insert(key.into(), value.into());
        self
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.0.borrow().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        self.0.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One file per key inside `dir`.
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_clones_share_entries() {
        let a = MemoryStorage::new();
        let b = a.clone();
        a.store("k", "v").unwrap();
        assert_eq!(b.load("k").unwrap().as_deref(), Some("v"));
        assert_eq!(b.load("missing").unwrap(), None);
    }

    #[test]
    fn file_storage_round_trip() {
        let dir = std::env::temp_dir().join(format!("sprig-storage-{}", std::process::id()));
        let fs = FileStorage::new(&dir);
        assert_eq!(fs.load(STORAGE_KEY).unwrap(), None);

        fs.store(STORAGE_KEY, r#"{"counter":7}"#).unwrap();
        assert_eq!(
            fs.load(STORAGE_KEY).unwrap().as_deref(),
            Some(r#"{"counter":7}"#)
        );
        assert!(dir.join("sprig_state.json").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
