use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::errors::Error;

use super::{StoreKey, TokenStore, poisoned};

/// Token store persisted as a JSON object on disk.
///
/// The whole map lives behind one lock and every mutation rewrites the file
/// through a temporary sibling followed by a rename.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileTokenStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(Error::Io(err)),
        };
        debug!(path = %path.display(), keys = entries.len(), "token store opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocking; called with the store mutex held.
    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>, Error> {
        let entries = self.entries.lock().map_err(poisoned)?;
        Ok(entries.get(key.as_str()).cloned())
    }

    fn update(&self, set: &[(StoreKey, &str)], remove: &[StoreKey]) -> Result<(), Error> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        let mut next = entries.clone();
        for key in remove {
            next.remove(key.as_str());
        }
        for (key, value) in set {
            next.insert(key.as_str().to_string(), (*value).to_string());
        }
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}
