use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::Error;

use super::{StoreKey, TokenStore, poisoned};

/// In-process token store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: RwLock<HashMap<StoreKey, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (StoreKey, &'a str)>) -> Self {
        let map = entries
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        Self {
            entries: RwLock::new(map),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>, Error> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(&key).cloned())
    }

    fn update(&self, set: &[(StoreKey, &str)], remove: &[StoreKey]) -> Result<(), Error> {
        let mut map = self.entries.write().map_err(poisoned)?;
        for key in remove {
            map.remove(key);
        }
        for (key, value) in set {
            map.insert(*key, (*value).to_string());
        }
        Ok(())
    }
}
