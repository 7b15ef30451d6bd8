mod file;
mod memory;
mod session;

use std::fmt;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;
pub use session::SessionStore;

use crate::errors::Error;

/// Keys persisted by the token store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKey {
    AccessToken,
    RefreshToken,
    /// Legacy alias of the access token, kept for older readers.
    Token,
    UserInfo,
    Roles,
}

impl StoreKey {
    pub const ALL: [StoreKey; 5] = [
        StoreKey::AccessToken,
        StoreKey::RefreshToken,
        StoreKey::Token,
        StoreKey::UserInfo,
        StoreKey::Roles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::AccessToken => "accessToken",
            StoreKey::RefreshToken => "refreshToken",
            StoreKey::Token => "token",
            StoreKey::UserInfo => "userInfo",
            StoreKey::Roles => "roles",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide key/value storage for session credentials.
///
/// Values are opaque strings. `update` applies its writes and removals as one
/// step: a concurrent reader sees either none or all of them.
///
/// Session writes from the refresh coordinator run while it holds its state
/// lock, so that login and logout are ordered against a finishing refresh.
/// Implementations must return promptly and must never await the runtime;
/// a slow write stalls every caller that hits a 401 meanwhile.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: StoreKey) -> Result<Option<String>, Error>;

    fn update(&self, set: &[(StoreKey, &str)], remove: &[StoreKey]) -> Result<(), Error>;

    fn set(&self, key: StoreKey, value: &str) -> Result<(), Error> {
        self.update(&[(key, value)], &[])
    }

    fn set_many(&self, entries: &[(StoreKey, &str)]) -> Result<(), Error> {
        self.update(entries, &[])
    }

    fn clear(&self, keys: &[StoreKey]) -> Result<(), Error> {
        self.update(&[], keys)
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::Store("token store lock poisoned".to_string())
}
