use std::sync::Arc;

use crate::errors::Error;

use super::{StoreKey, TokenStore};

/// Typed view over a [`TokenStore`] holding the current session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<dyn TokenStore>,
}

impl SessionStore {
    pub fn new(inner: Arc<dyn TokenStore>) -> Self {
        Self { inner }
    }

    pub fn access_token(&self) -> Result<Option<String>, Error> {
        Ok(self.inner.get(StoreKey::AccessToken)?.filter(|t| !t.is_empty()))
    }

    pub fn refresh_token(&self) -> Result<Option<String>, Error> {
        Ok(self.inner.get(StoreKey::RefreshToken)?.filter(|t| !t.is_empty()))
    }

    pub fn user_info(&self) -> Result<Option<String>, Error> {
        self.inner.get(StoreKey::UserInfo)
    }

    pub fn roles(&self) -> Result<Option<String>, Error> {
        self.inner.get(StoreKey::Roles)
    }

    /// Writes the access token (plus its legacy alias) and, when present, the refresh token.
    pub fn save_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> Result<(), Error> {
        let mut entries = vec![
            (StoreKey::AccessToken, access_token),
            (StoreKey::Token, access_token),
        ];
        if let Some(refresh_token) = refresh_token {
            entries.push((StoreKey::RefreshToken, refresh_token));
        }
        self.inner.set_many(&entries)
    }

    pub fn save_profile(&self, user_info: Option<&str>, roles: Option<&str>) -> Result<(), Error> {
        let entries: Vec<_> = [(StoreKey::UserInfo, user_info), (StoreKey::Roles, roles)]
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect();
        if entries.is_empty() {
            return Ok(());
        }
        self.inner.set_many(&entries)
    }

    /// Replaces the whole session in one write. Absent profile fields are cleared.
    pub fn replace_session(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        user_info: Option<&str>,
        roles: Option<&str>,
    ) -> Result<(), Error> {
        let mut entries = vec![
            (StoreKey::AccessToken, access_token),
            (StoreKey::Token, access_token),
        ];
        let mut stale = Vec::new();
        for (key, value) in [
            (StoreKey::RefreshToken, refresh_token),
            (StoreKey::UserInfo, user_info),
            (StoreKey::Roles, roles),
        ] {
            match value {
                Some(value) => entries.push((key, value)),
                None => stale.push(key),
            }
        }
        self.inner.update(&entries, &stale)
    }

    /// Removes every persisted session key in a single store operation.
    pub fn clear_session(&self) -> Result<(), Error> {
        self.inner.clear(&StoreKey::ALL)
    }

    pub fn raw(&self) -> Arc<dyn TokenStore> {
        Arc::clone(&self.inner)
    }
}
