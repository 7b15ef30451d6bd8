use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Body of `POST /api/auth/refresh-token`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGrant {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshEnvelope {
    #[serde(default)]
    result: Option<RawGrant>,
}

/// Validated refresh response: an access token is always present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl RefreshGrant {
    pub fn from_body(body: &[u8]) -> Result<Self, Error> {
        let envelope: RefreshEnvelope = serde_json::from_slice(body)
            .map_err(|e| Error::RefreshMalformed(format!("invalid JSON: {e}")))?;
        let grant = envelope
            .result
            .ok_or_else(|| Error::RefreshMalformed("missing `result`".into()))?;
        let access_token = grant
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::RefreshMalformed("missing `result.accessToken`".into()))?;
        Ok(Self {
            access_token,
            refresh_token: grant.refresh_token.filter(|t| !t.is_empty()),
        })
    }
}
