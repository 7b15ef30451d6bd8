use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::client::AuthenticatedClient;
use crate::errors::Error;
use crate::request_context::RequestContext;

use super::Envelope;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginPayload {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user_info: Option<Value>,
    #[serde(default)]
    roles: Option<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoginResult {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_info: Option<Value>,
    pub roles: Vec<String>,
}

/// Login, registration and logout. These are the only flows besides the
/// refresh coordinator that write the session.
#[derive(Clone)]
pub struct AuthApi {
    client: AuthenticatedClient,
}

impl AuthApi {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResult, Error> {
        let request = RequestContext::post(LOGIN_PATH).json(credentials)?;
        let response = self.client.public().execute(request).await?;
        let Envelope { result } = response.json::<Envelope<LoginPayload>>()?;

        let access_token = result
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::LoginMalformed("missing `result.accessToken`".into()))?;
        let refresh_token = result.refresh_token.filter(|t| !t.is_empty());
        let user_info = result.user_info.filter(|v| !v.is_null());
        let roles = result.roles.as_ref().map(parse_roles).unwrap_or_default();

        let user_info_raw = user_info.as_ref().map(serde_json::to_string).transpose()?;
        let roles_raw = result.roles.as_ref().map(serde_json::to_string).transpose()?;
        self.client.coordinator().begin_session(
            &access_token,
            refresh_token.as_deref(),
            user_info_raw.as_deref(),
            roles_raw.as_deref(),
        )?;
        info!(
            email = %credentials.email,
            roles = roles.len(),
            has_refresh_token = refresh_token.is_some(),
            "login ok"
        );

        Ok(LoginResult {
            access_token,
            refresh_token,
            user_info,
            roles,
        })
    }

    pub async fn register<B, T>(&self, payload: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let envelope: Envelope<T> = self.client.public().post_json(REGISTER_PATH, payload).await?;
        Ok(envelope.result)
    }

    /// Local logout: clears every stored key. A refresh still in flight will not restore them.
    pub fn logout(&self) -> Result<(), Error> {
        self.client.coordinator().end_session()?;
        info!("logout ok");
        Ok(())
    }

    pub fn current_user(&self) -> Result<Option<Value>, Error> {
        match self.client.session().user_info()? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn roles(&self) -> Result<Vec<String>, Error> {
        match self.client.session().roles()? {
            Some(raw) => Ok(parse_roles(&serde_json::from_str(&raw)?)),
            None => Ok(Vec::new()),
        }
    }
}

/// Roles arrive either as a list or as a single string.
fn parse_roles(value: &Value) -> Vec<String> {
    match value {
        Value::String(role) => vec![role.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
