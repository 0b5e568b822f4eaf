// Session lifecycle
//
// `login` trades credentials for a session id which the client then sends
// as `X-chkp-sid` on every request. The other calls here are the small
// fixed-name commands that act on the session as a whole.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::client::ManagementClient;
use crate::command::ApiCommand;
use crate::error::Error;

/// What the server tells us about a fresh session.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInfo {
    #[serde(rename = "api-server-version")]
    pub api_server_version: Option<String>,
    #[serde(rename = "session-timeout")]
    pub session_timeout: Option<u64>,
    #[serde(rename = "read-only", default)]
    pub read_only: bool,
}

#[derive(Deserialize)]
struct LoginResponse {
    sid: Option<String>,
    #[serde(flatten)]
    info: LoginInfo,
}

impl ManagementClient {
    /// Authenticate and keep the returned session id for later calls.
    ///
    /// `domain` selects a domain on a multi-domain server.
    pub async fn login(
        &self,
        user: &str,
        password: &SecretString,
        domain: Option<&str>,
    ) -> Result<LoginInfo, Error> {
        let mut payload = json!({
            "user": user,
            "password": password.expose_secret(),
        });
        if let Some(domain) = domain {
            payload["domain"] = Value::String(domain.to_owned());
        }

        let body = match self.post(&ApiCommand::Login, &payload).await {
            Ok(body) => body,
            Err(Error::ClientError { body, .. }) => {
                return Err(Error::Authentication { message: body });
            }
            Err(e) => return Err(e),
        };

        let resp: LoginResponse =
            serde_json::from_value(body.clone()).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.to_string(),
            })?;

        let sid = resp.sid.ok_or_else(|| Error::Authentication {
            message: format!("login response carried no session id: {body}"),
        })?;

        self.set_session(SecretString::from(sid));
        self.set_api_version(resp.info.api_server_version.clone());
        debug!(version = ?resp.info.api_server_version, "login successful");
        Ok(resp.info)
    }

    /// End the session. The session id is dropped even if the server
    /// refuses, since it can't be reused either way.
    pub async fn logout(&self) -> Result<(), Error> {
        let result = self.post(&ApiCommand::Logout, &json!({})).await;
        self.clear_session();
        result.map(|_| ())
    }

    /// Reset the server-side idle timer. Returns `Error::SessionExpired`
    /// when the server no longer recognises the session.
    pub async fn keepalive(&self) -> Result<(), Error> {
        let body = self.post(&ApiCommand::Keepalive, &json!({})).await?;
        match body.get("message").and_then(Value::as_str) {
            Some("OK") | None => Ok(()),
            Some(_) => Err(Error::SessionExpired),
        }
    }

    /// Make this session's changes visible to other sessions.
    pub async fn publish(&self) -> Result<Value, Error> {
        self.post(&ApiCommand::Publish, &json!({})).await
    }

    /// Throw away this session's unpublished changes.
    pub async fn discard(&self) -> Result<Value, Error> {
        self.post(&ApiCommand::Discard, &json!({})).await
    }
}
