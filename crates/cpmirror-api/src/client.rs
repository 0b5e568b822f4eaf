// Management API HTTP client
//
// Every Management API call is a JSON POST to `{base}/web_api/{command}`.
// This module owns URL construction, the session header, and the mapping
// of HTTP status classes onto `Error` variants. Session lifecycle calls
// (login, logout, keepalive, publish, discard) live in `session.rs`.

use std::future::Future;
use std::sync::{PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::command::ApiCommand;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Header carrying the session id once logged in.
pub const SESSION_HEADER: &str = "X-chkp-sid";

/// The seam between the sync engine and the wire.
///
/// Issues one Management API command and returns the parsed JSON body.
/// `ManagementClient` is the production implementation; tests substitute
/// scripted fakes.
pub trait ApiCall: Send + Sync {
    fn call(
        &self,
        command: &ApiCommand,
        payload: &Value,
    ) -> impl Future<Output = Result<Value, Error>> + Send;
}

/// Authenticated handle to one management server.
///
/// Holds the session id after [`login`](Self::login); every core operation
/// takes a reference to one of these rather than reaching for a global.
pub struct ManagementClient {
    http: reqwest::Client,
    base_url: Url,
    sid: RwLock<Option<SecretString>>,
    api_version: RwLock<Option<String>>,
}

impl ManagementClient {
    /// Create a client from a server root URL such as `https://mgmt:4434`.
    pub fn from_url(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        let http = transport.build_client()?;
        Ok(Self::from_parts(http, base_url))
    }

    /// Wrap an existing `reqwest::Client` and a server root URL.
    ///
    /// The URL may or may not already end in `/web_api`.
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self::from_parts(http, base_url))
    }

    fn from_parts(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            sid: RwLock::new(None),
            api_version: RwLock::new(None),
        }
    }

    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        if path.ends_with("/web_api") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/web_api/"));
        }
        Ok(url)
    }

    /// The `.../web_api/` root every endpoint is joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether a session id is currently held.
    pub fn has_session(&self) -> bool {
        self.sid
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// API version reported by the server at login.
    pub fn api_version(&self) -> Option<String> {
        self.api_version
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Adopt a session id obtained elsewhere (e.g. a previous login).
    pub fn set_session(&self, sid: SecretString) {
        *self.sid.write().unwrap_or_else(PoisonError::into_inner) = Some(sid);
    }

    pub(crate) fn clear_session(&self) {
        *self.sid.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn set_api_version(&self, version: Option<String>) {
        *self.api_version.write().unwrap_or_else(PoisonError::into_inner) = version;
    }

    fn endpoint_url(&self, command: &ApiCommand) -> Result<Url, Error> {
        Ok(self.base_url.join(&command.endpoint())?)
    }

    // ── Request ──────────────────────────────────────────────────────

    /// POST `payload` to the command's endpoint and decode the reply.
    pub async fn post(&self, command: &ApiCommand, payload: &Value) -> Result<Value, Error> {
        let url = self.endpoint_url(command)?;
        info!(%command, "command issued");
        debug!("POST {url}");

        let mut builder = self.http.post(url).json(payload);
        let sid = self
            .sid
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.expose_secret().to_owned());
        if let Some(sid) = sid {
            builder = builder.header(SESSION_HEADER, sid);
        }

        let resp = builder.send().await?;
        self.handle_response(command, resp).await
    }

    async fn handle_response(
        &self,
        command: &ApiCommand,
        resp: reqwest::Response,
    ) -> Result<Value, Error> {
        let status = resp.status();
        let body = resp.text().await?;

        if status.is_success() {
            debug!(%command, "command succeeded");
            return serde_json::from_str(&body).map_err(|e| {
                let preview = body
                    .char_indices()
                    .nth(200)
                    .map_or(body.as_str(), |(end, _)| &body[..end]);
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body: body.clone(),
                }
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!(%command, "session rejected");
            self.clear_session();
            return Err(Error::SessionExpired);
        }

        if status.is_client_error() {
            warn!(%command, status = status.as_u16(), body = %body, "command failure");
            return Err(Error::ClientError {
                command: command.endpoint(),
                status: status.as_u16(),
                body,
            });
        }

        error!(%command, status = status.as_u16(), "server failure");
        Err(Error::ServerError {
            command: command.endpoint(),
            status: status.as_u16(),
            body,
        })
    }
}

impl ApiCall for ManagementClient {
    fn call(
        &self,
        command: &ApiCommand,
        payload: &Value,
    ) -> impl Future<Output = Result<Value, Error>> + Send {
        self.post(command, payload)
    }
}
