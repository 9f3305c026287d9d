//! HTTPS backend: PostgREST-style table endpoints plus the token auth API.
//!
//! Table requests go to `{url}/rest/v1/{table}` with equality filters encoded
//! as `field=eq.value`; auth goes to `{url}/auth/v1/*`. Every request carries
//! the project `apikey` and a bearer token (the session token once signed in,
//! the anon key before that).
//!
//! The signed-in session is mirrored to a JSON file when the settings name
//! one, so a later process can resume it through `current_session`.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use anyhow::Context;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AuthError, RemoteRequestError, RemoteResult};
use crate::models::AuthSession;
use crate::settings::BackendSettings;

use super::query::validate_field;
use super::{AuthBackend, ConflictTarget, Filter, Order, Returning, TableBackend};

pub struct RestBackend {
    base_url: String,
    anon_key: String,
    http: Client,
    session: RwLock<Option<AuthSession>>,
    session_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    user: Option<AuthUser>,
    // `/signup` with email confirmation enabled answers with the bare user.
    id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "msg", alias = "error_description")]
    message: Option<String>,
}

impl RestBackend {
    pub fn new(settings: &BackendSettings) -> RemoteResult<Self> {
        let base_url = settings.url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(RemoteRequestError::backend("backend url is not configured"));
        }

        let session_file = settings.session_path.clone();
        let session = session_file.as_deref().and_then(load_session);
        if let Some(session) = &session {
            debug!("Loaded saved session for {}", session.user_id);
        }

        Ok(Self {
            base_url,
            anon_key: settings.anon_key.clone(),
            http: Client::new(),
            session: RwLock::new(session),
            session_file,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> RemoteResult<String> {
        validate_field(table)?;
        Ok(format!("{}/rest/v1/{}", self.base_url, table))
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn stored_session(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_session(&self, session: Option<AuthSession>) {
        let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = &self.session_file {
            if let Err(err) = save_session(path, session.as_ref()) {
                warn!("Session kept in memory only: {err:#}");
            }
        }
        *guard = session;
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .stored_session()
            .map(|session| session.access_token)
            .unwrap_or_else(|| self.anon_key.clone());
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self.authorize(request).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(error_from_response(response).await)
    }

    async fn token_request(&self, url: String, body: Value) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(RemoteRequestError::from)?;

        match response.status() {
            status if status.is_success() => Ok(response
                .json::<TokenResponse>()
                .await
                .map_err(RemoteRequestError::from)?),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                let err = error_from_response(response).await;
                debug!("auth endpoint rejected credentials: {}", err.message);
                if err.message.contains("already registered") {
                    Err(AuthError::AlreadyRegistered)
                } else {
                    Err(AuthError::InvalidCredentials)
                }
            }
            StatusCode::UNPROCESSABLE_ENTITY => {
                let err = error_from_response(response).await;
                Err(AuthError::InvalidInput(err.message))
            }
            _ => Err(AuthError::Remote(error_from_response(response).await)),
        }
    }

    fn accept_token(&self, token: TokenResponse) -> Result<AuthSession, AuthError> {
        let access_token = match token.access_token {
            Some(access_token) => access_token,
            None if token.user.is_some() || token.id.is_some() => {
                return Err(AuthError::ConfirmationPending)
            }
            None => {
                return Err(RemoteRequestError::decode("auth response carried no token").into())
            }
        };
        let user = token
            .user
            .ok_or_else(|| RemoteRequestError::decode("auth response carried no user"))?;

        let session = AuthSession {
            user_id: user.id,
            access_token,
            email: user.email,
        };
        self.store_session(Some(session.clone()));
        Ok(session)
    }
}

/// A missing or unreadable file means no saved session.
fn load_session(path: &Path) -> Option<AuthSession> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!("Failed to read session from {}: {err}", path.display());
            return None;
        }
    };
    serde_json::from_str(&contents)
        .map_err(|err| warn!("Ignoring unreadable session at {}: {err}", path.display()))
        .ok()
}

fn save_session(path: &Path, session: Option<&AuthSession>) -> anyhow::Result<()> {
    let Some(session) = session else {
        return match fs::remove_file(path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err)
                .with_context(|| format!("Failed to remove session file {}", path.display())),
            _ => Ok(()),
        };
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create session directory {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(session)?;
    fs::write(path, serialized)
        .with_context(|| format!("Failed to write session to {}", path.display()))
}

async fn error_from_response(response: Response) -> RemoteRequestError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("request failed with status {status}: {body}"));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RemoteRequestError::unauthorized(message)
        }
        _ => RemoteRequestError::backend(message),
    }
}

/// `field=eq.value` pairs; nulls use `is.null` since `eq.null` never matches.
fn filter_params(filter: &Filter) -> RemoteResult<Vec<(String, String)>> {
    filter.validate()?;
    Ok(filter
        .predicates()
        .iter()
        .map(|(field, value)| {
            let operand = match value {
                Value::Null => "is.null".to_string(),
                Value::String(text) => format!("eq.{text}"),
                other => format!("eq.{other}"),
            };
            (field.clone(), operand)
        })
        .collect())
}

fn order_param(order: &Order) -> RemoteResult<(String, String)> {
    validate_field(&order.field)?;
    let direction = if order.ascending { "asc" } else { "desc" };
    Ok(("order".to_string(), format!("{}.{direction}", order.field)))
}

fn prefer_return(returning: Returning) -> &'static str {
    match returning {
        Returning::Representation => "return=representation",
        Returning::Minimal => "return=minimal",
    }
}

#[async_trait]
impl TableBackend for RestBackend {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> RemoteResult<Vec<Value>> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(filter)?);
        if let Some(order) = order {
            params.push(order_param(order)?);
        }

        let request = self.http.get(self.table_url(table)?).query(&params);
        let response = self.send(request).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn insert(
        &self,
        table: &str,
        row: Value,
        returning: Returning,
    ) -> RemoteResult<Option<Value>> {
        let request = self
            .http
            .post(self.table_url(table)?)
            .header("Prefer", prefer_return(returning))
            .json(&row);
        let response = self.send(request).await?;

        match returning {
            Returning::Minimal => Ok(None),
            Returning::Representation => {
                let mut rows = response.json::<Vec<Value>>().await?;
                if rows.is_empty() {
                    return Err(RemoteRequestError::decode(format!(
                        "insert into {table} returned no rows"
                    )));
                }
                Ok(Some(rows.swap_remove(0)))
            }
        }
    }

    async fn update(&self, table: &str, key: &Filter, patch: Value) -> RemoteResult<()> {
        let request = self
            .http
            .patch(self.table_url(table)?)
            .query(&filter_params(key)?)
            .header("Prefer", prefer_return(Returning::Minimal))
            .json(&patch);
        self.send(request).await.map(|_| ())
    }

    async fn delete(&self, table: &str, key: &Filter) -> RemoteResult<()> {
        let request = self
            .http
            .delete(self.table_url(table)?)
            .query(&filter_params(key)?);
        self.send(request).await.map(|_| ())
    }

    async fn upsert(&self, table: &str, row: Value, conflict: &ConflictTarget) -> RemoteResult<()> {
        conflict.validate()?;
        let request = self
            .http
            .post(self.table_url(table)?)
            .query(&[("on_conflict", conflict.columns().join(","))])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row);
        self.send(request).await.map(|_| ())
    }
}

#[async_trait]
impl AuthBackend for RestBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let token = self
            .token_request(
                self.auth_url("token?grant_type=password"),
                json!({ "email": email, "password": password }),
            )
            .await?;
        self.accept_token(token)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let token = self
            .token_request(
                self.auth_url("signup"),
                json!({ "email": email, "password": password }),
            )
            .await?;
        self.accept_token(token)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.stored_session() else {
            return Ok(());
        };
        // The local token is dropped whatever the endpoint answers.
        self.store_session(None);

        let response = self
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(RemoteRequestError::from)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AuthError::Remote(error_from_response(response).await))
        }
    }

    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        let Some(session) = self.stored_session() else {
            return Ok(None);
        };

        let request = self.http.get(self.auth_url("user"));
        match self.send(request).await {
            Ok(response) => {
                let user = response
                    .json::<AuthUser>()
                    .await
                    .map_err(RemoteRequestError::from)?;
                if user.id != session.user_id {
                    warn!("auth endpoint returned a different user than the stored session");
                }
                Ok(Some(AuthSession {
                    user_id: user.id,
                    ..session
                }))
            }
            Err(err) if err.is_unauthorized() => {
                self.store_session(None);
                Err(AuthError::SessionExpired)
            }
            Err(err) => Err(err.into()),
        }
    }
}
