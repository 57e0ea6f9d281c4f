use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::envelope::Envelope;
use super::session::Session;
use crate::error::{ApiError, Result, GENERIC_SERVER_MESSAGE};

/// Error body shape returned with non-2xx statuses.
///
/// Each field is read on its own so that an odd `errors` value (`[]` or
/// `null` from some backends) never costs the `message`.
#[derive(Debug, Default)]
struct ErrorBody {
  message: Option<String>,
  errors: BTreeMap<String, Vec<String>>,
}

impl ErrorBody {
  fn parse(bytes: &[u8]) -> Self {
    let Ok(Value::Object(mut body)) = serde_json::from_slice::<Value>(bytes) else {
      return Self::default();
    };
    let message = match body.remove("message") {
      Some(Value::String(m)) => Some(m),
      _ => None,
    };
    let errors = match body.remove("errors") {
      Some(Value::Object(fields)) => fields
        .into_iter()
        .filter_map(|(field, value)| {
          let messages = serde_json::from_value::<Messages>(value).ok()?.into_vec();
          Some((field, messages))
        })
        .collect(),
      _ => BTreeMap::new(),
    };
    Self { message, errors }
  }
}

/// Validation messages come either as one string or a list per field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Messages {
  One(String),
  Many(Vec<String>),
}

impl Messages {
  fn into_vec(self) -> Vec<String> {
    match self {
      Messages::One(m) => vec![m],
      Messages::Many(ms) => ms,
    }
  }
}

/// HTTP client for the business API.
///
/// Performs exactly one request per call. Every 2xx response is decoded into
/// an [`Envelope`]; everything else becomes an [`ApiError`]. No retries.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
  session: Session,
}

impl ApiClient {
  pub fn new(base_url: &str, timeout: Duration, session: Session) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| ApiError::transport(format!("Failed to build HTTP client: {}", e)))?;
    Self::with_client(http, base_url, session)
  }

  /// Wrap an existing `reqwest::Client`.
  pub fn with_client(http: reqwest::Client, base_url: &str, session: Session) -> Result<Self> {
    let mut base_url = Url::parse(base_url)?;
    // Url::join drops the last segment unless the base ends with a slash
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }
    Ok(Self {
      http,
      base_url,
      session,
    })
  }

  pub fn session(&self) -> &Session {
    &self.session
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn url(&self, path: &str) -> Result<Url> {
    Ok(self.base_url.join(path.trim_start_matches('/'))?)
  }

  /// Issue one request and normalize the response.
  pub async fn request<T, B>(
    &self,
    method: Method,
    path: &str,
    body: Option<&B>,
    query: &[(String, String)],
  ) -> Result<Envelope<T>>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let url = self.url(path)?;
    debug!("{} {} query={:?}", method, url, query);

    let mut request = self.http.request(method.clone(), url).query(query);
    if let Some(token) = self.session.token() {
      let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| ApiError::transport(format!("Invalid session token: {}", e)))?;
      value.set_sensitive(true);
      request = request.header(AUTHORIZATION, value);
    }
    if let Some(body) = body {
      request = request.json(body);
    }

    let response = request.send().await?;
    let status = response.status();
    debug!("{} {} -> {}", method, path, status);
    Self::handle_response(status, response).await
  }

  async fn handle_response<T: DeserializeOwned>(
    status: StatusCode,
    response: reqwest::Response,
  ) -> Result<Envelope<T>> {
    let bytes = response.bytes().await?;

    if status.is_success() {
      if status == StatusCode::NO_CONTENT || bytes.is_empty() {
        return Ok(Envelope::empty());
      }
      return serde_json::from_slice(&bytes).map_err(|e| {
        warn!("failed to decode response body: {}", e);
        ApiError::decode(e.to_string())
      });
    }

    let body = ErrorBody::parse(&bytes);
    let message = body
      .message
      .filter(|m| !m.trim().is_empty())
      .unwrap_or_else(|| match status.canonical_reason() {
        Some(reason) if !status.is_server_error() => reason.to_string(),
        _ => GENERIC_SERVER_MESSAGE.to_string(),
      });
    Err(ApiError::Server {
      status: status.as_u16(),
      message,
      errors: body.errors,
    })
  }

  pub async fn get<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(String, String)],
  ) -> Result<Envelope<T>> {
    self
      .request::<T, serde_json::Value>(Method::GET, path, None, query)
      .await
  }

  pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<Envelope<T>>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    self.request(Method::POST, path, Some(body), &[]).await
  }

  pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<Envelope<T>>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    self.request(Method::PUT, path, Some(body), &[]).await
  }

  pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>> {
    self
      .request::<T, serde_json::Value>(Method::DELETE, path, None, &[])
      .await
  }
}

impl std::fmt::Debug for ApiClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ApiClient")
      .field("base_url", &self.base_url.as_str())
      .field("session", &self.session)
      .finish_non_exhaustive()
  }
}
