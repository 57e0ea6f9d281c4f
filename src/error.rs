//! Error type shared by the API client, the query cache and the hooks.

use std::collections::BTreeMap;

use thiserror::Error;

/// Fallback message when the server rejects a request without saying why.
pub const GENERIC_SERVER_MESSAGE: &str = "The server could not process the request";

/// Normalized error for every failure the client layer can surface.
///
/// Errors are `Clone` because a single deduplicated request may have many
/// waiting callers, and each of them receives the same error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
  /// Network unreachable, connection reset or request timed out.
  #[error("Connection error: {message}")]
  Transport { message: String },

  /// Non-2xx response. `message` is the server's text when it sent one.
  #[error("{message} (HTTP {status})")]
  Server {
    status: u16,
    message: String,
    /// Field-level validation messages, keyed by field name
    errors: BTreeMap<String, Vec<String>>,
  },

  /// 2xx response whose envelope reported `success: false` or carried no data.
  #[error("{message}")]
  Rejected { message: String },

  /// Response body did not match the expected shape.
  #[error("Unexpected response: {message}")]
  Decode { message: String },

  #[error("Invalid URL: {0}")]
  InvalidUrl(String),

  /// A request was superseded or its task was aborted before completing.
  #[error("Request was cancelled")]
  Cancelled,

  /// The local session store could not be read or written.
  #[error("Session storage error: {message}")]
  Storage { message: String },
}

impl ApiError {
  pub fn transport(message: impl Into<String>) -> Self {
    Self::Transport {
      message: message.into(),
    }
  }

  pub fn decode(message: impl Into<String>) -> Self {
    Self::Decode {
      message: message.into(),
    }
  }

  pub fn storage(message: impl Into<String>) -> Self {
    Self::Storage {
      message: message.into(),
    }
  }

  /// Human-readable message without the status suffix.
  pub fn message(&self) -> String {
    match self {
      Self::Transport { message }
      | Self::Server { message, .. }
      | Self::Rejected { message }
      | Self::Decode { message }
      | Self::Storage { message } => message.clone(),
      other => other.to_string(),
    }
  }

  /// HTTP status, if the server answered.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Server { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn is_not_found(&self) -> bool {
    self.status() == Some(404)
  }

  pub fn is_unauthorized(&self) -> bool {
    self.status() == Some(401)
  }

  pub fn is_transport(&self) -> bool {
    matches!(self, Self::Transport { .. })
  }

  /// Validation messages for one field, empty when there are none.
  pub fn field_errors(&self, field: &str) -> &[String] {
    match self {
      Self::Server { errors, .. } => errors.get(field).map(Vec::as_slice).unwrap_or(&[]),
      _ => &[],
    }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      return Self::decode(err.to_string());
    }
    if err.is_timeout() {
      return Self::transport("request timed out");
    }
    Self::transport(err.to_string())
  }
}

impl From<url::ParseError> for ApiError {
  fn from(err: url::ParseError) -> Self {
    Self::InvalidUrl(err.to_string())
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(err: serde_json::Error) -> Self {
    Self::decode(err.to_string())
  }
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;
