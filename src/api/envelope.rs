//! Serde types for the `{ success, message, data }` wrapper every endpoint returns.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ApiError, Result};

fn default_success() -> bool {
  true
}

/// Response envelope shared by every endpoint.
///
/// `data` is optional on the wire: failed operations and `204 No Content`
/// responses carry none. Always unwrap through [`Envelope::into_data`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
  #[serde(default = "default_success")]
  pub success: bool,
  #[serde(default)]
  pub message: Option<String>,
  pub data: Option<T>,
}

impl<T> Envelope<T> {
  /// Envelope for a successful response without a body.
  pub fn empty() -> Self {
    Self {
      success: true,
      message: None,
      data: None,
    }
  }

  /// Unwrap the payload, treating `success: false` and missing data as a rejection.
  pub fn into_data(self) -> Result<T> {
    if !self.success {
      return Err(ApiError::Rejected {
        message: self
          .message
          .unwrap_or_else(|| crate::error::GENERIC_SERVER_MESSAGE.to_string()),
      });
    }
    self.data.ok_or_else(|| ApiError::Rejected {
      message: self
        .message
        .unwrap_or_else(|| "Response contained no data".to_string()),
    })
  }

  /// Check the success flag without requiring a payload (deletes, actions).
  pub fn into_ack(self) -> Result<Option<String>> {
    if self.success {
      Ok(self.message)
    } else {
      Err(ApiError::Rejected {
        message: self
          .message
          .unwrap_or_else(|| crate::error::GENERIC_SERVER_MESSAGE.to_string()),
      })
    }
  }
}

/// Paginated list payload.
///
/// Some list endpoints answer with a bare array instead of a page object;
/// those are normalized into a single page so callers see one shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
  pub data: Vec<T>,
  pub current_page: u64,
  pub last_page: u64,
  pub total: u64,
}

impl<T> Page<T> {
  pub fn single(data: Vec<T>) -> Self {
    let total = data.len() as u64;
    Self {
      data,
      current_page: 1,
      last_page: 1,
      total,
    }
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn has_next(&self) -> bool {
    self.current_page < self.last_page
  }
}

impl<T> Default for Page<T> {
  fn default() -> Self {
    Self::single(Vec::new())
  }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Page<T> {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr<T> {
      Paged {
        data: Vec<T>,
        current_page: Option<u64>,
        last_page: Option<u64>,
        total: Option<u64>,
      },
      Bare(Vec<T>),
    }

    Ok(match Repr::deserialize(deserializer)? {
      Repr::Paged {
        data,
        current_page,
        last_page,
        total,
      } => {
        let total = total.unwrap_or(data.len() as u64);
        Page {
          data,
          current_page: current_page.unwrap_or(1).max(1),
          last_page: last_page.unwrap_or(1).max(1),
          total,
        }
      }
      Repr::Bare(data) => Page::single(data),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_into_data_success() {
    let env: Envelope<u32> = serde_json::from_value(json!({"success": true, "data": 7})).unwrap();
    assert_eq!(env.into_data().unwrap(), 7);
  }

  #[test]
  fn test_into_data_rejected_keeps_message() {
    let env: Envelope<u32> =
      serde_json::from_value(json!({"success": false, "message": "Quota exceeded"})).unwrap();
    let err = env.into_data().unwrap_err();
    assert_eq!(
      err,
      ApiError::Rejected {
        message: "Quota exceeded".to_string()
      }
    );
  }

  #[test]
  fn test_missing_data_is_rejected() {
    let env: Envelope<u32> = serde_json::from_value(json!({"success": true})).unwrap();
    assert!(matches!(env.into_data(), Err(ApiError::Rejected { .. })));
  }

  #[test]
  fn test_page_from_paginated_object() {
    let page: Page<u32> = serde_json::from_value(json!({
      "data": [1, 2, 3],
      "current_page": 2,
      "last_page": 5,
      "total": 13
    }))
    .unwrap();
    assert_eq!(page.data, vec![1, 2, 3]);
    assert_eq!(page.current_page, 2);
    assert_eq!(page.total, 13);
    assert!(page.has_next());
  }

  #[test]
  fn test_page_from_bare_array() {
    let page: Page<u32> = serde_json::from_value(json!([4, 5])).unwrap();
    assert_eq!(page, Page::single(vec![4, 5]));
    assert!(!page.has_next());
  }
}
