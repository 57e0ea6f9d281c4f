use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::views::{FieldValue, Fields};

/// A domain record as returned by the API.
///
/// Only the id is interpreted; everything else is carried as opaque attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  pub id: u64,
  #[serde(flatten)]
  pub attributes: Map<String, Value>,
}

impl Record {
  pub fn new(id: u64) -> Self {
    Self {
      id,
      attributes: Map::new(),
    }
  }

  pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.attributes.insert(name.into(), value.into());
    self
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.attributes.get(name)
  }

  pub fn get_str(&self, name: &str) -> Option<&str> {
    self.get(name).and_then(Value::as_str)
  }
}

impl Fields for Record {
  fn field(&self, name: &str) -> Option<FieldValue<'_>> {
    if name == "id" {
      return Some(FieldValue::Number(self.id as f64));
    }
    self.attributes.get(name).and_then(FieldValue::from_json)
  }
}
