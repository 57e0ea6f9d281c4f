//! Canonical cache keys.
//!
//! A [`QueryKey`] is an ordered list of segments: resource name first, then
//! positional discriminators (sub-resource names, ids), then at most one
//! parameter object. Parameter objects are stored as sorted maps so field
//! order never produces a different key, and null or empty parameters are
//! dropped so "no params" and "absent params" share one entry.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ApiError, Result};

/// A hashable, totally ordered parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamValue {
  /// Only appears inside lists; null fields are dropped
  Null,
  Bool(bool),
  Int(i64),
  /// Non-integer numbers, kept in their JSON spelling
  Number(String),
  Text(String),
  List(Vec<ParamValue>),
  Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
  /// Convert a field value from JSON, returning `None` for null.
  fn from_json(value: Value) -> Option<Self> {
    match value {
      Value::Null => None,
      other => Some(ParamValue::from_json_item(other)),
    }
  }

  /// Like [`from_json`](Self::from_json) but keeps null as a value, so list
  /// positions are preserved.
  fn from_json_item(value: Value) -> Self {
    match value {
      Value::Null => ParamValue::Null,
      Value::Bool(b) => ParamValue::Bool(b),
      Value::Number(n) => match n.as_i64() {
        Some(i) => ParamValue::Int(i),
        None => ParamValue::Number(n.to_string()),
      },
      Value::String(s) => ParamValue::Text(s),
      Value::Array(items) => {
        ParamValue::List(items.into_iter().map(ParamValue::from_json_item).collect())
      }
      Value::Object(map) => ParamValue::Map(
        map
          .into_iter()
          .filter_map(|(k, v)| ParamValue::from_json(v).map(|v| (k, v)))
          .collect(),
      ),
    }
  }

  fn to_json(&self) -> Value {
    match self {
      ParamValue::Null => Value::Null,
      ParamValue::Bool(b) => Value::Bool(*b),
      ParamValue::Int(i) => Value::from(*i),
      ParamValue::Number(n) => n
        .parse::<serde_json::Number>()
        .map(Value::Number)
        .unwrap_or_else(|_| Value::String(n.clone())),
      ParamValue::Text(s) => Value::String(s.clone()),
      ParamValue::List(items) => Value::Array(items.iter().map(ParamValue::to_json).collect()),
      ParamValue::Map(map) => Value::Object(
        map
          .iter()
          .map(|(k, v)| (k.clone(), v.to_json()))
          .collect(),
      ),
    }
  }

  /// Scalar rendering for query strings.
  fn to_query_value(&self) -> String {
    match self {
      ParamValue::Null => String::new(),
      ParamValue::Bool(b) => b.to_string(),
      ParamValue::Int(i) => i.to_string(),
      ParamValue::Number(n) | ParamValue::Text(n) => n.clone(),
      other => other.to_json().to_string(),
    }
  }
}

impl From<bool> for ParamValue {
  fn from(value: bool) -> Self {
    ParamValue::Bool(value)
  }
}

impl From<i64> for ParamValue {
  fn from(value: i64) -> Self {
    ParamValue::Int(value)
  }
}

impl From<u64> for ParamValue {
  fn from(value: u64) -> Self {
    match i64::try_from(value) {
      Ok(i) => ParamValue::Int(i),
      Err(_) => ParamValue::Number(value.to_string()),
    }
  }
}

impl From<u32> for ParamValue {
  fn from(value: u32) -> Self {
    ParamValue::Int(i64::from(value))
  }
}

impl From<&str> for ParamValue {
  fn from(value: &str) -> Self {
    ParamValue::Text(value.to_string())
  }
}

impl From<String> for ParamValue {
  fn from(value: String) -> Self {
    ParamValue::Text(value)
  }
}

/// Request parameters in canonical (key-sorted) form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
  pub fn new() -> Self {
    Self::default()
  }

  /// Canonicalize any serializable parameter struct or map.
  ///
  /// `None` fields are dropped. Anything other than an object or null is
  /// rejected, since it cannot be expressed as named parameters.
  pub fn from_serialize<P: Serialize + ?Sized>(params: &P) -> Result<Self> {
    match serde_json::to_value(params)? {
      Value::Null => Ok(Self::default()),
      Value::Object(map) => Ok(Self(
        map
          .into_iter()
          .filter_map(|(k, v)| ParamValue::from_json(v).map(|v| (k, v)))
          .collect(),
      )),
      other => Err(ApiError::decode(format!(
        "query parameters must be an object, got {}",
        other
      ))),
    }
  }

  /// Add or replace one parameter.
  pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
    self.0.insert(key.into(), value.into());
    self
  }

  /// Add a parameter only when a value is present.
  pub fn with_opt<V: Into<ParamValue>>(self, key: impl Into<String>, value: Option<V>) -> Self {
    match value {
      Some(v) => self.with(key, v),
      None => self,
    }
  }

  pub fn get(&self, key: &str) -> Option<&ParamValue> {
    self.0.get(key)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Flatten into `(name, value)` pairs for a URL query string.
  ///
  /// Lists repeat the name with a `[]` suffix; nested maps use `name[sub]`.
  pub fn to_query_pairs(&self) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (name, value) in &self.0 {
      push_pairs(&mut pairs, name.clone(), value);
    }
    pairs
  }

  pub fn to_json(&self) -> Value {
    ParamValue::Map(self.0.clone()).to_json()
  }
}

fn push_pairs(pairs: &mut Vec<(String, String)>, name: String, value: &ParamValue) {
  match value {
    ParamValue::List(items) => {
      for item in items {
        pairs.push((format!("{}[]", name), item.to_query_value()));
      }
    }
    ParamValue::Map(map) => {
      for (sub, v) in map {
        push_pairs(pairs, format!("{}[{}]", name, sub), v);
      }
    }
    scalar => pairs.push((name, scalar.to_query_value())),
  }
}

/// One element of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySegment {
  Name(String),
  Id(u64),
  Params(Params),
}

impl fmt::Display for KeySegment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      KeySegment::Name(name) => write!(f, "{:?}", name),
      KeySegment::Id(id) => write!(f, "{}", id),
      KeySegment::Params(params) => write!(f, "{}", params.to_json()),
    }
  }
}

/// Canonical identifier of one cached request, also usable as an
/// invalidation prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
  /// Start a key with its resource name.
  pub fn new(resource: impl Into<String>) -> Self {
    Self(vec![KeySegment::Name(resource.into())])
  }

  /// Append a sub-resource discriminator such as `"list"` or `"detail"`.
  pub fn segment(mut self, name: impl Into<String>) -> Self {
    self.0.push(KeySegment::Name(name.into()));
    self
  }

  /// Append an entity id.
  pub fn id(mut self, id: u64) -> Self {
    self.0.push(KeySegment::Id(id));
    self
  }

  /// Append the parameter object. `None` and empty parameters add nothing.
  pub fn params(mut self, params: impl Into<Option<Params>>) -> Self {
    if let Some(params) = params.into() {
      if !params.is_empty() {
        self.0.push(KeySegment::Params(params));
      }
    }
    self
  }

  /// True when every segment of `prefix` matches the start of this key.
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    self.0.starts_with(&prefix.0)
  }

  pub fn segments(&self) -> &[KeySegment] {
    &self.0
  }

  pub fn resource(&self) -> &str {
    match self.0.first() {
      Some(KeySegment::Name(name)) => name,
      _ => "",
    }
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[")?;
    for (i, segment) in self.0.iter().enumerate() {
      if i > 0 {
        write!(f, ",")?;
      }
      write!(f, "{}", segment)?;
    }
    write!(f, "]")
  }
}
