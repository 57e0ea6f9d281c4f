//! Derived views over already-fetched lists.
//!
//! Everything here is pure and synchronous. Views are recomputed from cache
//! contents on demand and never write back to the cache.

pub mod aggregate;
pub mod export;
pub mod filter;
pub mod paginate;
pub mod selection;
pub mod sort;

use serde_json::Value;

pub use aggregate::{percentile, sum_by, summarize, tally, Summary};
pub use export::{export, to_csv, to_json, ExportFormat};
pub use filter::Filter;
pub use paginate::{paginate, PageInfo};
pub use selection::Selection;
pub use sort::{sort_by_spec, Direction, SortSpec};

/// A single field value as seen by the view helpers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
  Text(&'a str),
  Number(f64),
  Bool(bool),
}

impl<'a> FieldValue<'a> {
  /// Scalars only. Null, arrays and objects have no field value.
  pub fn from_json(value: &'a Value) -> Option<Self> {
    match value {
      Value::String(s) => Some(FieldValue::Text(s.as_str())),
      Value::Number(n) => n.as_f64().map(FieldValue::Number),
      Value::Bool(b) => Some(FieldValue::Bool(*b)),
      _ => None,
    }
  }

  /// Numeric value. Decimal amounts often arrive as strings.
  pub fn as_number(&self) -> Option<f64> {
    match self {
      FieldValue::Number(n) => Some(*n),
      FieldValue::Text(s) => s.trim().parse().ok(),
      FieldValue::Bool(_) => None,
    }
  }

  pub fn as_text(&self) -> Option<&'a str> {
    match self {
      FieldValue::Text(s) => Some(*s),
      _ => None,
    }
  }

  /// Display form. Whole numbers print without a fraction.
  pub fn to_display(&self) -> String {
    match self {
      FieldValue::Text(s) => (*s).to_string(),
      FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
      FieldValue::Number(n) => n.to_string(),
      FieldValue::Bool(b) => b.to_string(),
    }
  }

  pub fn to_json(&self) -> Value {
    match self {
      FieldValue::Text(s) => Value::String((*s).to_string()),
      FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Value::from(*n as i64),
      FieldValue::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
      FieldValue::Bool(b) => Value::Bool(*b),
    }
  }
}

/// Named-field access for anything the view helpers operate on.
pub trait Fields {
  fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

impl<T: Fields + ?Sized> Fields for &T {
  fn field(&self, name: &str) -> Option<FieldValue<'_>> {
    (**self).field(name)
  }
}

impl Fields for Value {
  fn field(&self, name: &str) -> Option<FieldValue<'_>> {
    self.get(name).and_then(FieldValue::from_json)
  }
}

/// Component-local view state: search, filters, sort, page and selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
  pub filter: Filter,
  pub sort: Option<SortSpec>,
  pub page: usize,
  pub per_page: usize,
  pub selection: Selection,
}

/// Result of running a [`ViewState`] over a list.
#[derive(Debug)]
pub struct View<'a, T> {
  /// Every item passing the filter, in sorted order
  pub filtered: Vec<&'a T>,
  pub page: PageInfo,
}

impl<'a, T> View<'a, T> {
  /// Items on the current page.
  pub fn rows(&self) -> &[&'a T] {
    paginate(&self.filtered, self.page.page, self.page.per_page)
  }

  /// Ids of the rows on the current page. Rows without a whole,
  /// non-negative id are skipped.
  pub fn row_ids(&self) -> Vec<u64>
  where
    T: Fields,
  {
    self
      .rows()
      .iter()
      .filter_map(|row| row.field("id").and_then(|id| id.as_number()))
      .filter(|id| *id >= 0.0 && id.fract() == 0.0 && *id <= u64::MAX as f64)
      .map(|id| id as u64)
      .collect()
  }
}

impl ViewState {
  pub fn new(search_fields: &[&str], per_page: usize) -> Self {
    Self {
      filter: Filter::new(search_fields),
      sort: None,
      page: 1,
      per_page,
      selection: Selection::default(),
    }
  }

  pub fn set_search(&mut self, term: impl Into<String>) {
    self.filter.set_search(term);
    self.page = 1;
  }

  pub fn set_equals(&mut self, field: impl Into<String>, value: impl Into<String>) {
    self.filter.set_equals(field, value);
    self.page = 1;
  }

  /// Sort by `field`, flipping direction if it is already the sort field.
  pub fn toggle_sort(&mut self, field: &str) {
    self.sort = Some(match self.sort.take() {
      Some(spec) => spec.toggle(field),
      None => SortSpec::asc(field),
    });
  }

  pub fn set_page(&mut self, page: usize) {
    self.page = page.max(1);
  }

  /// Filter, sort and locate the current page. The page is clamped into range.
  pub fn apply<'a, T: Fields>(&self, items: &'a [T]) -> View<'a, T> {
    let mut filtered = self.filter.apply(items);
    if let Some(spec) = &self.sort {
      sort_by_spec(&mut filtered, spec);
    }
    let page = PageInfo::new(filtered.len(), self.per_page, self.page);
    View { filtered, page }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn rows() -> Vec<Value> {
    (1..=12)
      .map(|id| {
        json!({
          "id": id,
          "name": format!("Supplier {:02}", id),
          "status": if id % 3 == 0 { "inactive" } else { "active" },
        })
      })
      .collect()
  }

  #[test]
  fn test_field_value_display() {
    assert_eq!(FieldValue::Number(3.0).to_display(), "3");
    assert_eq!(FieldValue::Number(2.5).to_display(), "2.5");
    assert_eq!(FieldValue::Text("12.50").as_number(), Some(12.5));
    assert_eq!(FieldValue::Bool(true).as_number(), None);
  }

  #[test]
  fn test_view_pipeline() {
    let items = rows();
    let mut state = ViewState::new(&["name"], 5);
    state.set_equals("status", "active");
    state.toggle_sort("id");
    state.toggle_sort("id");
    state.set_page(2);

    let view = state.apply(&items);
    assert_eq!(view.filtered.len(), 8);
    assert_eq!(view.page.total_pages(), 2);
    assert_eq!(view.row_ids(), vec![4, 2, 1]);
  }

  #[test]
  fn test_search_resets_page_and_out_of_range_page_clamps() {
    let items = rows();
    let mut state = ViewState::new(&["name"], 5);
    state.set_page(3);
    state.set_search("supplier 1");
    assert_eq!(state.page, 1);

    state.set_page(99);
    let view = state.apply(&items);
    assert_eq!(view.filtered.len(), 3);
    assert_eq!(view.page.page, 1);
    assert_eq!(view.row_ids(), vec![10, 11, 12]);
  }

  #[test]
  fn test_row_ids_skip_invalid_ids() {
    let items = vec![
      json!({"id": 3}),
      json!({"id": -1}),
      json!({"id": 2.5}),
      json!({"id": "7"}),
      json!({"name": "no id"}),
    ];
    let state = ViewState::new(&["name"], 10);
    let view = state.apply(&items);
    assert_eq!(view.filtered.len(), 5);
    assert_eq!(view.row_ids(), vec![3, 7]);
  }
}
