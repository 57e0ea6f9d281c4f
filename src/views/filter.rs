use std::collections::BTreeMap;

use super::Fields;

/// Free-text search over a fixed set of fields, AND'ed with equality filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
  search_fields: Vec<String>,
  /// Lowercased, trimmed search term. Empty means no search.
  search: String,
  equals: BTreeMap<String, String>,
}

impl Filter {
  pub fn new(search_fields: &[&str]) -> Self {
    Self {
      search_fields: search_fields.iter().map(|f| f.to_string()).collect(),
      ..Self::default()
    }
  }

  pub fn search(mut self, term: impl Into<String>) -> Self {
    self.set_search(term);
    self
  }

  pub fn equals(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
    self.set_equals(field, value);
    self
  }

  pub fn set_search(&mut self, term: impl Into<String>) {
    self.search = term.into().trim().to_lowercase();
  }

  /// Require `field` to equal `value`. An empty value removes the constraint.
  pub fn set_equals(&mut self, field: impl Into<String>, value: impl Into<String>) {
    let field = field.into();
    let value = value.into();
    if value.is_empty() {
      self.equals.remove(&field);
    } else {
      self.equals.insert(field, value);
    }
  }

  pub fn search_term(&self) -> &str {
    &self.search
  }

  pub fn is_empty(&self) -> bool {
    self.search.is_empty() && self.equals.is_empty()
  }

  pub fn matches<T: Fields + ?Sized>(&self, item: &T) -> bool {
    self.matches_search(item) && self.matches_equals(item)
  }

  fn matches_search<T: Fields + ?Sized>(&self, item: &T) -> bool {
    if self.search.is_empty() {
      return true;
    }
    self.search_fields.iter().any(|name| {
      item
        .field(name)
        .is_some_and(|value| value.to_display().to_lowercase().contains(&self.search))
    })
  }

  /// Enumerated values compare without regard to ASCII case.
  fn matches_equals<T: Fields + ?Sized>(&self, item: &T) -> bool {
    self.equals.iter().all(|(name, wanted)| {
      item
        .field(name)
        .is_some_and(|value| value.to_display().eq_ignore_ascii_case(wanted))
    })
  }

  /// Matching items in their original order.
  pub fn apply<'a, T: Fields>(&self, items: &'a [T]) -> Vec<&'a T> {
    items.iter().filter(|item| self.matches(*item)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::views::{sort_by_spec, SortSpec};
  use serde_json::{json, Value};

  fn contacts() -> Vec<Value> {
    vec![
      json!({"id": 1, "name": "Amina Diallo", "email": "amina@example.com", "segment": "vip"}),
      json!({"id": 2, "name": "kofi mensah", "email": "kofi@example.com", "segment": "regular"}),
      json!({"id": 3, "name": "Zanele Dube", "email": "zd@mail.test", "segment": "VIP"}),
      json!({"id": 4, "name": "Brahim Ali", "email": null, "segment": "regular"}),
      json!({"id": 5, "name": "Ama Owusu", "phone": 233244000111u64, "segment": "vip"}),
    ]
  }

  fn ids(items: &[&Value]) -> Vec<u64> {
    items.iter().filter_map(|v| v["id"].as_u64()).collect()
  }

  #[test]
  fn test_search_is_case_insensitive_substring() {
    let items = contacts();
    let filter = Filter::new(&["name", "email"]).search("  AMI ");
    assert_eq!(ids(&filter.apply(&items)), vec![1]);

    let filter = Filter::new(&["name", "email"]).search("example");
    assert_eq!(ids(&filter.apply(&items)), vec![1, 2]);
  }

  #[test]
  fn test_search_matches_numeric_fields_by_display() {
    let items = contacts();
    let filter = Filter::new(&["phone"]).search("244000");
    assert_eq!(ids(&filter.apply(&items)), vec![5]);
  }

  #[test]
  fn test_equality_filters_and_with_search() {
    let items = contacts();
    let filter = Filter::new(&["name"]).equals("segment", "vip");
    assert_eq!(ids(&filter.apply(&items)), vec![1, 3, 5]);

    let filter = filter.search("am");
    assert_eq!(ids(&filter.apply(&items)), vec![1, 5]);

    let filter = filter.search("").equals("segment", "");
    assert!(filter.is_empty());
    assert_eq!(ids(&filter.apply(&items)), vec![1, 2, 3, 4, 5]);
  }

  #[test]
  fn test_empty_filter_keeps_everything() {
    let items = contacts();
    let filter = Filter::new(&["name"]).search("   ");
    assert!(filter.is_empty());
    assert_eq!(filter.apply(&items).len(), items.len());
  }

  #[test]
  fn test_filter_and_sort_commute() {
    let items = contacts();
    let filter = Filter::new(&["name"]).search("a").equals("segment", "vip");

    for spec in [SortSpec::asc("name"), SortSpec::desc("name"), SortSpec::desc("email")] {
      let mut filtered_then_sorted = filter.apply(&items);
      sort_by_spec(&mut filtered_then_sorted, &spec);

      let mut sorted: Vec<&Value> = items.iter().collect();
      sort_by_spec(&mut sorted, &spec);
      let sorted_then_filtered: Vec<&Value> =
        sorted.into_iter().filter(|item| filter.matches(*item)).collect();

      assert_eq!(filtered_then_sorted, sorted_then_filtered);
    }
  }
}
