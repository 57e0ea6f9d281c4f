//! Single-pass aggregates over a (filtered) list.

use std::collections::BTreeMap;

use super::Fields;

/// Numeric summary of one field. Non-numeric and missing values are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Summary {
  pub count: usize,
  pub sum: f64,
  pub min: Option<f64>,
  pub max: Option<f64>,
}

impl Summary {
  pub fn add(&mut self, value: f64) {
    self.count += 1;
    self.sum += value;
    self.min = Some(self.min.map_or(value, |m| m.min(value)));
    self.max = Some(self.max.map_or(value, |m| m.max(value)));
  }

  pub fn mean(&self) -> Option<f64> {
    (self.count > 0).then(|| self.sum / self.count as f64)
  }
}

pub fn summarize<I>(items: I, field: &str) -> Summary
where
  I: IntoIterator,
  I::Item: Fields,
{
  let mut summary = Summary::default();
  for item in items {
    if let Some(value) = item.field(field).and_then(|v| v.as_number()) {
      summary.add(value);
    }
  }
  summary
}

/// Count items per distinct value of `field`.
pub fn tally<I>(items: I, field: &str) -> BTreeMap<String, usize>
where
  I: IntoIterator,
  I::Item: Fields,
{
  let mut counts = BTreeMap::new();
  for item in items {
    if let Some(value) = item.field(field) {
      *counts.entry(value.to_display()).or_insert(0) += 1;
    }
  }
  counts
}

/// Sum `value_field` per distinct value of `group_field`.
pub fn sum_by<I>(items: I, group_field: &str, value_field: &str) -> BTreeMap<String, f64>
where
  I: IntoIterator,
  I::Item: Fields,
{
  let mut sums = BTreeMap::new();
  for item in items {
    let Some(group) = item.field(group_field) else {
      continue;
    };
    let value = item
      .field(value_field)
      .and_then(|v| v.as_number())
      .unwrap_or(0.0);
    *sums.entry(group.to_display()).or_insert(0.0) += value;
  }
  sums
}

/// Nearest-rank percentile, `p` in `0..=100`. `None` for no values.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
  let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
  if sorted.is_empty() {
    return None;
  }
  sorted.sort_by(f64::total_cmp);
  let p = p.clamp(0.0, 100.0);
  let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
  let index = rank.clamp(1, sorted.len()) - 1;
  Some(sorted[index])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::views::Filter;
  use serde_json::{json, Value};

  fn invoices() -> Vec<Value> {
    vec![
      json!({"status": "paid", "total": "120.00"}),
      json!({"status": "unpaid", "total": 80}),
      json!({"status": "paid", "total": 30.5}),
      json!({"status": "overdue", "total": null}),
    ]
  }

  #[test]
  fn test_summary() {
    let summary = summarize(&invoices(), "total");
    assert_eq!(summary.count, 3);
    assert_eq!(summary.sum, 230.5);
    assert_eq!(summary.min, Some(30.5));
    assert_eq!(summary.max, Some(120.0));
    assert_eq!(Summary::default().mean(), None);
  }

  #[test]
  fn test_aggregates_follow_the_filtered_list() {
    let items = invoices();
    let paid = Filter::new(&[]).equals("status", "paid").apply(&items);
    assert_eq!(summarize(&paid, "total").sum, 150.5);
    assert_eq!(tally(&paid, "status").get("paid"), Some(&2));
  }

  #[test]
  fn test_tally_and_sum_by() {
    let items = invoices();
    let counts = tally(&items, "status");
    assert_eq!(counts.get("paid"), Some(&2));
    assert_eq!(counts.get("overdue"), Some(&1));

    let sums = sum_by(&items, "status", "total");
    assert_eq!(sums.get("paid"), Some(&150.5));
    assert_eq!(sums.get("overdue"), Some(&0.0));
  }

  #[test]
  fn test_percentile_nearest_rank() {
    let values = [15.0, 20.0, 35.0, 40.0, 50.0];
    assert_eq!(percentile(&values, 30.0), Some(20.0));
    assert_eq!(percentile(&values, 40.0), Some(20.0));
    assert_eq!(percentile(&values, 50.0), Some(35.0));
    assert_eq!(percentile(&values, 100.0), Some(50.0));
    assert_eq!(percentile(&values, 0.0), Some(15.0));
    assert_eq!(percentile(&[], 50.0), None);
  }
}
