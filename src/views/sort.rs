use std::cmp::Ordering;

use super::{FieldValue, Fields};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
  #[default]
  Asc,
  Desc,
}

impl Direction {
  pub fn reversed(self) -> Self {
    match self {
      Direction::Asc => Direction::Desc,
      Direction::Desc => Direction::Asc,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
  pub field: String,
  pub direction: Direction,
}

impl SortSpec {
  pub fn asc(field: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      direction: Direction::Asc,
    }
  }

  pub fn desc(field: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      direction: Direction::Desc,
    }
  }

  /// Clicking the current sort column flips it; another column starts ascending.
  pub fn toggle(self, field: &str) -> Self {
    if self.field == field {
      Self {
        direction: self.direction.reversed(),
        ..self
      }
    } else {
      Self::asc(field)
    }
  }

  /// Order two items. Items missing the field go last in either direction.
  pub fn compare<T: Fields + ?Sized>(&self, a: &T, b: &T) -> Ordering {
    match (a.field(&self.field), b.field(&self.field)) {
      (Some(a), Some(b)) => {
        let ord = compare_values(&a, &b);
        match self.direction {
          Direction::Asc => ord,
          Direction::Desc => ord.reverse(),
        }
      }
      (Some(_), None) => Ordering::Less,
      (None, Some(_)) => Ordering::Greater,
      (None, None) => Ordering::Equal,
    }
  }
}

/// Stable sort; equal items keep their relative order.
pub fn sort_by_spec<T: Fields>(items: &mut [T], spec: &SortSpec) {
  items.sort_by(|a, b| spec.compare(a, b));
}

fn rank(value: &FieldValue<'_>) -> u8 {
  match value {
    FieldValue::Number(_) => 0,
    FieldValue::Bool(_) => 1,
    FieldValue::Text(_) => 2,
  }
}

fn compare_values(a: &FieldValue<'_>, b: &FieldValue<'_>) -> Ordering {
  match (a, b) {
    (FieldValue::Number(x), FieldValue::Number(y)) => x.total_cmp(y),
    (FieldValue::Bool(x), FieldValue::Bool(y)) => x.cmp(y),
    (FieldValue::Text(x), FieldValue::Text(y)) => compare_text(x, y),
    _ => rank(a).cmp(&rank(b)),
  }
}

/// Case-insensitive ordering, with exact byte order as the tie break.
fn compare_text(a: &str, b: &str) -> Ordering {
  let folded = a
    .chars()
    .flat_map(char::to_lowercase)
    .cmp(b.chars().flat_map(char::to_lowercase));
  folded.then_with(|| a.cmp(b))
}
