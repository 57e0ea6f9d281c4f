use std::collections::BTreeSet;

/// Bulk selection of record ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
  ids: BTreeSet<u64>,
}

impl Selection {
  /// Flip one id. Returns whether it is selected afterwards.
  pub fn toggle(&mut self, id: u64) -> bool {
    if self.ids.remove(&id) {
      false
    } else {
      self.ids.insert(id);
      true
    }
  }

  pub fn select(&mut self, id: u64) {
    self.ids.insert(id);
  }

  pub fn deselect(&mut self, id: u64) {
    self.ids.remove(&id);
  }

  pub fn contains(&self, id: u64) -> bool {
    self.ids.contains(&id)
  }

  /// True when `visible` is non-empty and every id in it is selected.
  pub fn all_selected(&self, visible: &[u64]) -> bool {
    !visible.is_empty() && visible.iter().all(|id| self.ids.contains(id))
  }

  /// The header checkbox: select all visible ids, or deselect them if all
  /// already were.
  pub fn toggle_all(&mut self, visible: &[u64]) {
    if self.all_selected(visible) {
      for id in visible {
        self.ids.remove(id);
      }
    } else {
      self.ids.extend(visible.iter().copied());
    }
  }

  /// Drop ids that are no longer present, e.g. after a refetch or delete.
  pub fn retain_present(&mut self, present: &[u64]) {
    let present: BTreeSet<u64> = present.iter().copied().collect();
    self.ids.retain(|id| present.contains(id));
  }

  pub fn clear(&mut self) {
    self.ids.clear();
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }

  /// Selected ids in ascending order.
  pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
    self.ids.iter().copied()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_toggle() {
    let mut selection = Selection::default();
    assert!(selection.toggle(3));
    assert!(selection.contains(3));
    assert!(!selection.toggle(3));
    assert!(selection.is_empty());
  }

  #[test]
  fn test_toggle_all_on_visible_page() {
    let mut selection = Selection::default();
    selection.select(99);
    let page = [1, 2, 3];

    selection.toggle_all(&page);
    assert!(selection.all_selected(&page));
    assert_eq!(selection.len(), 4);

    selection.toggle_all(&page);
    assert_eq!(selection.ids().collect::<Vec<_>>(), vec![99]);
    assert!(!selection.all_selected(&[]));
  }

  #[test]
  fn test_retain_present() {
    let mut selection = Selection::default();
    for id in [1, 2, 3] {
      selection.select(id);
    }
    selection.retain_present(&[1, 3, 4]);
    assert_eq!(selection.ids().collect::<Vec<_>>(), vec![1, 3]);
  }
}
