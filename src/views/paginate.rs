/// Slice out one page. Pages are 1-based; page 0 is treated as page 1.
///
/// A page past the end, or a zero page size, yields an empty slice.
pub fn paginate<T>(items: &[T], page: usize, size: usize) -> &[T] {
  if size == 0 {
    return &[];
  }
  let start = page.max(1).saturating_sub(1).saturating_mul(size);
  if start >= items.len() {
    return &[];
  }
  let end = start.saturating_add(size).min(items.len());
  &items[start..end]
}

/// Page navigation state for a list of `total` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
  /// Current page, always within `1..=total_pages()`
  pub page: usize,
  pub per_page: usize,
  pub total: usize,
}

impl PageInfo {
  /// Build page info, clamping `page` into range.
  pub fn new(total: usize, per_page: usize, page: usize) -> Self {
    let mut info = Self {
      page: 1,
      per_page,
      total,
    };
    info.page = info.clamp(page);
    info
  }

  /// At least one page, even for an empty list.
  pub fn total_pages(&self) -> usize {
    if self.per_page == 0 {
      return 1;
    }
    self.total.div_ceil(self.per_page).max(1)
  }

  pub fn clamp(&self, page: usize) -> usize {
    page.clamp(1, self.total_pages())
  }

  pub fn has_prev(&self) -> bool {
    self.page > 1
  }

  pub fn has_next(&self) -> bool {
    self.page < self.total_pages()
  }

  /// 1-based positions of the first and last item on the page, for
  /// "showing 11-20 of 42". `None` for an empty list.
  pub fn item_range(&self) -> Option<(usize, usize)> {
    if self.total == 0 || self.per_page == 0 {
      return None;
    }
    let first = (self.page - 1) * self.per_page + 1;
    let last = (self.page * self.per_page).min(self.total);
    Some((first, last))
  }
}
