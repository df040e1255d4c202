//! Page arithmetic for list views.

/// Rows per list page.
pub const PAGE_SIZE: i64 = 10;

/// One page of results plus the numbers needed to render pager links.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub total: i64,
    pub per_page: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, number: i64, total: i64, per_page: i64) -> Self {
        Self {
            items,
            number,
            num_pages: page_count(total, per_page),
            total,
            per_page,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn previous_page_number(&self) -> i64 {
        (self.number - 1).max(1)
    }

    pub fn next_page_number(&self) -> i64 {
        (self.number + 1).min(self.num_pages)
    }

    /// 1-based index of the first row on this page, 0 when empty.
    pub fn start_index(&self) -> i64 {
        if self.total == 0 {
            0
        } else {
            (self.number - 1) * self.per_page + 1
        }
    }

    pub fn end_index(&self) -> i64 {
        if self.items.is_empty() {
            0
        } else {
            self.start_index() + self.items.len() as i64 - 1
        }
    }
}

/// Number of pages for `total` rows. An empty result still has one page.
pub fn page_count(total: i64, per_page: i64) -> i64 {
    if total <= 0 {
        1
    } else {
        (total + per_page - 1) / per_page
    }
}

/// Resolve the requested page leniently: missing or garbage input gives the
/// first page, anything past the end gives the last page.
pub fn resolve_page(requested: Option<&str>, total: i64, per_page: i64) -> i64 {
    let last = page_count(total, per_page);
    match requested.map(str::trim).and_then(|raw| raw.parse::<i64>().ok()) {
        Some(n) if n < 1 => 1,
        Some(n) if n > last => last,
        Some(n) => n,
        None => 1,
    }
}

/// Row offset for a resolved page number.
pub fn page_offset(number: i64, per_page: i64) -> i64 {
    (number - 1).max(0) * per_page
}
