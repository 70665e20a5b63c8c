// src/dtos/pagination.rs
use serde::Serialize;

use crate::error::AppError;

pub const PAGE_SIZE: i64 = 10;

/// Paginated list envelope.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Where a page sits in the full result set, computed before fetching rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
}

impl PageWindow {
    /// Validates the requested page against the total row count.
    /// An empty result set still has one (empty) page; `last` names the final one.
    pub fn new(requested: Option<&str>, count: i64) -> Result<Self, AppError> {
        let num_pages = ((count + PAGE_SIZE - 1) / PAGE_SIZE).max(1);
        let number = match requested.map(str::trim) {
            None | Some("") => 1,
            Some("last") => num_pages,
            Some(raw) => raw.parse::<i64>().map_err(|_| invalid_page())?,
        };

        if number < 1 || number > num_pages {
            return Err(invalid_page());
        }
        Ok(Self { number, num_pages })
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * PAGE_SIZE
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn into_page<T>(self, count: i64, results: Vec<T>, path: &str, query: Option<&str>) -> Page<T> {
        Page {
            count,
            next: self.has_next().then(|| page_link(path, query, Some(self.number + 1))),
            previous: self.has_previous().then(|| {
                let target = self.number - 1;
                page_link(path, query, (target > 1).then_some(target))
            }),
            results,
        }
    }
}

fn invalid_page() -> AppError {
    AppError::not_found("Invalid page.")
}

/// Rebuilds `path?query` with the `page` parameter replaced (or dropped when
/// `page` is `None`). Other parameters are kept as sent, in order.
pub fn page_link(path: &str, query: Option<&str>, page: Option<i64>) -> String {
    let mut params: Vec<String> = query
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some("page"))
        .map(str::to_string)
        .collect();

    if let Some(n) = page {
        params.push(format!("page={n}"));
    }

    if params.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", params.join("&"))
    }
}
