//! Pagination model shared by every listing.
//!
//! Page numbers are 1-based at the boundary (`PageRequest`, `PageResponse`)
//! and turned into an offset/limit pair exactly once, in [`to_offset_limit`].
//! The query engines only ever see a [`Pageable`].

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Board, BoardListItem, Reply};
use crate::search::SearchType;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_SIZE: i64 = 10;

/// Number of page links rendered per navigation block.
pub const NAV_BLOCK: u64 = 10;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("invalid page request (page={page}, size={size})")]
    InvalidPage { page: i64, size: i64 },
}

/// Convert a 1-based page number and page size into `(offset, limit)`.
pub fn to_offset_limit(page: i64, size: i64) -> Result<(u64, u64), PageError> {
    if page < 1 || size <= 0 {
        return Err(PageError::InvalidPage { page, size });
    }
    let offset = (page as u64 - 1)
        .checked_mul(size as u64)
        .ok_or(PageError::InvalidPage { page, size })?;
    Ok((offset, size as u64))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

impl Sort {
    pub fn asc(field: &str) -> Self {
        Self { field: field.to_string(), descending: false }
    }

    pub fn desc(field: &str) -> Self {
        Self { field: field.to_string(), descending: true }
    }
}

/// Engine-side view of a page: 0-based offset, limit and ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pageable {
    pub offset: u64,
    pub limit: u64,
    pub sort: Sort,
}

impl Pageable {
    pub fn of(page: i64, size: i64, sort: Sort) -> Result<Self, PageError> {
        let (offset, limit) = to_offset_limit(page, size)?;
        Ok(Self { offset, limit, sort })
    }
}

/// One slice of a result set together with the number of rows matching the
/// filter across all pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

fn default_page() -> i64 { DEFAULT_PAGE }
fn default_size() -> i64 { DEFAULT_SIZE }
fn default_desc() -> bool { true }

/// Paging, search and sort state of one listing request.
///
/// Deserialized straight from the query string
/// (`?page=2&size=10&type=tcw&keyword=rust&sort=title&desc=false`).
#[derive(Debug, Clone, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
    /// Search type codes, one character each (`t`, `c`, `w`).
    #[serde(default, rename = "type")]
    pub types: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default = "default_desc")]
    pub desc: bool,
    #[serde(skip)]
    link: OnceCell<String>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            size: DEFAULT_SIZE,
            types: None,
            keyword: None,
            sort: None,
            desc: true,
            link: OnceCell::new(),
        }
    }
}

impl PageRequest {
    pub fn new(page: i64, size: i64) -> Self {
        Self { page, size, ..Self::default() }
    }

    pub fn with_search(mut self, types: &str, keyword: &str) -> Self {
        self.types = Some(types.to_string());
        self.keyword = Some(keyword.to_string());
        self.link = OnceCell::new();
        self
    }

    pub fn with_sort(mut self, field: &str, descending: bool) -> Self {
        self.sort = Some(field.to_string());
        self.desc = descending;
        self.link = OnceCell::new();
        self
    }

    /// Search types parsed from the `type` codes; unknown codes are skipped.
    pub fn search_types(&self) -> Vec<SearchType> {
        self.types
            .as_deref()
            .unwrap_or_default()
            .chars()
            .filter_map(SearchType::from_code)
            .collect()
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    /// Resolve the engine-side page. The requested sort wins over `default_sort`.
    pub fn pageable(&self, default_sort: Sort) -> Result<Pageable, PageError> {
        let sort = match &self.sort {
            Some(field) if !field.is_empty() => Sort { field: field.clone(), descending: self.desc },
            _ => default_sort,
        };
        Pageable::of(self.page, self.size, sort)
    }

    /// Query-string fragment that reproduces this request's page and search
    /// state. Computed once per instance.
    pub fn link(&self) -> &str {
        self.link.get_or_init(|| build_continuation_link(self))
    }
}

/// `page=<p>&size=<s>[&type=<codes>][&keyword=<percent-encoded>]`
pub fn build_continuation_link(req: &PageRequest) -> String {
    let mut link = format!("page={}&size={}", req.page, req.size);
    if let Some(types) = req.types.as_deref().filter(|t| !t.is_empty()) {
        link.push_str("&type=");
        link.push_str(&urlencoding::encode(types));
    }
    if let Some(keyword) = req.keyword.as_deref() {
        link.push_str("&keyword=");
        link.push_str(&urlencoding::encode(keyword));
    }
    link
}

/// Uniform envelope returned by every paged listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[aliases(
    BoardPage = PageResponse<Board>,
    BoardListPage = PageResponse<BoardListItem>,
    ReplyPage = PageResponse<Reply>
)]
pub struct PageResponse<T> {
    pub page: u64,
    pub size: u64,
    pub total: u64,
    pub total_pages: u64,
    /// First page number of the navigation block containing `page`.
    pub start: u64,
    /// Last page number of the block, clamped to `total_pages`.
    pub end: u64,
    /// A previous navigation block exists.
    pub prev: bool,
    /// A following navigation block exists.
    pub next: bool,
    pub has_previous: bool,
    pub has_next: bool,
    pub link: String,
    pub items: Vec<T>,
}

impl<T> PageResponse<T> {
    pub fn new(request: &PageRequest, page: Page<T>) -> Self {
        let size = request.size.max(1) as u64;
        let current = request.page.max(1) as u64;
        let total = page.total;
        let total_pages = total.div_ceil(size);

        let block_end = current.div_ceil(NAV_BLOCK) * NAV_BLOCK;
        let start = block_end + 1 - NAV_BLOCK;
        let end = block_end.min(total_pages);

        Self {
            page: current,
            size,
            total,
            total_pages,
            start,
            end,
            prev: start > 1,
            next: total > end * size,
            has_previous: current > 1,
            has_next: current < total_pages,
            link: request.link().to_string(),
            items: page.items,
        }
    }
}
