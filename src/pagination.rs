//! Page-based listings and the lazy cursor over them.
//!
//! Mender list endpoints take `page` (1-indexed) and `per_page` query
//! parameters and may report the total item count in `X-Total-Count`.
//! [`paginate`] turns a one-page fetch function into a [`Stream`] of items.

use crate::{headers, Result};
use futures_util::stream::{self, Stream};
use http::HeaderMap;
use std::collections::VecDeque;
use std::future::Future;

/// Page size used by listing methods when the caller does not pick one.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Page size used by the streaming helpers of the resource clients.
pub const DEFAULT_STREAM_PER_PAGE: u32 = 100;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page, in server order.
    pub items: Vec<T>,
    /// Total number of items, from `X-Total-Count`.
    pub total_count: Option<u64>,
    /// 1-indexed page number.
    pub page: u32,
    /// Requested page size.
    pub per_page: u32,
    /// `true` when this page was full, so another one may follow.
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Builds a page from the items and response headers of one listing call.
    ///
    /// `has_more` is derived from the item count, not from the server.
    ///
    /// # Examples
    ///
    /// ```
    /// use mender_sdk::Page;
    /// use http::HeaderMap;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("x-total-count", "45".parse().unwrap());
    ///
    /// let page = Page::from_response(vec![1; 20], &headers, 1, 20);
    /// assert!(page.has_more);
    /// assert_eq!(page.total_pages(), Some(3));
    /// ```
    pub fn from_response(items: Vec<T>, headers: &HeaderMap, page: u32, per_page: u32) -> Self {
        let has_more = items.len() >= per_page as usize;
        Self {
            items,
            total_count: headers::total_count(headers),
            page,
            per_page,
            has_more,
        }
    }

    /// Number of pages implied by `total_count`.
    pub fn total_pages(&self) -> Option<u64> {
        let total = self.total_count?;
        if self.per_page == 0 {
            return None;
        }
        Some(total.div_ceil(u64::from(self.per_page)))
    }

    /// Returns `true` if the page holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maps the items, keeping the window.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            per_page: self.per_page,
            has_more: self.has_more,
        }
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

struct Cursor<T, F> {
    fetch: F,
    per_page: u32,
    next_page: u32,
    exhausted: bool,
    buffer: VecDeque<T>,
}

/// Streams every item of a paginated listing.
///
/// `fetch(page, per_page)` is called for page 1, 2, ... on demand. The cursor
/// stops after a page whose `has_more` is false or that holds fewer than
/// `per_page` items, whichever comes first; a short page ends the listing even
/// when the server claims otherwise. A failed fetch is yielded as an error and
/// ends the stream. Items are not deduplicated across pages.
///
/// Calling `paginate` again starts over from page 1. A `per_page` of 0 is
/// treated as 1.
///
/// # Examples
///
/// ```
/// use futures_util::TryStreamExt;
/// use mender_sdk::{pagination::paginate, Page};
///
/// # async fn example() -> Result<(), mender_sdk::Error> {
/// let items: Vec<u32> = paginate(2, |page, per_page| async move {
///     let items = match page {
///         1 => vec![1, 2],
///         _ => vec![3],
///     };
///     Ok::<_, mender_sdk::Error>(Page { items, total_count: None, page, per_page, has_more: true })
/// })
/// .try_collect()
/// .await?;
///
/// assert_eq!(items, vec![1, 2, 3]);
/// # Ok(())
/// # }
/// ```
pub fn paginate<T, F, Fut>(per_page: u32, fetch: F) -> impl Stream<Item = Result<T>>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let cursor = Cursor {
        fetch,
        per_page: per_page.max(1),
        next_page: 1,
        exhausted: false,
        buffer: VecDeque::new(),
    };

    stream::try_unfold(cursor, Cursor::advance)
}

impl<T, F, Fut> Cursor<T, F>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    /// Yields the next buffered item, fetching the next page when the buffer
    /// runs dry.
    async fn advance(mut self) -> Result<Option<(T, Self)>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some((item, self)));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page_number = self.next_page;
            let page = (self.fetch)(page_number, self.per_page).await?;
            let count = page.items.len();

            self.exhausted = !page.has_more || count < self.per_page as usize;
            self.next_page = page_number.saturating_add(1);
            self.buffer.extend(page.items);

            tracing::debug!(
                page = page_number,
                per_page = self.per_page,
                items = count,
                total_count = page.total_count,
                last = self.exhausted,
                "Fetched listing page"
            );
        }
    }
}
