//! Offset pagination
//!
//! List APIs return one page plus the total number of records. The pager keeps
//! requesting pages, advancing the offset by the number of records received,
//! until the total is reached or a page comes back empty.

use crate::error::Result;
use std::future::Future;

/// One page of a listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Offset/limit pager
#[derive(Debug, Clone, Copy)]
pub struct OffsetPager {
    pub limit: usize,
    /// Offset of the first record; some services count from 1
    pub start: usize,
}

impl Default for OffsetPager {
    fn default() -> Self {
        Self { limit: 100, start: 0 }
    }
}

impl OffsetPager {
    pub fn new(limit: usize, start: usize) -> Self {
        Self { limit, start }
    }

    /// Collect every record.
    ///
    /// `fetch` receives `(offset, limit)`.
    pub async fn collect<T, F, Fut>(&self, fetch: F) -> Result<Vec<T>>
    where
        F: FnMut(usize, usize) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let mut all = Vec::new();
        self.walk(fetch, |item| {
            all.push(item);
            false
        })
        .await?;
        Ok(all)
    }

    /// Return the first record matching `predicate`, stopping as soon as it is found.
    pub async fn find<T, F, Fut, P>(&self, fetch: F, mut predicate: P) -> Result<Option<T>>
    where
        F: FnMut(usize, usize) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
        P: FnMut(&T) -> bool,
    {
        let mut found = None;
        self.walk(fetch, |item| {
            if predicate(&item) {
                found = Some(item);
                true
            } else {
                false
            }
        })
        .await?;
        Ok(found)
    }

    /// Visit records page by page until `visit` returns true or the listing is exhausted.
    async fn walk<T, F, Fut, V>(&self, mut fetch: F, mut visit: V) -> Result<()>
    where
        F: FnMut(usize, usize) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
        V: FnMut(T) -> bool,
    {
        let mut offset = self.start;
        let mut seen = 0usize;

        loop {
            let page = fetch(offset, self.limit).await?;
            let count = page.items.len();
            tracing::trace!(offset, count, total = page.total, "fetched page");

            for item in page.items {
                if visit(item) {
                    return Ok(());
                }
            }

            seen += count;
            offset += count;
            if count == 0 || seen >= page.total {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pages(total: usize) -> impl FnMut(usize, usize) -> std::future::Ready<Result<Page<usize>>> {
        move |offset, limit| {
            let end = (offset + limit).min(total);
            let items = (offset..end).collect();
            std::future::ready(Ok(Page { items, total }))
        }
    }

    #[tokio::test]
    async fn test_collect_until_total() {
        let all = OffsetPager::new(10, 0).collect(pages(25)).await.unwrap();
        assert_eq!(all.len(), 25);
        assert_eq!(all[24], 24);
    }

    #[tokio::test]
    async fn test_collect_stops_on_empty_page() {
        let calls = AtomicUsize::new(0);
        let all: Vec<usize> = OffsetPager::new(10, 0)
            .collect(|_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                // Service claims more records than it returns
                std::future::ready(Ok(Page {
                    items: Vec::new(),
                    total: 5,
                }))
            })
            .await
            .unwrap();
        assert!(all.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_find_stops_early() {
        let calls = AtomicUsize::new(0);
        let mut inner = pages(100);
        let found = OffsetPager::new(10, 0)
            .find(
                |offset, limit| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    inner(offset, limit)
                },
                |item| *item == 15,
            )
            .await
            .unwrap();
        assert_eq!(found, Some(15));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_find_with_one_based_offset() {
        let found = OffsetPager::new(10, 1)
            .find(
                |offset, limit| {
                    // 1-based service: offset 1 is the first record
                    let total = 12;
                    let first = offset - 1;
                    let end = (first + limit).min(total);
                    std::future::ready(Ok(Page {
                        items: (first..end).collect::<Vec<usize>>(),
                        total,
                    }))
                },
                |item| *item == 11,
            )
            .await
            .unwrap();
        assert_eq!(found, Some(11));
    }
}
