pub mod detail;
pub mod signals;
pub mod total;

pub use detail::{fetch_details, DetailFuture, DETAIL_CONCURRENCY};
pub use signals::PageSignals;

use async_trait::async_trait;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::vcs::VcsError;

/// Page size substituted when the caller does not ask for one.
pub const DEFAULT_LIMIT: u32 = 30;

/// Offset/limit addressing as exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(offset: u64, limit: i64) -> Self {
        Self { offset, limit }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, i64::from(DEFAULT_LIMIT))
    }
}

/// A provider's native 1-indexed page address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativePage {
    pub page: u32,
    pub per_page: u32,
}

impl NativePage {
    /// Zero-based index of the first item on this page.
    pub fn start(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
}

/// Map `(offset, limit)` onto `(page, per_page)` for a provider capped at `max_per_page`.
///
/// Non-positive limits fall back to [`DEFAULT_LIMIT`] before clamping.
pub fn translate(offset: u64, limit: i64, max_per_page: u32) -> NativePage {
    let max = max_per_page.max(1);
    let requested = if limit <= 0 {
        i64::from(DEFAULT_LIMIT)
    } else {
        limit
    };
    let per_page = requested.clamp(1, i64::from(max)) as u32;
    let page = (offset / u64::from(per_page)).saturating_add(1);
    NativePage {
        page: u32::try_from(page).unwrap_or(u32::MAX),
        per_page,
    }
}

/// One native page of summary records plus the transport's pagination signals.
#[derive(Debug, Clone)]
pub struct Chunk<T> {
    pub items: Vec<T>,
    /// Number of records upstream returned before any local filtering.
    pub raw_len: usize,
    pub signals: PageSignals,
}

impl<T> Chunk<T> {
    pub fn new(items: Vec<T>, signals: PageSignals) -> Self {
        Self {
            raw_len: items.len(),
            items,
            signals,
        }
    }

    pub fn with_raw_len(mut self, raw_len: usize) -> Self {
        self.raw_len = raw_len;
        self
    }
}

/// A listing endpoint addressed by native page number.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send + 'static;

    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Chunk<Self::Item>, VcsError>;
}

/// Fetch exactly one native page, tagging any failure with its page number.
pub async fn fetch_one<P: PageSource>(
    source: &P,
    native: NativePage,
) -> Result<Chunk<P::Item>, VcsError> {
    let chunk = source
        .fetch_page(native.page, native.per_page)
        .await
        .map_err(|err| VcsError::page(native.page, err))?;
    debug!(
        page = native.page,
        per_page = native.per_page,
        items = chunk.items.len(),
        "fetched native page"
    );
    Ok(chunk)
}

/// Walk every page in order, enriching each page through the bounded detail fetcher.
///
/// Stops when the provider signals no further page or after `max_pages` pages.
/// Any failure discards everything accumulated so far.
pub async fn collect_all<P, T, F, Fut>(
    source: &P,
    per_page: u32,
    max_pages: u32,
    enrich: F,
) -> Result<Vec<T>, VcsError>
where
    P: PageSource,
    T: Send + 'static,
    F: Fn(P::Item) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<T, VcsError>> + Send + 'static,
{
    let started = Instant::now();
    let mut all = Vec::new();
    let mut page = 1u32;
    let mut fetched = 0u32;

    loop {
        let chunk = fetch_one(source, NativePage { page, per_page }).await?;
        fetched += 1;
        let next = chunk.signals.next_after(page);
        let exhausted = chunk.raw_len == 0;

        let details = fetch_details(chunk.items, DETAIL_CONCURRENCY, enrich.clone())
            .await
            .map_err(|err| VcsError::page(page, err))?;
        all.extend(details);

        match next {
            Some(next) if !exhausted && next > page => {
                if fetched >= max_pages {
                    warn!(max_pages, "exhaustive traversal hit the page cap, stopping early");
                    break;
                }
                page = next;
            }
            _ => break,
        }
    }

    info!(
        pages = fetched,
        items = all.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "exhaustive traversal complete"
    );
    Ok(all)
}


#[cfg(test)]
mod tests {
    use super::testing::SyntheticSource;
    use super::*;

    #[test]
    fn test_translate_first_page() {
        assert_eq!(translate(0, 20, 100), NativePage { page: 1, per_page: 20 });
    }

    #[test]
    fn test_translate_floor_division() {
        assert_eq!(translate(19, 20, 100).page, 1);
        assert_eq!(translate(20, 20, 100).page, 2);
        assert_eq!(translate(45, 20, 100).page, 3);
    }

    #[test]
    fn test_translate_clamps_to_provider_max() {
        let native = translate(250, 500, 100);
        assert_eq!(native.per_page, 100);
        assert_eq!(native.page, 3);
    }

    #[test]
    fn test_translate_default_limit() {
        assert_eq!(translate(0, 0, 100).per_page, 30);
        assert_eq!(translate(60, -5, 100), NativePage { page: 3, per_page: 30 });
    }

    #[test]
    fn test_translate_default_respects_small_max() {
        assert_eq!(translate(0, 0, 10).per_page, 10);
    }

    #[test]
    fn test_translate_property_grid() {
        for max in [1u32, 7, 30, 100] {
            for limit in 1..=i64::from(max) {
                for offset in [0u64, 1, 29, 30, 99, 1000] {
                    let native = translate(offset, limit, max);
                    assert_eq!(native.per_page as i64, limit);
                    assert_eq!(u64::from(native.page), offset / limit as u64 + 1);
                }
            }
        }
    }

    #[test]
    fn test_native_page_start() {
        assert_eq!(NativePage { page: 3, per_page: 20 }.start(), 40);
    }

    #[tokio::test]
    async fn test_fetch_one_wraps_failures_with_page() {
        let mut source = SyntheticSource::new(10);
        source.fail_on_page = Some(2);
        let err = fetch_one(&source, NativePage { page: 2, per_page: 5 })
            .await
            .unwrap_err();
        assert!(matches!(err, VcsError::Page { page: 2, .. }));
    }

    #[tokio::test]
    async fn test_collect_all_preserves_page_order() {
        let source = SyntheticSource::new(137);
        let items = collect_all(&source, 50, 100, |n: usize| async move { Ok(n * 2) })
            .await
            .unwrap();
        assert_eq!(items.len(), 137);
        assert_eq!(items[0], 0);
        assert_eq!(items[136], 272);
        assert!(items.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_collect_all_follows_total_pages() {
        let mut source = SyntheticSource::new(40);
        source.declare_total = true;
        source.omit_next = true;
        let items = collect_all(&source, 10, 100, |n: usize| async move { Ok(n) })
            .await
            .unwrap();
        assert_eq!(items.len(), 40);
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn test_collect_all_is_all_or_nothing() {
        let mut source = SyntheticSource::new(100);
        source.fail_on_page = Some(3);
        let err = collect_all(&source, 10, 100, |n: usize| async move { Ok(n) })
            .await
            .unwrap_err();
        assert!(matches!(err, VcsError::Page { page: 3, .. }));
    }

    #[tokio::test]
    async fn test_collect_all_stops_at_page_cap() {
        let source = SyntheticSource::new(100);
        let items = collect_all(&source, 10, 2, |n: usize| async move { Ok(n) })
            .await
            .unwrap();
        assert_eq!(items.len(), 20);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_collect_all_detail_failure_fails_traversal() {
        let source = SyntheticSource::new(30);
        let err = collect_all(&source, 10, 100, |n: usize| async move {
            if n == 15 {
                Err(VcsError::detail(n.to_string(), VcsError::Task("boom".to_string())))
            } else {
                Ok(n)
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, VcsError::Page { page: 2, .. }));
    }

    #[tokio::test]
    async fn test_collect_all_empty_listing() {
        let source = SyntheticSource::new(0);
        let items = collect_all(&source, 10, 100, |n: usize| async move { Ok(n) })
            .await
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(source.calls(), 1);
    }
}
