//! Best-effort total item counts for listings that do not report one.
//!
//! Four strategies, chosen per provider according to what its listing exposes:
//!
//! - **declared**: the upstream sent an exact count (GitLab `X-Total`).
//! - **short page**: a non-empty page with fewer items than requested is the last
//!   one, so the total is exact.
//! - **last link**: `rel="last"` page times page size. Overcounts when the last page
//!   is not full.
//! - **counting** / **bisection**: extra round trips at maximum page size, for
//!   providers that send nothing usable. Both are slow paths.

use tracing::{debug, info};

use super::{fetch_one, NativePage, PageSignals, PageSource};
use crate::vcs::VcsError;

/// Which rule produced a total. Logged, and handy in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ShortPage,
    Declared,
    LastLink,
    LastPage,
    Counting,
    Bisection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Estimate {
    pub total: u64,
    pub strategy: Strategy,
}

/// `last_page * per_page`.
pub fn from_last_link(last_page: u32, per_page: u32) -> u64 {
    u64::from(last_page) * u64::from(per_page)
}

/// Derive a total from a single fetched page without further requests.
///
/// `raw_len` is the number of records upstream returned for `native`. A declared
/// count always wins. An empty page after the first says nothing about where the
/// listing ends, so it yields `None` and the caller falls back to counting.
pub fn from_page(native: NativePage, raw_len: usize, signals: &PageSignals) -> Option<Estimate> {
    let seen = native.start() + raw_len as u64;

    if let Some(total) = signals.total_items {
        return Some(Estimate {
            total,
            strategy: Strategy::Declared,
        });
    }
    if raw_len == 0 && native.page > 1 {
        return None;
    }
    if raw_len < native.per_page as usize {
        return Some(Estimate {
            total: seen,
            strategy: Strategy::ShortPage,
        });
    }
    if let Some(last) = signals.last_page {
        let per_page = signals.link_per_page.unwrap_or(native.per_page);
        return Some(Estimate {
            total: from_last_link(last, per_page).max(seen),
            strategy: Strategy::LastLink,
        });
    }
    if signals.has_links && signals.next_page.is_none() {
        return Some(Estimate {
            total: seen,
            strategy: Strategy::LastPage,
        });
    }
    None
}

/// Count by walking pages at `max_per_page` until an empty or short page.
///
/// Costs one request per `max_per_page` items.
pub async fn count_by_walking<P: PageSource>(source: &P, max_per_page: u32) -> Result<u64, VcsError> {
    let per_page = max_per_page.max(1);
    let mut total = 0u64;
    let mut page = 1u32;

    loop {
        let chunk = fetch_one(source, NativePage { page, per_page }).await?;
        total += chunk.raw_len as u64;
        if chunk.raw_len < per_page as usize {
            break;
        }
        page += 1;
    }

    info!(total, pages = page, "counted listing by walking every page");
    Ok(total)
}

/// Locate the last non-empty page by bisection and count exactly.
///
/// The upper bound starts at page 2 and doubles until an empty page is found, so
/// there is no fixed ceiling on listing size. A 404 counts as an empty page.
pub async fn count_by_bisection<P: PageSource>(
    source: &P,
    max_per_page: u32,
) -> Result<u64, VcsError> {
    let per_page = max_per_page.max(1);
    let full = per_page as usize;
    let mut probes = 0u32;

    let first = probe(source, 1, per_page, &mut probes).await?;
    if first < full {
        return Ok(first as u64);
    }

    // `lo` is always a full page, `hi` always empty.
    let mut lo = 1u32;
    let mut hi = 2u32;
    loop {
        let len = probe(source, hi, per_page, &mut probes).await?;
        if len == 0 {
            break;
        }
        if len < full {
            return Ok(settle(hi, per_page, len, probes));
        }
        lo = hi;
        hi = hi
            .checked_mul(2)
            .ok_or_else(|| VcsError::Task("page bound overflowed while widening".to_string()))?;
    }

    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        let len = probe(source, mid, per_page, &mut probes).await?;
        if len == 0 {
            hi = mid;
        } else if len < full {
            return Ok(settle(mid, per_page, len, probes));
        } else {
            lo = mid;
        }
    }

    Ok(settle(lo, per_page, full, probes))
}

async fn probe<P: PageSource>(
    source: &P,
    page: u32,
    per_page: u32,
    probes: &mut u32,
) -> Result<usize, VcsError> {
    *probes += 1;
    match fetch_one(source, NativePage { page, per_page }).await {
        Ok(chunk) => Ok(chunk.raw_len),
        Err(err) if err.is_not_found() => Ok(0),
        Err(err) => Err(err),
    }
}

fn settle(last_page: u32, per_page: u32, last_len: usize, probes: u32) -> u64 {
    let total = u64::from(last_page - 1) * u64::from(per_page) + last_len as u64;
    debug!(last_page, probes, total, "bisection located last page");
    total
}
