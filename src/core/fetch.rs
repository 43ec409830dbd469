//! Purpose: Drive a paged range scan to completion against a `RangeProvider`.
//! Exports: `fetch`, `FetchSummary`, `BoundaryDedup`.
//! Role: Owns the per-command fetch session (cursor, emitted count, first-page flag).
//! Invariants: Every key in range reaches `on_page` exactly once, in provider order.
//! Invariants: Strictly sequential; page N+1 is requested only after `on_page(N)` returns.
//! Invariants: The first provider error aborts the scan; there are no retries.
use crate::core::error::{Error, ErrorKind};
use crate::core::keys::RangeQuery;
use crate::core::page::{GetOptions, Page, RangeProvider, apply_limit};
use tracing::debug;

/// Totals for one completed `fetch` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub pages: u64,
    pub emitted: i64,
}

/// Normalizes inclusive-cursor pages: every page after the first starts with
/// the previous page's last record, which is dropped here.
pub struct BoundaryDedup<P> {
    inner: P,
    continuing: bool,
}

/// A provider page after boundary dedup, plus the raw page boundary.
pub struct DedupPage {
    pub page: Page,
    /// Last key the provider returned, before any trimming; the next cursor.
    pub boundary: Option<Vec<u8>>,
}

impl<P: RangeProvider> BoundaryDedup<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            continuing: false,
        }
    }

    pub fn next_page(
        &mut self,
        table: &str,
        cursor: &[u8],
        opts: &GetOptions,
    ) -> Result<DedupPage, Error> {
        let mut page = self.inner.get(table, cursor, opts)?;
        let boundary = page.last_key().map(<[u8]>::to_vec);
        if self.continuing && !page.is_empty() {
            debug!(cursor = ?String::from_utf8_lossy(cursor), "dropping repeated boundary record");
            page.drop_first();
        }
        self.continuing = true;
        Ok(DedupPage { page, boundary })
    }
}

struct FetchSession {
    cursor_key: Vec<u8>,
    emitted_count: i64,
    is_first_page: bool,
}

impl FetchSession {
    fn page_limit_hint(&self, limit: i64) -> i64 {
        if limit <= 0 {
            return 0;
        }
        let remaining = (limit - self.emitted_count).max(0);
        if self.is_first_page {
            remaining
        } else {
            remaining + 1
        }
    }
}

/// Fetch every record selected by `query`, handing surviving pages to `on_page`.
///
/// `on_page` returns `Ok(false)` to stop early. Output produced by earlier
/// pages is never rolled back when a later provider call fails.
pub fn fetch<P, F>(
    query: &RangeQuery,
    provider: P,
    mut on_page: F,
) -> Result<FetchSummary, Error>
where
    P: RangeProvider,
    F: FnMut(Page) -> Result<bool, Error>,
{
    let mut source = BoundaryDedup::new(provider);
    let mut session = FetchSession {
        cursor_key: query.start.clone(),
        emitted_count: 0,
        is_first_page: true,
    };
    let mut summary = FetchSummary::default();

    loop {
        let opts = GetOptions {
            range_end: query.end.clone(),
            limit: session.page_limit_hint(query.limit),
        };
        let DedupPage { page, boundary } =
            source.next_page(&query.table, &session.cursor_key, &opts)?;
        summary.pages += 1;

        let limited = apply_limit(session.emitted_count, query.limit, page);
        let more = limited.page.more;
        session.emitted_count += limited.page.count;
        debug!(
            table = %query.table,
            page = summary.pages,
            records = limited.page.count,
            emitted = session.emitted_count,
            more,
            "range page"
        );

        let proceed = on_page(limited.page)?;
        if !proceed || limited.reached || !more {
            if limited.reached && more {
                debug!(limit = query.limit, "limit reached; not requesting further pages");
            }
            break;
        }

        let Some(next_cursor) = boundary else {
            return Err(Error::new(ErrorKind::Internal)
                .with_message("range page reported more results but returned no records"));
        };
        if !session.is_first_page && next_cursor == session.cursor_key {
            return Err(Error::new(ErrorKind::Internal)
                .with_message("range cursor did not advance between pages"));
        }
        session.cursor_key = next_cursor;
        session.is_first_page = false;
    }

    summary.emitted = session.emitted_count;
    Ok(summary)
}
