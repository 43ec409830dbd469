//! Purpose: Page model, the provider seam, and client-side limit enforcement.
//! Exports: `KeyValue`, `Page`, `GetOptions`, `RangeProvider`, `Limited`, `apply_limit`.
//! Role: Shared vocabulary between the fetch loop, renderers and remote transport.
//! Invariants: `Page::count` always equals the number of records the page holds.
//! Invariants: `apply_limit` is pure; a limit `<= 0` leaves pages untouched.
use crate::core::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl KeyValue {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One bounded response from a `RangeProvider`.
///
/// `more` means the provider cut the page at its own page size; the last
/// record's key is then the cursor for the next request, and that record is
/// repeated as the first record of the next page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<KeyValue>,
    pub count: i64,
    pub more: bool,
}

impl Page {
    pub fn new(records: Vec<KeyValue>, more: bool) -> Self {
        let count = records.len() as i64;
        Self {
            records,
            count,
            more,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_key(&self) -> Option<&[u8]> {
        self.records.last().map(|record| record.key.as_slice())
    }

    pub(crate) fn drop_first(&mut self) {
        if !self.records.is_empty() {
            self.records.remove(0);
            self.count -= 1;
        }
    }

    fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
        self.count = self.records.len() as i64;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Exclusive end of the range; `None` asks for the single key only.
    pub range_end: Option<Vec<u8>>,
    /// Upper bound hint for the page size; `0` lets the provider decide.
    pub limit: i64,
}

/// Inclusive-cursor paginator over a remote ordered table.
pub trait RangeProvider {
    fn get(&self, table: &str, key: &[u8], opts: &GetOptions) -> Result<Page, Error>;
}

impl<P: RangeProvider + ?Sized> RangeProvider for &P {
    fn get(&self, table: &str, key: &[u8], opts: &GetOptions) -> Result<Page, Error> {
        (**self).get(table, key, opts)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Limited {
    pub page: Page,
    /// The ceiling is hit; no further pages may be requested.
    pub reached: bool,
}

/// Keep only as much of `page` as still fits under `limit`.
pub fn apply_limit(emitted: i64, limit: i64, mut page: Page) -> Limited {
    if limit <= 0 {
        return Limited {
            page,
            reached: false,
        };
    }
    let remaining = (limit - emitted).max(0);
    if page.count > remaining {
        page.truncate(remaining as usize);
        return Limited {
            page,
            reached: true,
        };
    }
    let reached = page.count == remaining;
    Limited { page, reached }
}
