//! Purpose: Turn CLI key expressions into byte-range queries.
//! Exports: `RangeQuery`, `resolve`, `prefix_end`, `SMALLEST_KEY`, `WILDCARD`.
//! Role: Pure, total functions; every input string is a valid key or prefix.
//! Invariants: `RangeQuery::start` is never empty; `[0x00]` stands for the smallest key.
//! Invariants: As a range end `[0x00]` means "no upper bound" (scan to end of keyspace).
//! Invariants: `prefix_end` of a non all-0xFF input keeps its length and sorts strictly after it.

/// One-byte key that sorts before every other key.
pub const SMALLEST_KEY: &[u8] = &[0];

/// Suffix that turns a key argument into a prefix search.
pub const WILDCARD: char = '*';

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeQuery {
    pub table: String,
    pub start: Vec<u8>,
    /// `None` selects exactly the `start` key.
    pub end: Option<Vec<u8>>,
    /// Values `<= 0` mean unbounded.
    pub limit: i64,
}

impl RangeQuery {
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            start: SMALLEST_KEY.to_vec(),
            end: Some(SMALLEST_KEY.to_vec()),
            limit: 0,
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn is_exact(&self) -> bool {
        self.end.is_none()
    }
}

/// Resolve `range <table> [key] [range-end]` arguments into a query.
///
/// Precedence: an explicit range end wins and is taken verbatim; a missing key
/// (or a bare `*`) selects every key; a trailing `*` is a prefix search;
/// anything else is an exact-key lookup.
///
/// An explicit but empty range end is kept as an empty end key; the store
/// treats `[start, "")` as an empty range, so nothing is selected. Only an
/// end of `[0x00]` means "no upper bound".
pub fn resolve(
    table: &str,
    key: Option<&str>,
    range_end: Option<&str>,
    limit: i64,
) -> RangeQuery {
    let (start, end) = match (key, range_end) {
        (key, Some(end)) => {
            let start = match key {
                Some(key) if !key.is_empty() => key.as_bytes().to_vec(),
                _ => SMALLEST_KEY.to_vec(),
            };
            (start, Some(end.as_bytes().to_vec()))
        }
        (None, None) => (SMALLEST_KEY.to_vec(), Some(SMALLEST_KEY.to_vec())),
        (Some(key), None) => match key.strip_suffix(WILDCARD) {
            Some(prefix) if prefix.is_empty() => {
                (SMALLEST_KEY.to_vec(), Some(SMALLEST_KEY.to_vec()))
            }
            Some(prefix) => (prefix.as_bytes().to_vec(), Some(prefix_end(prefix.as_bytes()))),
            None if key.is_empty() => (SMALLEST_KEY.to_vec(), Some(SMALLEST_KEY.to_vec())),
            None => (key.as_bytes().to_vec(), None),
        },
    };
    RangeQuery {
        table: table.to_string(),
        start,
        end,
        limit,
    }
}

/// Exclusive upper bound for a prefix scan: `prefix + 1` as a big-endian counter.
///
/// An all-0xFF prefix has no successor of the same length; it maps to
/// `SMALLEST_KEY`, which the store reads as "no upper bound".
pub fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    for idx in (0..end.len()).rev() {
        if end[idx] < u8::MAX {
            end[idx] += 1;
            return end;
        }
        end[idx] = 0;
    }
    SMALLEST_KEY.to_vec()
}
