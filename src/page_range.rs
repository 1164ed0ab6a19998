use crate::error::{Error, Result};
use std::num::IntErrorKind;
use tracing::debug;

/// One comma-separated token of a page selection, still 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: i64,
    pub end: i64,
}

impl PageRange {
    /// Parse a single token like "5" or "1-5". The token must already be trimmed and non-empty.
    pub fn parse(s: &str) -> Result<Self> {
        if s.contains('-') {
            let parts: Vec<&str> = s.split('-').collect();
            if parts.len() != 2 {
                return Err(Error::MalformedRange(s.to_string()));
            }

            let start = parse_number(parts[0]).ok_or_else(|| Error::MalformedRange(s.to_string()))?;
            let end = parse_number(parts[1]).ok_or_else(|| Error::MalformedRange(s.to_string()))?;

            if start > end {
                return Err(Error::InvertedRange { start, end });
            }

            Ok(PageRange { start, end })
        } else {
            let page = parse_number(s).ok_or_else(|| Error::NotAnInteger(s.to_string()))?;
            Ok(PageRange {
                start: page,
                end: page,
            })
        }
    }

    /// Expand this range into 0-based page indices, ascending.
    ///
    /// The first page of the range that falls outside `1..=total_pages` is
    /// reported, exactly as if every page were checked in order.
    pub fn expand(&self, total_pages: u32) -> Result<Vec<u32>> {
        let total = i64::from(total_pages);

        if self.start < 1 {
            return Err(Error::OutOfRange {
                page: self.start,
                total: total_pages,
            });
        }

        if self.end > total {
            return Err(Error::OutOfRange {
                page: self.start.max(total + 1),
                total: total_pages,
            });
        }

        // Both ends are within 1..=total_pages here, so the casts are lossless.
        Ok((self.start as u32..=self.end as u32).map(|p| p - 1).collect())
    }
}

/// Parse one trimmed endpoint. Integers too large for `i64` saturate, so they
/// still fail the bounds or ordering checks instead of reading as non-numbers.
fn parse_number(s: &str) -> Option<i64> {
    match s.trim().parse::<i64>() {
        Ok(n) => Some(n),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

/// Parse a page selection like "1-2, 5-7, 11, 13" into 0-based page indices.
///
/// Indices come out in the order they were written and are not de-duplicated.
/// Empty tokens are skipped, so `""` and `","` produce an empty list. Any bad
/// token rejects the whole expression.
pub fn parse(expression: &str, total_pages: u32) -> Result<Vec<u32>> {
    let mut pages = Vec::new();
    for part in expression.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        pages.extend(PageRange::parse(part)?.expand(total_pages)?);
    }

    debug!(expression, total_pages, selected = pages.len(), "parsed page selection");
    Ok(pages)
}

/// The distinct 1-based page numbers of a parsed selection, ascending.
pub fn distinct_page_numbers(indices: &[u32]) -> Vec<u32> {
    let mut pages: Vec<u32> = indices.iter().map(|i| i + 1).collect();
    pages.sort_unstable();
    pages.dedup();
    pages
}
