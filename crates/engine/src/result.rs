//! Query results.

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// One page of an evaluated query.
///
/// Built fresh on every evaluation and never mutated; callers replace their
/// displayed state with each new page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPage {
    /// Records on this page, in final sort order.
    pub items: Vec<Record>,

    /// Records matching search and filters, before paging.
    pub total_matches: u64,

    /// `ceil(total_matches / page_size)`; zero when nothing matches.
    pub page_count: u32,

    /// Requested page (1-indexed).
    pub page: u32,

    /// Requested page size.
    pub page_size: u32,

    /// Whether a later page exists.
    pub has_next: bool,

    /// Whether an earlier page exists.
    pub has_prev: bool,
}

impl ResultPage {
    /// Create a page with paging calculations.
    pub fn new(items: Vec<Record>, total_matches: u64, page: u32, page_size: u32) -> Self {
        let page_count = if page_size > 0 {
            u32::try_from(total_matches.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX)
        } else {
            0
        };

        Self {
            items,
            total_matches,
            page_count,
            page,
            page_size,
            has_next: page < page_count,
            has_prev: page > 1 && page_count > 0,
        }
    }

    /// Whether the requested page lies past the last page.
    pub fn is_out_of_range(&self) -> bool {
        self.page > self.page_count
    }
}
