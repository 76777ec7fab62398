use serde::Deserialize;

use crate::database::PinsPage;

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// `?page=&limit=` query parameters. Pages start at 1.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Offset window for storage. Pages below 1 become 1, limits are
    /// clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn window(&self) -> PinsPage {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        PinsPage {
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}
