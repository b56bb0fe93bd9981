//! Cursor pagination for owner-scoped listings.
//!
//! Pages are ordered newest first by `(created_at, id)`. The cursor is the id
//! of the last item on the previous page; the next page holds the items
//! strictly older than it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const MAX_PAGE_LIMIT: usize = 100;

/// Sort key shared by every paginated collection.
pub type PageKey = (DateTime<Utc>, Uuid);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    pub cursor: Option<Uuid>,
    pub limit: Option<usize>,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self {
            cursor: None,
            limit: Some(limit),
        }
    }

    pub fn after(cursor: Uuid, limit: usize) -> Self {
        Self {
            cursor: Some(cursor),
            limit: Some(limit),
        }
    }

    /// Zero or missing means the default; anything above the maximum is capped.
    pub fn limit(&self) -> usize {
        self.limit
            .filter(|&limit| limit > 0)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .min(MAX_PAGE_LIMIT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Uuid>,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            has_more: self.has_more,
        }
    }
}

/// Slice one page out of `items`.
///
/// `after` is the resolved key of the cursor item, if any. The caller looks it
/// up so that a cursor pointing at an item that has since left the listing
/// (a soft-deleted CV, say) still works.
pub fn paginate<T>(
    mut items: Vec<T>,
    after: Option<PageKey>,
    limit: usize,
    key: impl Fn(&T) -> PageKey,
) -> Page<T> {
    if let Some(after) = after {
        items.retain(|item| key(item) < after);
    }
    items.sort_by(|a, b| key(b).cmp(&key(a)));

    let has_more = items.len() > limit;
    items.truncate(limit);
    let next_cursor = if has_more {
        items.last().map(|item| key(item).1)
    } else {
        None
    };

    Page {
        data: items,
        next_cursor,
        has_more,
    }
}
