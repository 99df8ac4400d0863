//! Query definitions shared by the pager and the record store

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::Moment;

/// Highest sortable suffix character used to close a prefix range.
///
/// `[term, term + MAX_SUFFIX)` selects every caption starting with `term`.
pub const MAX_SUFFIX: char = '\u{f8ff}';

/// Field a moment query is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    CreatedAt,
    Caption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ordering {
    pub field: OrderField,
    pub direction: Direction,
}

impl Ordering {
    pub const NEWEST_FIRST: Ordering = Ordering {
        field: OrderField::CreatedAt,
        direction: Direction::Descending,
    };

    pub const CAPTION_ASCENDING: Ordering = Ordering {
        field: OrderField::Caption,
        direction: Direction::Ascending,
    };
}

/// Half-open range over the normalized caption: `start <= key < end`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionRange {
    pub start: String,
    pub end: String,
}

impl CaptionRange {
    /// Range matching every normalized caption with `prefix` as a prefix
    pub fn prefix(prefix: &str) -> Self {
        let mut end = String::with_capacity(prefix.len() + MAX_SUFFIX.len_utf8());
        end.push_str(prefix);
        end.push(MAX_SUFFIX);
        Self {
            start: prefix.to_string(),
            end,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        key >= self.start.as_str() && key < self.end.as_str()
    }
}

/// Sort key captured by a cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorKey {
    CreatedAt(DateTime<Utc>),
    Caption(String),
}

/// Opaque reference to the last record of a page
///
/// Carries the record id as a tie-breaker so equal sort keys
/// never skip or repeat records across page boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cursor {
    pub(crate) id: String,
    pub(crate) key: CursorKey,
}

impl Cursor {
    /// Cursor positioned at `moment` for the given ordering field
    pub fn at(moment: &Moment, field: OrderField) -> Self {
        let key = match field {
            OrderField::CreatedAt => CursorKey::CreatedAt(moment.created_at),
            OrderField::Caption => CursorKey::Caption(crate::data::caption_key(
                moment.caption.as_deref().unwrap_or_default(),
            )),
        };
        Self {
            id: moment.id.clone(),
            key,
        }
    }

    pub fn record_id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> &CursorKey {
        &self.key
    }
}

/// Everything a store needs to produce one window of moments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryDefinition {
    pub order: Ordering,
    pub range: Option<CaptionRange>,
    pub start_after: Option<Cursor>,
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_range_is_half_open() {
        let range = CaptionRange::prefix("cat");
        assert!(range.contains("cat"));
        assert!(range.contains("cat nap"));
        assert!(range.contains("category"));
        assert!(!range.contains("dog"));
        assert!(!range.contains("ca"));
        assert_eq!(range.end, format!("cat{MAX_SUFFIX}"));
    }

    #[test]
    fn caption_cursor_uses_normalized_key() {
        let moment = Moment {
            id: "m1".to_string(),
            caption: Some("Category".to_string()),
            user_id: "u1".to_string(),
            image_url: None,
            like_count: 0,
            comment_count: 0,
            created_at: Utc::now(),
        };
        let cursor = Cursor::at(&moment, OrderField::Caption);
        assert_eq!(cursor.key(), &CursorKey::Caption("category".to_string()));
        assert_eq!(cursor.record_id(), "m1");
    }
}
