//! Cursor pager
//!
//! Turns (mode, page, cursor) into a [`QueryDefinition`] and remembers one
//! start-after cursor per visited page, so going back re-issues the exact
//! query that produced the earlier page.

use serde::Serialize;

use crate::backend::{CaptionRange, Cursor, Ordering, QueryDefinition};
use crate::data::{Moment, caption_key};

/// Default browsing or prefix search; never both
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "term", rename_all = "snake_case")]
pub enum ViewMode {
    Default,
    /// Normalized (trimmed, lower-cased) search term
    Search(String),
}

impl ViewMode {
    /// Interpret raw search input. Blank input means default mode.
    pub fn from_input(raw: &str) -> Self {
        let term = caption_key(raw.trim());
        if term.is_empty() {
            ViewMode::Default
        } else {
            ViewMode::Search(term)
        }
    }

    pub fn ordering(&self) -> Ordering {
        match self {
            ViewMode::Default => Ordering::NEWEST_FIRST,
            ViewMode::Search(_) => Ordering::CAPTION_ASCENDING,
        }
    }

    /// Filter the aggregate count and the page query share
    pub fn range(&self) -> Option<CaptionRange> {
        match self {
            ViewMode::Default => None,
            ViewMode::Search(term) => Some(CaptionRange::prefix(term)),
        }
    }
}

/// Build the query for one page
///
/// The cursor is ignored on page 1.
pub fn build_query(
    mode: &ViewMode,
    page: usize,
    cursor: Option<&Cursor>,
    page_size: usize,
) -> QueryDefinition {
    QueryDefinition {
        order: mode.ordering(),
        range: mode.range(),
        start_after: if page > 1 { cursor.cloned() } else { None },
        limit: page_size,
    }
}

/// Pagination position for the moments view
#[derive(Debug, Clone)]
pub struct PageState {
    mode: ViewMode,
    page: usize,
    page_size: usize,
    /// `cursors[n]` is the start-after cursor of page `n + 1`
    cursors: Vec<Option<Cursor>>,
    has_more: bool,
}

impl PageState {
    pub fn new(page_size: usize) -> Self {
        Self {
            mode: ViewMode::Default,
            page: 1,
            page_size,
            cursors: vec![None],
            has_more: false,
        }
    }

    pub fn mode(&self) -> &ViewMode {
        &self.mode
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// True iff the last page received was exactly full
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    fn current_cursor(&self) -> Option<&Cursor> {
        self.cursors.get(self.page - 1).and_then(Option::as_ref)
    }

    /// Query for the current position
    pub fn query(&self) -> QueryDefinition {
        build_query(&self.mode, self.page, self.current_cursor(), self.page_size)
    }

    /// Switch mode: back to page 1, every cursor discarded
    pub fn reset(&mut self, mode: ViewMode) {
        self.mode = mode;
        self.page = 1;
        self.cursors = vec![None];
        self.has_more = false;
    }

    /// Record the window delivered for the current page
    ///
    /// The last record becomes the cursor of the next page. An empty page
    /// hands its own cursor on.
    pub fn record_snapshot(&mut self, items: &[Moment]) {
        self.has_more = items.len() == self.page_size;

        let next = match items.last() {
            Some(last) => Some(Cursor::at(last, self.mode.ordering().field)),
            None => self.current_cursor().cloned(),
        };
        self.cursors.truncate(self.page);
        self.cursors.push(next);
    }

    /// Advance one page. Unconditional: callers consult `has_more`.
    pub fn next(&mut self) -> QueryDefinition {
        if self.cursors.len() <= self.page {
            let carried = self.current_cursor().cloned();
            self.cursors.push(carried);
        }
        self.page += 1;
        self.has_more = false;
        self.query()
    }

    /// Go back one page. `None` (no-op) on page 1.
    pub fn previous(&mut self) -> Option<QueryDefinition> {
        if self.page == 1 {
            return None;
        }
        self.page -= 1;
        Some(self.query())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OrderField;
    use chrono::{Duration, TimeZone, Utc};

    fn moments(range: std::ops::Range<i64>) -> Vec<Moment> {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        range
            .map(|i| Moment {
                id: format!("m{i:02}"),
                caption: Some(format!("caption {i}")),
                user_id: "u1".to_string(),
                image_url: None,
                like_count: 0,
                comment_count: 0,
                created_at: base - Duration::minutes(i),
            })
            .collect()
    }

    #[test]
    fn page_one_never_has_a_cursor() {
        let cursor = Cursor::at(&moments(0..1)[0], OrderField::CreatedAt);
        let query = build_query(&ViewMode::Default, 1, Some(&cursor), 10);
        assert!(query.start_after.is_none());

        let query = build_query(&ViewMode::Search("cat".to_string()), 1, Some(&cursor), 10);
        assert!(query.start_after.is_none());
        assert_eq!(query.limit, 10);
    }

    #[test]
    fn search_mode_orders_by_caption_within_prefix() {
        let query = build_query(&ViewMode::Search("cat".to_string()), 1, None, 10);
        assert_eq!(query.order, Ordering::CAPTION_ASCENDING);
        assert_eq!(query.range, Some(CaptionRange::prefix("cat")));

        let query = build_query(&ViewMode::Default, 1, None, 10);
        assert_eq!(query.order, Ordering::NEWEST_FIRST);
        assert!(query.range.is_none());
    }

    #[test]
    fn blank_input_is_default_mode() {
        assert_eq!(ViewMode::from_input("   "), ViewMode::Default);
        assert_eq!(ViewMode::from_input(" Cat "), ViewMode::Search("cat".to_string()));
    }

    #[test]
    fn walks_twenty_five_records() {
        let all = moments(0..25);
        let mut pager = PageState::new(10);

        pager.record_snapshot(&all[0..10]);
        assert!(pager.has_more());

        let query = pager.next();
        assert_eq!(query.start_after.as_ref().unwrap().record_id(), "m09");
        pager.record_snapshot(&all[10..20]);
        assert!(pager.has_more());

        let query = pager.next();
        assert_eq!(query.start_after.as_ref().unwrap().record_id(), "m19");
        pager.record_snapshot(&all[20..25]);
        assert_eq!(pager.page(), 3);
        assert!(!pager.has_more());

        let query = pager.next();
        assert_eq!(query.start_after.as_ref().unwrap().record_id(), "m24");
        pager.record_snapshot(&[]);
        assert_eq!(pager.page(), 4);
        assert!(!pager.has_more());

        // An empty page keeps handing the same cursor on
        let query = pager.next();
        assert_eq!(query.start_after.as_ref().unwrap().record_id(), "m24");
    }

    #[test]
    fn previous_reissues_earlier_query() {
        let all = moments(0..25);
        let mut pager = PageState::new(10);
        pager.record_snapshot(&all[0..10]);
        let second = pager.next();
        pager.record_snapshot(&all[10..20]);
        pager.next();
        pager.record_snapshot(&all[20..25]);

        assert_eq!(pager.previous(), Some(second));
        assert_eq!(pager.page(), 2);
        let first = pager.previous().unwrap();
        assert!(first.start_after.is_none());
        assert_eq!(pager.previous(), None);
        assert_eq!(pager.page(), 1);
    }

    #[test]
    fn mode_switch_resets_to_page_one() {
        let all = moments(0..25);
        let mut pager = PageState::new(10);
        pager.record_snapshot(&all[0..10]);
        pager.next();

        pager.reset(ViewMode::Search("cat".to_string()));
        assert_eq!(pager.page(), 1);
        assert!(pager.query().start_after.is_none());

        pager.reset(ViewMode::Default);
        assert_eq!(pager.page(), 1);
        assert!(pager.query().start_after.is_none());
    }
}
