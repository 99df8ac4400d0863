//! CSV export of the loaded page

use chrono::NaiveDate;
use serde::Serialize;

use crate::data::{Moment, User};
use crate::error::{AppError, Result};

const HEADERS: [&str; 7] = ["ID", "Caption", "User", "Created", "Likes", "Comments", "ImageURL"];

/// One exported moment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvRow {
    pub id: String,
    pub caption: String,
    /// Author email when known, otherwise the raw user ID
    pub user: String,
    pub created: String,
    pub likes: i64,
    pub comments: i64,
    pub image_url: String,
}

impl CsvRow {
    pub fn project(moment: &Moment, users: &[User]) -> Self {
        let user = users
            .iter()
            .find(|user| user.id == moment.user_id)
            .map(|user| user.email.clone())
            .unwrap_or_else(|| moment.user_id.clone());

        Self {
            id: moment.id.clone(),
            caption: moment
                .caption
                .clone()
                .unwrap_or_else(|| "No caption".to_string()),
            user,
            created: moment.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            likes: moment.like_count,
            comments: moment.comment_count,
            image_url: moment
                .image_url
                .clone()
                .unwrap_or_else(|| "None".to_string()),
        }
    }
}

/// Snapshot of the current page, ready to serialize
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub filename: String,
    pub rows: Vec<CsvRow>,
}

impl CsvExport {
    /// Project the loaded page only, never the whole collection
    pub fn from_page(moments: &[Moment], users: &[User], today: NaiveDate) -> Self {
        Self {
            filename: format!("moments-export-{}.csv", today.format("%Y-%m-%d")),
            rows: moments.iter().map(|m| CsvRow::project(m, users)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());

        writer.write_record(HEADERS).map_err(csv_error)?;
        for row in &self.rows {
            writer.serialize(row).map_err(csv_error)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("CSV flush failed: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AppError::Internal(e.into()))
    }
}

fn csv_error(error: csv::Error) -> AppError {
    AppError::Internal(anyhow::anyhow!("CSV serialization failed: {}", error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn moment(id: &str, caption: Option<&str>, user_id: &str) -> Moment {
        Moment {
            id: id.to_string(),
            caption: caption.map(str::to_string),
            user_id: user_id.to_string(),
            image_url: None,
            like_count: 3,
            comment_count: 1,
            created_at: Utc.with_ymd_and_hms(2026, 5, 4, 13, 2, 9).unwrap(),
        }
    }

    #[test]
    fn projects_fields_with_fallbacks() {
        let users = vec![User::new("u1", "one@example.com", Utc::now())];
        let export = CsvExport::from_page(
            &[moment("m1", Some("hello, world"), "u1"), moment("m2", None, "u9")],
            &users,
            NaiveDate::from_ymd_opt(2026, 5, 5).unwrap(),
        );

        assert_eq!(export.filename, "moments-export-2026-05-05.csv");
        assert_eq!(export.len(), 2);
        assert_eq!(export.rows[0].user, "one@example.com");
        assert_eq!(export.rows[0].created, "2026-05-04 13:02:09");
        assert_eq!(export.rows[1].caption, "No caption");
        assert_eq!(export.rows[1].user, "u9");
        assert_eq!(export.rows[1].image_url, "None");

        let csv = export.to_csv().unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "ID,Caption,User,Created,Likes,Comments,ImageURL");
        assert_eq!(
            lines[1],
            "m1,\"hello, world\",one@example.com,2026-05-04 13:02:09,3,1,None"
        );
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_page_exports_header_only() {
        let export = CsvExport::from_page(&[], &[], NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert!(export.is_empty());
        assert_eq!(export.to_csv().unwrap().lines().count(), 1);
    }
}
