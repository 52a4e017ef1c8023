//! Cursor pagination and path id parsing.

use serde::Deserialize;

use super::error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 25;
pub const MAX_PAGE_SIZE: i64 = 100;

/// `?before=<id>&limit=<n>` query parameters
///
/// Ids are snowflakes, so "before" yields newest-first pages.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub before: Option<String>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn new(before: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            before: before.map(|id| id.to_string()),
            limit,
        }
    }

    /// Requested page size clamped to `1..=MAX_PAGE_SIZE`
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn before(&self) -> Result<Option<i64>, AppError> {
        self.before
            .as_deref()
            .map(|raw| parse_id(raw, "before"))
            .transpose()
    }

    /// Parsed cursor and clamped limit.
    pub fn page(&self) -> Result<Page, AppError> {
        Ok(Page {
            before: self.before()?,
            limit: self.limit(),
        })
    }
}

/// A validated page request as the services consume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub before: Option<i64>,
    pub limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            before: None,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    pub fn new(before: Option<i64>, limit: i64) -> Self {
        Self {
            before,
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// Parse a snowflake id from a path or query segment.
pub fn parse_id(raw: &str, what: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid {} ID", what)))
}

/// Parse a list of snowflake ids.
pub fn parse_ids(raw: &[String], what: &str) -> Result<Vec<i64>, AppError> {
    raw.iter().map(|s| parse_id(s, what)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(None, 25)]
    #[test_case(Some(0), 1)]
    #[test_case(Some(-5), 1)]
    #[test_case(Some(40), 40)]
    #[test_case(Some(1000), 100)]
    fn test_limit_clamped(limit: Option<i64>, expected: i64) {
        let q = PageQuery { before: None, limit };
        assert_eq!(q.limit(), expected);
    }

    #[test]
    fn test_before_parsing() {
        assert_eq!(PageQuery::new(Some(42), None).before().unwrap(), Some(42));
        assert_eq!(PageQuery::default().before().unwrap(), None);

        let bad = PageQuery {
            before: Some("abc".into()),
            limit: None,
        };
        assert!(matches!(bad.before(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_page_from_query() {
        let q = PageQuery {
            before: Some("900".into()),
            limit: Some(500),
        };
        assert_eq!(q.page().unwrap(), Page::new(Some(900), 100));
    }

    #[test]
    fn test_parse_id_rejects_non_positive() {
        assert!(parse_id("0", "user").is_err());
        assert!(parse_id("-3", "user").is_err());
        assert_eq!(parse_id("77", "user").unwrap(), 77);
    }
}
