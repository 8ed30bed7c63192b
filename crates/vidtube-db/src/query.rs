//! Immutable, validated description of a video listing. Callers assemble it
//! through [`VideoQueryBuilder`]; the store only ever executes a built query.

use thiserror::Error;
use uuid::Uuid;

use crate::pagination::PageRequest;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unsupported sort field: {0}")]
    SortField(String),
    #[error("Unsupported sort direction: {0}")]
    SortDirection(String),
    #[error("Sort direction given without a sort field")]
    DirectionWithoutField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Views,
    Duration,
    Title,
}

impl SortField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "createdAt" | "created_at" => Some(Self::CreatedAt),
            "views" => Some(Self::Views),
            "duration" => Some(Self::Duration),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Views => "views",
            Self::Duration => "duration",
            Self::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" => Some(Self::Asc),
            "desc" | "descending" | "-1" => Some(Self::Desc),
            _ => None,
        }
    }

    pub(crate) fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoQuery {
    owner: Option<Uuid>,
    search: Option<String>,
    published_only: bool,
    sort: (SortField, SortDirection),
    page: PageRequest,
}

impl VideoQuery {
    pub fn builder() -> VideoQueryBuilder {
        VideoQueryBuilder::default()
    }

    pub fn owner(&self) -> Option<Uuid> {
        self.owner
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn published_only(&self) -> bool {
        self.published_only
    }

    pub fn sort(&self) -> (SortField, SortDirection) {
        self.sort
    }

    pub fn page(&self) -> PageRequest {
        self.page
    }
}

#[derive(Debug, Default)]
pub struct VideoQueryBuilder {
    owner: Option<Uuid>,
    search: Option<String>,
    published_only: bool,
    sort_by: Option<String>,
    sort_type: Option<String>,
    page: PageRequest,
}

impl VideoQueryBuilder {
    pub fn owner(mut self, owner: Option<Uuid>) -> Self {
        self.owner = owner;
        self
    }

    /// Free-text match on title and description. Blank input is ignored.
    pub fn search(mut self, text: Option<String>) -> Self {
        self.search = text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        self
    }

    pub fn published_only(mut self, published_only: bool) -> Self {
        self.published_only = published_only;
        self
    }

    pub fn sort(mut self, sort_by: Option<String>, sort_type: Option<String>) -> Self {
        self.sort_by = sort_by.filter(|s| !s.trim().is_empty());
        self.sort_type = sort_type.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }

    pub fn build(self) -> Result<VideoQuery, QueryError> {
        let sort = match (self.sort_by, self.sort_type) {
            (None, None) => (SortField::CreatedAt, SortDirection::Desc),
            (None, Some(_)) => return Err(QueryError::DirectionWithoutField),
            (Some(field), direction) => {
                let field = SortField::parse(field.trim())
                    .ok_or_else(|| QueryError::SortField(field.clone()))?;
                let direction = match direction {
                    Some(raw) => SortDirection::parse(raw.trim())
                        .ok_or(QueryError::SortDirection(raw))?,
                    None => SortDirection::Desc,
                };
                (field, direction)
            }
        };

        Ok(VideoQuery {
            owner: self.owner,
            search: self.search,
            published_only: self.published_only,
            sort,
            page: self.page,
        })
    }
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`
/// pattern, then wrap it for a substring match.
pub(crate) fn like_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_is_newest_first() {
        let q = VideoQuery::builder().build().unwrap();
        assert_eq!(q.sort(), (SortField::CreatedAt, SortDirection::Desc));
        assert!(q.search().is_none());
    }

    #[test]
    fn explicit_sort_is_validated() {
        let q = VideoQuery::builder()
            .sort(Some("views".into()), Some("asc".into()))
            .build()
            .unwrap();
        assert_eq!(q.sort(), (SortField::Views, SortDirection::Asc));

        let err = VideoQuery::builder()
            .sort(Some("password".into()), None)
            .build()
            .unwrap_err();
        assert_eq!(err, QueryError::SortField("password".into()));

        let err = VideoQuery::builder()
            .sort(Some("title".into()), Some("sideways".into()))
            .build()
            .unwrap_err();
        assert_eq!(err, QueryError::SortDirection("sideways".into()));

        assert_eq!(
            VideoQuery::builder().sort(None, Some("asc".into())).build(),
            Err(QueryError::DirectionWithoutField)
        );
    }

    #[test]
    fn blank_search_is_dropped() {
        let q = VideoQuery::builder().search(Some("   ".into())).build().unwrap();
        assert!(q.search().is_none());
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
