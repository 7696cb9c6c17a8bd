use uuid::Uuid;

use crate::error::DomainError;

/// Largest row offset or limit a store accepts (a signed 64-bit SQL bigint).
pub const MAX_ROWS: u64 = i64::MAX as u64;

/// A page of results. `skip` is 1-based and counts pages, not rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Page {
    skip: u64,
    limit: u64,
}

impl Page {
    pub fn new(skip: u64, limit: u64) -> Result<Self, DomainError> {
        if skip < 1 {
            return Err(DomainError::Validation("skip must be at least 1".to_string()));
        }
        if limit < 1 {
            return Err(DomainError::Validation("limit must be at least 1".to_string()));
        }
        let offset = (skip - 1)
            .checked_mul(limit)
            .filter(|offset| *offset <= MAX_ROWS && limit <= MAX_ROWS);
        if offset.is_none() {
            return Err(DomainError::Validation("page is out of range".to_string()));
        }
        Ok(Self { skip, limit })
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Row offset for the store: `(skip - 1) * limit`. Cannot overflow since `new`
    /// rejects pages past [`MAX_ROWS`].
    pub fn offset(&self) -> u64 {
        (self.skip - 1) * self.limit
    }
}

/// The three ways posts can be listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostQuery {
    All(Page),
    Search { term: String, page: Page },
    ByAuthor { author_id: Uuid, page: Page },
}

impl PostQuery {
    pub fn page(&self) -> Page {
        match self {
            PostQuery::All(page) => *page,
            PostQuery::Search { page, .. } => *page,
            PostQuery::ByAuthor { page, .. } => *page,
        }
    }
}
