//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Page size when `limit` is not given.
pub const DEFAULT_LIST_LIMIT: i64 = 20;

/// Largest page size a client may request.
pub const MAX_LIST_LIMIT: i64 = 100;

/// Generic pagination parameters (`?limit=&offset=`).
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationParams {
    /// Limit clamped to `1..=MAX_LIST_LIMIT`.
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT) as usize
    }

    /// Offset floored at zero.
    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0).max(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(limit: Option<i64>, offset: Option<i64>) -> PaginationParams {
        PaginationParams { limit, offset }
    }

    #[test]
    fn limit_uses_default_when_none() {
        assert_eq!(params(None, None).limit(), 20);
    }

    #[test]
    fn limit_respects_max_and_floor() {
        assert_eq!(params(Some(500), None).limit(), 100);
        assert_eq!(params(Some(0), None).limit(), 1);
        assert_eq!(params(Some(-3), None).limit(), 1);
    }

    #[test]
    fn offset_floors_at_zero() {
        assert_eq!(params(None, Some(-10)).offset(), 0);
        assert_eq!(params(None, Some(7)).offset(), 7);
    }
}
