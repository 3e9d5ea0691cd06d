//! Offset paging for the client, analysis and benchmark lists.
//!
//! Query structs flatten [`Pagination`] next to their own filters, so `skip` and `limit` arrive
//! as strings through `serde(flatten)`; they are parsed with `DisplayFromStr` for that reason.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_LIMIT: i64 = 10;

/// A practitioner's client list rarely runs past a few pages of this.
pub const MAX_LIMIT: i64 = 100;

/// `skip` / `limit` query parameters. Out-of-range values are clamped rather than rejected.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Rows to skip (default 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub skip: Option<i64>,

    /// Rows per page (default 10, at most 100)
    #[param(default = 10, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}

impl Pagination {
    /// `(skip, limit)` ready to bind into a repository filter.
    pub fn params(&self) -> (i64, i64) {
        let skip = self.skip.unwrap_or(0).max(0);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        (skip, limit)
    }
}

/// One page of a list endpoint plus what the UI needs to draw its pager.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    pub data: Vec<T>,
    /// Rows matching the filters across all pages
    pub total_count: i64,
    pub skip: i64,
    pub limit: i64,
    /// Whether rows remain after this page
    pub has_more: bool,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total_count: i64, skip: i64, limit: i64) -> Self {
        let has_more = skip + (data.len() as i64) < total_count;
        Self {
            data,
            total_count,
            skip,
            limit,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::clients::{ClientResponse, ListClientsQuery};

    #[test]
    fn test_out_of_range_values_are_clamped() {
        assert_eq!(Pagination::default().params(), (0, DEFAULT_LIMIT));

        let p = Pagination {
            skip: Some(-5),
            limit: Some(1000),
        };
        assert_eq!(p.params(), (0, MAX_LIMIT));

        let p = Pagination {
            skip: Some(20),
            limit: Some(0),
        };
        assert_eq!(p.params(), (20, 1));
    }

    #[test]
    fn test_flattened_into_client_list_query() {
        let query: ListClientsQuery = serde_urlencoded::from_str("search=doe&skip=10&limit=25").unwrap();
        assert_eq!(query.pagination.params(), (10, 25));
        assert_eq!(query.search.as_deref(), Some("doe"));

        let query: ListClientsQuery = serde_urlencoded::from_str("search=doe").unwrap();
        assert_eq!(query.pagination.params(), (0, DEFAULT_LIMIT));

        assert!(serde_urlencoded::from_str::<ListClientsQuery>("limit=lots").is_err());
    }

    #[test]
    fn test_has_more_tracks_remaining_rows() {
        let page = PaginatedResponse::<ClientResponse>::new(Vec::new(), 0, 0, 10);
        assert!(!page.has_more);

        let page = PaginatedResponse::<ClientResponse>::new(Vec::new(), 25, 10, 10);
        assert!(page.has_more);

        let page = PaginatedResponse::<ClientResponse>::new(Vec::new(), 25, 30, 10);
        assert!(!page.has_more);
    }
}
