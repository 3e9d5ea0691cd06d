//! The CRUD surface shared by the editable per-user tables.

use crate::db::errors::Result;

/// Create, read, update and delete over one table, restricted to the rows of a single owner.
///
/// Implementors take the owning user's id at construction and put it in every statement. An id
/// that belongs to another user therefore behaves like an id that does not exist: `get_by_id`
/// returns `None`, `delete` returns `false` and `update` fails with
/// [`DbError::NotFound`](crate::db::errors::DbError::NotFound).
///
/// [`Clients`](super::Clients) and [`CustomBenchmarks`](super::CustomBenchmarks) implement it.
/// Analyses are never edited after confirmation, and users and settings are keyed by the user
/// itself, so those repositories only have inherent methods.
#[async_trait::async_trait]
pub trait Repository {
    type CreateRequest;
    type UpdateRequest;
    type Response;
    type Id: Send + Sync;

    /// Paging and search shared by `list` and `count`
    type Filter: Send + Sync;

    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// One page of the owner's rows, in the table's display order
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Rows matching the filter's search, ignoring its paging
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64>;

    /// Whether a row was removed
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
