//! Database repository for clients.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::clients::{ClientCreateDBRequest, ClientDBResponse, ClientUpdateDBRequest},
};
use crate::types::{ClientId, Gender, UserId, abbrev_uuid};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgConnection, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

const CLIENT_COLUMNS: &str = "id, user_id, name, date_of_birth, gender, created_at, updated_at";

/// Filter for listing clients
#[derive(Debug, Clone)]
pub struct ClientFilter {
    pub skip: i64,
    pub limit: i64,
    pub search: Option<String>, // Case-insensitive substring search on name
}

impl ClientFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit, search: None }
    }

    pub fn with_search(mut self, search: String) -> Self {
        self.search = Some(search);
        self
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Client {
    pub id: ClientId,
    pub user_id: UserId,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Client> for ClientDBResponse {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            user_id: client.user_id,
            name: client.name,
            date_of_birth: client.date_of_birth,
            gender: client.gender,
            created_at: client.created_at,
            updated_at: client.updated_at,
        }
    }
}

/// Clients owned by one user.
pub struct Clients<'c> {
    db: &'c mut PgConnection,
    user_id: UserId,
}

/// Escape `LIKE` wildcards so the search term only ever matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_search(query: &mut QueryBuilder<'_, sqlx::Postgres>, search: &Option<String>) {
    if let Some(search) = search {
        query.push(" AND LOWER(name) LIKE ");
        query.push_bind(format!("%{}%", escape_like(&search.trim().to_lowercase())));
        query.push(" ESCAPE '\\'");
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Clients<'c> {
    type CreateRequest = ClientCreateDBRequest;
    type UpdateRequest = ClientUpdateDBRequest;
    type Response = ClientDBResponse;
    type Id = ClientId;
    type Filter = ClientFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&self.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (id, user_id, name, date_of_birth, gender)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(self.user_id)
        .bind(request.name.trim())
        .bind(request.date_of_birth)
        .bind(request.gender)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(ClientDBResponse::from(client))
    }

    #[instrument(skip(self), fields(client_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let client = sqlx::query_as::<_, Client>(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1 AND user_id = $2"))
            .bind(id)
            .bind(self.user_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(client.map(ClientDBResponse::from))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE user_id = "));
        query.push_bind(self.user_id);
        push_search(&mut query, &filter.search);

        query.push(" ORDER BY LOWER(name), id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let clients = query.build_query_as::<Client>().fetch_all(&mut *self.db).await?;

        Ok(clients.into_iter().map(ClientDBResponse::from).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM clients WHERE user_id = ");
        query.push_bind(self.user_id);
        push_search(&mut query, &filter.search);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;

        Ok(count)
    }

    /// Deleting a client cascades to its analyses
    #[instrument(skip(self), fields(client_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(self.user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(client_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let (set_dob, date_of_birth) = match request.date_of_birth {
            None => (false, None),
            Some(dob) => (true, dob),
        };
        let (set_gender, gender) = match request.gender {
            None => (false, None),
            Some(gender) => (true, gender),
        };

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients SET
                name = COALESCE($3, name),
                date_of_birth = CASE WHEN $4 THEN $5 ELSE date_of_birth END,
                gender = CASE WHEN $6 THEN $7 ELSE gender END,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(self.user_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(set_dob)
        .bind(date_of_birth)
        .bind(set_gender)
        .bind(gender)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(ClientDBResponse::from(client))
    }
}

impl<'c> Clients<'c> {
    pub fn new(db: &'c mut PgConnection, user_id: UserId) -> Self {
        Self { db, user_id }
    }

    /// Every client of the user, for scoring against an extracted patient.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&self.user_id)), err)]
    pub async fn list_all_for_matching(&mut self) -> Result<Vec<ClientDBResponse>> {
        let clients = sqlx::query_as::<_, Client>(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE user_id = $1 ORDER BY id"))
            .bind(self.user_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(clients.into_iter().map(ClientDBResponse::from).collect())
    }
}
