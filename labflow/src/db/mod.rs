//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries, scoped to the owning user)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │  (row level security on every owned table)
//! └─────────────┘
//! ```
//!
//! # Ownership
//!
//! Every row except `users` belongs to a user, and ownership is enforced twice:
//!
//! 1. Owner-scoped repositories are constructed with the owning [`UserId`] and put it in the
//!    `WHERE` clause of every statement.
//! 2. Row level security policies compare `user_id` with the transaction-local setting
//!    `app.current_user_id`, which [`begin_scoped`] sets before any statement runs.
//!
//! ```ignore
//! let mut tx = db::begin_scoped(&state.db, current_user.id).await?;
//! let client = Clients::new(&mut tx, current_user.id).get_by_id(client_id).await?;
//! tx.commit().await?;
//! ```
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/` directory.
//! The [`crate::migrator`] function provides access to the migrator:
//!
//! ```ignore
//! labflow::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;

use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use crate::types::{UserId, abbrev_uuid};
use errors::Result;

/// Begin a transaction scoped to `user_id` for row level security.
///
/// The setting is transaction-local, so it cannot leak to the next user of the pooled
/// connection.
#[instrument(skip(pool), fields(user_id = %abbrev_uuid(&user_id)), err)]
pub async fn begin_scoped(pool: &PgPool, user_id: UserId) -> Result<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT set_config('app.current_user_id', $1, true)")
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::utils::create_test_user;
    use uuid::Uuid;

    #[sqlx::test]
    async fn test_begin_scoped_sets_transaction_local_user(pool: PgPool) {
        let user_id = Uuid::new_v4();

        let mut tx = begin_scoped(&pool, user_id).await.unwrap();
        let current: String = sqlx::query_scalar("SELECT current_setting('app.current_user_id', true)")
            .fetch_one(&mut *tx)
            .await
            .unwrap();
        assert_eq!(current, user_id.to_string());
        tx.commit().await.unwrap();

        // Gone once the transaction ends
        let mut conn = pool.acquire().await.unwrap();
        let after: Option<String> = sqlx::query_scalar("SELECT NULLIF(current_setting('app.current_user_id', true), '')")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(after, None);
    }

    /// Role without ownership of the tables, so the policies actually apply to it.
    async fn create_app_role(pool: &PgPool) {
        sqlx::query(
            "DO $$ BEGIN CREATE ROLE labflow_rls_app NOLOGIN; EXCEPTION WHEN duplicate_object THEN NULL; END $$",
        )
        .execute(pool)
        .await
        .unwrap();
        sqlx::query("GRANT SELECT, INSERT, UPDATE, DELETE ON clients, analyses, custom_benchmarks, settings TO labflow_rls_app")
            .execute(pool)
            .await
            .unwrap();
    }

    async fn begin_as_app(pool: &PgPool, user_id: UserId) -> Transaction<'static, Postgres> {
        let mut tx = begin_scoped(pool, user_id).await.unwrap();
        sqlx::query("SET LOCAL ROLE labflow_rls_app").execute(&mut *tx).await.unwrap();
        tx
    }

    fn rls_violation(err: sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(e) => e.message().contains("row-level security"),
            _ => false,
        }
    }

    #[sqlx::test]
    async fn test_row_level_security_isolates_owners(pool: PgPool) {
        create_app_role(&pool).await;
        let alice = create_test_user(&pool, "alice@example.com").await;
        let bob = create_test_user(&pool, "bob@example.com").await;

        let alices_client = Uuid::new_v4();
        let mut tx = begin_as_app(&pool, alice.id).await;
        sqlx::query("INSERT INTO clients (id, user_id, name) VALUES ($1, $2, 'Jane Doe')")
            .bind(alices_client)
            .bind(alice.id)
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        // No WHERE clause: only the policy hides Alice's rows from Bob
        let mut tx = begin_as_app(&pool, bob.id).await;
        let visible: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients").fetch_one(&mut *tx).await.unwrap();
        assert_eq!(visible, 0);
        let settings_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings").fetch_one(&mut *tx).await.unwrap();
        assert_eq!(settings_rows, 1, "only Bob's own settings row");
        let renamed = sqlx::query("UPDATE clients SET name = 'Taken' WHERE id = $1")
            .bind(alices_client)
            .execute(&mut *tx)
            .await
            .unwrap();
        assert_eq!(renamed.rows_affected(), 0);
        tx.rollback().await.unwrap();

        // Writing a row on someone else's behalf fails the WITH CHECK clause
        let mut tx = begin_as_app(&pool, bob.id).await;
        let err = sqlx::query("INSERT INTO clients (id, user_id, name) VALUES ($1, $2, 'Forged')")
            .bind(Uuid::new_v4())
            .bind(alice.id)
            .execute(&mut *tx)
            .await
            .unwrap_err();
        assert!(rls_violation(err));
        drop(tx);

        // An analysis must point at one of the writer's own clients
        let mut tx = begin_as_app(&pool, bob.id).await;
        let err = sqlx::query("INSERT INTO analyses (id, user_id, client_id) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(bob.id)
            .bind(alices_client)
            .execute(&mut *tx)
            .await
            .unwrap_err();
        assert!(rls_violation(err));
        drop(tx);

        // Alice still sees her client, unchanged
        let mut tx = begin_as_app(&pool, alice.id).await;
        let name: String = sqlx::query_scalar("SELECT name FROM clients WHERE id = $1")
            .bind(alices_client)
            .fetch_one(&mut *tx)
            .await
            .unwrap();
        assert_eq!(name, "Jane Doe");
    }
}
