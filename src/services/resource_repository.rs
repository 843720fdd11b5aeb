//! Local persistence for audio resources.
//!
//! Every function runs on a caller-provided connection, which lets the
//! orchestrator group several calls inside one transaction (pass the
//! transaction's connection) or run a standalone read (pass a pooled one).

use crate::models::resource::Resource;
use chrono::Utc;
use sqlx::{QueryBuilder, SqliteConnection, sqlite::Sqlite};
use std::collections::BTreeSet;

pub struct ResourceRepository;

impl ResourceRepository {
    /// Insert a resource holding `data` and return its assigned id.
    pub async fn save(conn: &mut SqliteConnection, data: &[u8]) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO resources (data, created_at) VALUES (?, ?) RETURNING id",
        )
        .bind(data)
        .bind(Utc::now())
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> sqlx::Result<Option<Resource>> {
        sqlx::query_as::<_, Resource>("SELECT id, data, created_at FROM resources WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Return the members of `candidates` that exist, in ascending order.
    ///
    /// One `IN (...)` query regardless of how many candidates there are.
    pub async fn filter_existing_ids(
        conn: &mut SqliteConnection,
        candidates: &BTreeSet<i64>,
    ) -> sqlx::Result<Vec<i64>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id FROM resources WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in candidates {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY id ASC");

        let existing: Vec<i64> = builder.build_query_scalar().fetch_all(conn).await?;
        Ok(existing)
    }

    /// Delete one resource. Returns whether a row was removed.
    pub async fn delete_by_id(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM resources WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
