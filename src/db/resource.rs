//! Generic row access for the REST collections.
//!
//! Every collection exposed under `/api` is a table whose rows decode into a
//! [`Resource`]. Writable collections add a [`ResourceInput`] describing the
//! columns a client may set. Queries here are built from those descriptions,
//! so the per-table modules only declare types.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::query::QueryAs;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Sqlite};

use super::DbPool;
use crate::{Error, Result};

/// A table exposed as a REST collection.
pub trait Resource:
    for<'r> FromRow<'r, SqliteRow> + Serialize + Send + Sync + Unpin + 'static
{
    /// Table holding the rows.
    const TABLE: &'static str;
    /// Human readable singular name, e.g. `Region`.
    const NAME: &'static str;
    /// Text shown in OPTIONS metadata.
    const DESCRIPTION: &'static str = "";
}

/// A collection clients may create, update and delete rows in.
pub trait WriteResource: Resource {
    type Input: ResourceInput;
}

/// Client supplied values for a writable row.
pub trait ResourceInput: DeserializeOwned + Send + 'static {
    /// Writable columns, in the order [`ResourceInput::bind`] pushes values.
    const COLUMNS: &'static [&'static str];

    /// Field level checks that the schema cannot express.
    fn validate(&self) -> Result<()>;

    /// Bind one value per entry of [`ResourceInput::COLUMNS`].
    fn bind<'q, O>(
        self,
        query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    ) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>>;
}

/// Reject empty or whitespace-only required text.
pub fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} may not be blank", field)));
    }
    Ok(())
}

/// Count all rows of a collection.
pub async fn count_rows<R: Resource>(pool: &DbPool) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", R::TABLE);
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
    Ok(count)
}

/// List one page of rows ordered by id.
pub async fn list_rows<R: Resource>(pool: &DbPool, limit: i64, offset: i64) -> Result<Vec<R>> {
    let sql = format!("SELECT * FROM {} ORDER BY id LIMIT ? OFFSET ?", R::TABLE);
    sqlx::query_as::<_, R>(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(Error::Database)
}

/// Get a row by id; `None` when it does not exist.
pub async fn get_row<R: Resource>(pool: &DbPool, id: i64) -> Result<Option<R>> {
    let sql = format!("SELECT * FROM {} WHERE id = ?", R::TABLE);
    sqlx::query_as::<_, R>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Validate and insert a row, returning it as stored.
pub async fn insert_row<R: WriteResource>(pool: &DbPool, input: R::Input) -> Result<R> {
    input.validate()?;

    let columns = <R::Input as ResourceInput>::COLUMNS;
    let placeholders = vec!["?"; columns.len() + 2].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}, created, updated) VALUES ({}) RETURNING *",
        R::TABLE,
        columns.join(", "),
        placeholders
    );

    let now = Utc::now();
    input
        .bind(sqlx::query_as::<_, R>(&sql))
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::from_write(e, R::NAME))
}

/// Validate and replace the writable columns of a row.
///
/// Returns `None` when no row has the id.
pub async fn update_row<R: WriteResource>(
    pool: &DbPool,
    id: i64,
    input: R::Input,
) -> Result<Option<R>> {
    input.validate()?;

    let assignments = <R::Input as ResourceInput>::COLUMNS
        .iter()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {}, updated = ? WHERE id = ? RETURNING *",
        R::TABLE,
        assignments
    );

    input
        .bind(sqlx::query_as::<_, R>(&sql))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::from_write(e, R::NAME))
}

/// Delete a row; false when it did not exist.
pub async fn delete_row<R: Resource>(pool: &DbPool, id: i64) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE id = ?", R::TABLE);
    let result = sqlx::query(&sql).bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_pool, initialize_schema, Region, RegionInput};

    async fn setup_test_db() -> DbPool {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        pool
    }

    fn region(name: &str) -> RegionInput {
        RegionInput {
            region_name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_get_update_delete() {
        let pool = setup_test_db().await;

        let created: Region = insert_row::<Region>(&pool, region("Africa")).await.unwrap();
        assert_eq!(created.region_name, "Africa");

        let fetched = get_row::<Region>(&pool, created.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);

        let updated = update_row::<Region>(&pool, created.id, region("Asia"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.region_name, "Asia");
        assert!(updated.updated >= created.updated);

        assert!(delete_row::<Region>(&pool, created.id).await.unwrap());
        assert!(!delete_row::<Region>(&pool, created.id).await.unwrap());
        assert!(get_row::<Region>(&pool, created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_row_returns_none() {
        let pool = setup_test_db().await;
        let result = update_row::<Region>(&pool, 42, region("Europe")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_blank_text_rejected() {
        let pool = setup_test_db().await;
        let err = insert_row::<Region>(&pool, region("   ")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(count_rows::<Region>(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_pages_in_id_order() {
        let pool = setup_test_db().await;
        for name in ["A", "B", "C"] {
            insert_row::<Region>(&pool, region(name)).await.unwrap();
        }

        let first: Vec<Region> = list_rows(&pool, 2, 0).await.unwrap();
        let second: Vec<Region> = list_rows(&pool, 2, 2).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert!(first[0].id < first[1].id);
        assert_eq!(second[0].region_name, "C");
    }
}
