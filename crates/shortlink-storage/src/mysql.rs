use async_trait::async_trait;
use jiff::Timestamp;
use shortlink_core::repository::{ReadRepository, Repository, Result};
use shortlink_core::{Link, ShortCode, StorageError};
use sqlx::{MySqlPool, Row};
use tracing::{debug, trace};

/// MySQL implementation of the repository contract.
///
/// One row per short code in `url_mapping`. Deletes are hard deletes: the
/// allocator never hands the same identifier out twice, so a freed code is
/// never reissued either way. `created_at` is stored as Unix microseconds.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates `url_mapping` if it does not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(include_str!("../ddl/mysql/url_mapping.sql"))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM url_mapping WHERE hash = ? LIMIT 1")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.is_some())
    }
}

fn parse_created_at(micros: i64) -> Result<Timestamp> {
    Timestamp::from_microsecond(micros).map_err(|e| {
        StorageError::InvalidData(format!("invalid created_at timestamp '{micros}': {e}"))
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadRepository for MySqlRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<Link>> {
        trace!(code = %code, "loading link from MySQL");

        let row = sqlx::query(
            r#"
            SELECT original_url, owner_id, created_at
            FROM url_mapping
            WHERE hash = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
        let owner_id: String = row.try_get("owner_id").map_err(map_sqlx_error)?;
        let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;

        Ok(Some(Link {
            hash: code.clone(),
            original_url,
            owner_id,
            created_at: parse_created_at(created_at)?,
        }))
    }
}

#[async_trait]
impl Repository for MySqlRepository {
    async fn insert(&self, link: &Link) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO url_mapping (hash, original_url, owner_id, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(link.hash.as_str())
        .bind(link.original_url.as_str())
        .bind(link.owner_id.as_str())
        .bind(link.created_at.as_microsecond())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(code = %link.hash, "link inserted");
                Ok(())
            }
            Err(err) if is_unique_violation(&err) => {
                Err(StorageError::Conflict(link.hash.to_string()))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn update_url(&self, code: &ShortCode, original_url: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE url_mapping SET original_url = ? WHERE hash = ?")
            .bind(original_url)
            .bind(code.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // MySQL reports changed rows, so rewriting the same URL affects zero rows.
        self.exists(code).await
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        let result = sqlx::query("DELETE FROM url_mapping WHERE hash = ?")
            .bind(code.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
