//! File metadata store, §4.B. Grounded on
//! `original_source/storage/database/storageRepository.go`: same operation
//! set, ported from GORM to raw `sqlx` queries against the shared
//! `file_entries` table.

use dfs_types::{Error, models::FileEntry};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct FileRepository {
    pool: SqlitePool,
}

impl FileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        FileRepository { pool }
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS file_entries (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                unique_name   TEXT NOT NULL UNIQUE,
                display_name  TEXT NOT NULL,
                owner_id      INTEGER NOT NULL,
                creation_date TEXT NOT NULL,
                UNIQUE (owner_id, display_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Idempotent on `(owner_id, name)`: a retried `CreateFile` for a file
    /// the caller already created returns the existing row's id rather than
    /// erroring, since AMQP's at-least-once delivery means handlers must
    /// tolerate replays.
    pub async fn create_file(&self, unique_name: &str, display_name: &str, owner_id: i64) -> Result<i64, Error> {
        if let Some(existing) = self.get_owned_file_by_name(display_name, owner_id).await? {
            return Ok(existing.id);
        }

        let now = chrono::Utc::now();
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO file_entries (unique_name, display_name, owner_id, creation_date) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(unique_name)
        .bind(display_name)
        .bind(owner_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn delete_file(&self, unique_name: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM file_entries WHERE unique_name = ?")
            .bind(unique_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_file_by_unique_name(&self, unique_name: &str) -> Result<Option<FileEntry>, Error> {
        let row = sqlx::query_as::<_, FileEntry>("SELECT * FROM file_entries WHERE unique_name = ?")
            .bind(unique_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_file_by_id(&self, id: i64) -> Result<Option<FileEntry>, Error> {
        let row = sqlx::query_as::<_, FileEntry>("SELECT * FROM file_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_owned_file_by_unique_name(
        &self,
        unique_name: &str,
        owner_id: i64,
    ) -> Result<Option<FileEntry>, Error> {
        let row = self.get_file_by_unique_name(unique_name).await?;
        Ok(row.filter(|f| f.owner_id == owner_id))
    }

    pub async fn get_owned_file_by_id(&self, id: i64, owner_id: i64) -> Result<Option<FileEntry>, Error> {
        let row = self.get_file_by_id(id).await?;
        Ok(row.filter(|f| f.owner_id == owner_id))
    }

    async fn get_owned_file_by_name(&self, display_name: &str, owner_id: i64) -> Result<Option<FileEntry>, Error> {
        let row = sqlx::query_as::<_, FileEntry>(
            "SELECT * FROM file_entries WHERE display_name = ? AND owner_id = ?",
        )
        .bind(display_name)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_owned_files(&self, owner_id: i64) -> Result<Vec<FileEntry>, Error> {
        let rows = sqlx::query_as::<_, FileEntry>("SELECT * FROM file_entries WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pool() -> SqlitePool {
        SqlitePool::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_is_idempotent_on_owner_and_name() {
        let repo = FileRepository::new(pool().await);
        repo.migrate().await.unwrap();

        let id1 = repo.create_file("unique-a", "notes.txt", 1).await.unwrap();
        let id2 = repo.create_file("unique-b", "notes.txt", 1).await.unwrap();
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn ownership_filters_cross_owner_access() {
        let repo = FileRepository::new(pool().await);
        repo.migrate().await.unwrap();

        let id = repo.create_file("unique-a", "notes.txt", 1).await.unwrap();
        assert!(repo.get_owned_file_by_id(id, 1).await.unwrap().is_some());
        assert!(repo.get_owned_file_by_id(id, 2).await.unwrap().is_none());
    }
}
