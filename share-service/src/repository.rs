//! `ShareGrant` persistence over a composite `(file_id, shared_for_id)`
//! key, §4.F. Grounded on
//! `original_source/share/database/shareRepository.go`'s
//! Create/Delete/GetSharedFor/GetSharedByUser methods, ported from GORM's
//! composite-primary-key struct to an explicit `sqlx` schema.

use dfs_types::Result;
use dfs_types::models::ShareGrant;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct ShareRepository {
    pool: SqlitePool,
}

impl ShareRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShareRepository { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS share_grants (
                file_id INTEGER NOT NULL,
                shared_for_id INTEGER NOT NULL,
                shared_by_id INTEGER NOT NULL,
                expiration_time TEXT NOT NULL,
                PRIMARY KEY (file_id, shared_for_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn create(&self, grant: &ShareGrant) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO share_grants (file_id, shared_for_id, shared_by_id, expiration_time) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(grant.file_id)
        .bind(grant.shared_for_id)
        .bind(grant.shared_by_id)
        .bind(grant.expiration_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, file_id: i64, shared_for_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM share_grants WHERE file_id = ? AND shared_for_id = ?")
            .bind(file_id)
            .bind(shared_for_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get(&self, file_id: i64, shared_for_id: i64) -> Result<Option<ShareGrant>> {
        let grant = sqlx::query_as::<_, ShareGrant>("SELECT * FROM share_grants WHERE file_id = ? AND shared_for_id = ?")
            .bind(file_id)
            .bind(shared_for_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(grant)
    }

    pub async fn shared_with_me(&self, shared_for_id: i64) -> Result<Vec<ShareGrant>> {
        let grants = sqlx::query_as::<_, ShareGrant>("SELECT * FROM share_grants WHERE shared_for_id = ?")
            .bind(shared_for_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(grants)
    }

    pub async fn shared_by_me(&self, shared_by_id: i64) -> Result<Vec<ShareGrant>> {
        let grants = sqlx::query_as::<_, ShareGrant>("SELECT * FROM share_grants WHERE shared_by_id = ?")
            .bind(shared_by_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(grants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn repo() -> ShareRepository {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let repo = ShareRepository::new(pool);
        repo.migrate().await.unwrap();
        repo
    }

    fn grant(file_id: i64, shared_for_id: i64, shared_by_id: i64) -> ShareGrant {
        ShareGrant {
            file_id,
            shared_for_id,
            shared_by_id,
            expiration_time: Utc::now() + chrono::Duration::days(1),
        }
    }

    #[tokio::test]
    async fn create_then_get_by_composite_key() {
        let repo = repo().await;
        repo.create(&grant(1, 2, 3)).await.unwrap();

        assert!(repo.get(1, 2).await.unwrap().is_some());
        assert!(repo.get(1, 99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_only_matching_entry() {
        let repo = repo().await;
        repo.create(&grant(1, 2, 3)).await.unwrap();
        repo.create(&grant(1, 4, 3)).await.unwrap();

        repo.delete(1, 2).await.unwrap();

        assert!(repo.get(1, 2).await.unwrap().is_none());
        assert!(repo.get(1, 4).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn lists_partition_by_direction() {
        let repo = repo().await;
        repo.create(&grant(1, 2, 3)).await.unwrap();
        repo.create(&grant(5, 2, 3)).await.unwrap();
        repo.create(&grant(9, 7, 2)).await.unwrap();

        assert_eq!(repo.shared_with_me(2).await.unwrap().len(), 2);
        assert_eq!(repo.shared_by_me(3).await.unwrap().len(), 2);
    }
}
