//! `ShareSpace`/`ShareSpaceMember`/`ShareSpaceFile` persistence, §4.F.
//! Grounded on
//! `original_source/sharespace/database/shareSpaceRepository.go`, ported
//! from GORM's per-model tables to explicit `sqlx` DDL. Membership is
//! the composite `(share_space_id, user_id)` key the Go model expresses
//! via two `gorm:"primaryKey"` tags.

use chrono::Utc;
use dfs_types::Result;
use dfs_types::models::{ShareSpace, ShareSpaceFile, ShareSpaceMember, ShareSpaceRole};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct ShareSpaceRepository {
    pool: SqlitePool,
}

impl ShareSpaceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShareSpaceRepository { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS share_spaces (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                owner_id INTEGER NOT NULL,
                home_directory TEXT NOT NULL,
                crypt_key TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS share_space_members (
                share_space_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                role TEXT NOT NULL,
                PRIMARY KEY (share_space_id, user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS share_space_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                share_space_id INTEGER NOT NULL,
                unique_name TEXT NOT NULL,
                display_name TEXT NOT NULL,
                path TEXT NOT NULL,
                creation_date TEXT NOT NULL,
                owner_id INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create_share_space(&self, name: &str, owner_id: i64, home_directory: &str, crypt_key: &str) -> Result<i64> {
        let rec = sqlx::query("INSERT INTO share_spaces (name, owner_id, home_directory, crypt_key) VALUES (?, ?, ?, ?)")
            .bind(name)
            .bind(owner_id)
            .bind(home_directory)
            .bind(crypt_key)
            .execute(&self.pool)
            .await?;
        Ok(rec.last_insert_rowid())
    }

    /// Deletes the share space and its members/files in one transaction,
    /// mirroring the Go handler's own cascading delete (it has no DB-level
    /// `ON DELETE CASCADE`).
    pub async fn delete_entire_share_space(&self, share_space_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM share_space_files WHERE share_space_id = ?").bind(share_space_id).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM share_space_members WHERE share_space_id = ?").bind(share_space_id).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM share_spaces WHERE id = ?").bind(share_space_id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_share_space_by_id(&self, share_space_id: i64) -> Result<Option<ShareSpace>> {
        let ss = sqlx::query_as::<_, ShareSpace>("SELECT * FROM share_spaces WHERE id = ?")
            .bind(share_space_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ss)
    }

    pub async fn get_owned_share_space_by_id(&self, share_space_id: i64, owner_id: i64) -> Result<Option<ShareSpace>> {
        let ss = sqlx::query_as::<_, ShareSpace>("SELECT * FROM share_spaces WHERE id = ? AND owner_id = ?")
            .bind(share_space_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ss)
    }

    pub async fn get_user_share_spaces(&self, user_id: i64) -> Result<Vec<ShareSpace>> {
        let spaces = sqlx::query_as::<_, ShareSpace>(
            "SELECT s.* FROM share_spaces s \
             JOIN share_space_members m ON m.share_space_id = s.id \
             WHERE m.user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(spaces)
    }

    pub async fn add_user_to_share_space(&self, user_id: i64, share_space_id: i64, role: ShareSpaceRole) -> Result<()> {
        sqlx::query("INSERT INTO share_space_members (share_space_id, user_id, role) VALUES (?, ?, ?)")
            .bind(share_space_id)
            .bind(user_id)
            .bind(role)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_user_from_share_space(&self, user_id: i64, share_space_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM share_space_members WHERE share_space_id = ? AND user_id = ?")
            .bind(share_space_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_share_space_member(&self, user_id: i64, share_space_id: i64) -> Result<Option<ShareSpaceMember>> {
        let member = sqlx::query_as::<_, ShareSpaceMember>("SELECT * FROM share_space_members WHERE user_id = ? AND share_space_id = ?")
            .bind(user_id)
            .bind(share_space_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(member)
    }

    pub async fn get_share_space_members(&self, share_space_id: i64) -> Result<Vec<ShareSpaceMember>> {
        let members = sqlx::query_as::<_, ShareSpaceMember>("SELECT * FROM share_space_members WHERE share_space_id = ?")
            .bind(share_space_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(members)
    }

    /// Owner or Moderator may delete other members; a plain Member may not.
    pub async fn can_user_delete_members(&self, user_id: i64, share_space_id: i64) -> Result<bool> {
        let member = self.get_share_space_member(user_id, share_space_id).await?;
        Ok(matches!(member, Some(m) if m.role == ShareSpaceRole::Owner || m.role == ShareSpaceRole::Moderator))
    }

    pub async fn add_file_to_share_space(&self, share_space_id: i64, unique_name: &str, display_name: &str, path: &str, owner_id: i64) -> Result<i64> {
        let rec = sqlx::query(
            "INSERT INTO share_space_files (share_space_id, unique_name, display_name, path, creation_date, owner_id) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(share_space_id)
        .bind(unique_name)
        .bind(display_name)
        .bind(path)
        .bind(Utc::now())
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(rec.last_insert_rowid())
    }

    pub async fn delete_file_from_share_space(&self, share_space_id: i64, unique_name: &str) -> Result<()> {
        sqlx::query("DELETE FROM share_space_files WHERE share_space_id = ? AND unique_name = ?")
            .bind(share_space_id)
            .bind(unique_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_file_from_share_space(&self, share_space_id: i64, unique_name: &str) -> Result<Option<ShareSpaceFile>> {
        let file = sqlx::query_as::<_, ShareSpaceFile>("SELECT * FROM share_space_files WHERE share_space_id = ? AND unique_name = ?")
            .bind(share_space_id)
            .bind(unique_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    pub async fn get_files_from_share_space(&self, share_space_id: i64) -> Result<Vec<ShareSpaceFile>> {
        let files = sqlx::query_as::<_, ShareSpaceFile>("SELECT * FROM share_space_files WHERE share_space_id = ?")
            .bind(share_space_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn repo() -> ShareSpaceRepository {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let repo = ShareSpaceRepository::new(pool);
        repo.migrate().await.unwrap();
        repo
    }

    #[tokio::test]
    async fn create_then_fetch_by_id() {
        let repo = repo().await;
        let id = repo.create_share_space("team", 1, "alice@example.com_team", "key").await.unwrap();

        let ss = repo.get_share_space_by_id(id).await.unwrap().unwrap();
        assert_eq!(ss.owner_id, 1);
        assert_eq!(ss.name, "team");
    }

    #[tokio::test]
    async fn owned_lookup_rejects_non_owner() {
        let repo = repo().await;
        let id = repo.create_share_space("team", 1, "home", "key").await.unwrap();

        assert!(repo.get_owned_share_space_by_id(id, 1).await.unwrap().is_some());
        assert!(repo.get_owned_share_space_by_id(id, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn member_role_gates_deletion_rights() {
        let repo = repo().await;
        let id = repo.create_share_space("team", 1, "home", "key").await.unwrap();
        repo.add_user_to_share_space(1, id, ShareSpaceRole::Owner).await.unwrap();
        repo.add_user_to_share_space(2, id, ShareSpaceRole::Moderator).await.unwrap();
        repo.add_user_to_share_space(3, id, ShareSpaceRole::Member).await.unwrap();

        assert!(repo.can_user_delete_members(1, id).await.unwrap());
        assert!(repo.can_user_delete_members(2, id).await.unwrap());
        assert!(!repo.can_user_delete_members(3, id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_entire_share_space_removes_members_and_files() {
        let repo = repo().await;
        let id = repo.create_share_space("team", 1, "home", "key").await.unwrap();
        repo.add_user_to_share_space(1, id, ShareSpaceRole::Owner).await.unwrap();
        repo.add_file_to_share_space(id, "uniq", "report.pdf", "home/uniq", 1).await.unwrap();

        repo.delete_entire_share_space(id).await.unwrap();

        assert!(repo.get_share_space_by_id(id).await.unwrap().is_none());
        assert!(repo.get_share_space_members(id).await.unwrap().is_empty());
        assert!(repo.get_files_from_share_space(id).await.unwrap().is_empty());
    }
}
