//! User and VerificationCode persistence, §4.E. Grounded on
//! `original_source/auth/database/{userRepository.go,verificationRepository.go}`,
//! adapted from GORM's struct-tag CRUD to raw `sqlx` queries the way
//! `storage-node::repository` does for `FileEntry`.

use dfs_types::models::{User, VerificationCode};
use dfs_types::{Error, Result};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash BLOB NOT NULL,
                verified INTEGER NOT NULL DEFAULT 0,
                home_directory TEXT NOT NULL,
                crypt_key TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn create(&self, name: &str, email: &str, password_hash: &[u8], home_directory: &str, crypt_key: &str) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (name, email, password_hash, verified, home_directory, crypt_key) \
             VALUES (?, ?, ?, 0, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(home_directory)
        .bind(crypt_key)
        .fetch_one(&self.pool)
        .await
        .map_err(map_conflict)?;
        Ok(id)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn mark_verified(&self, email: &str) -> Result<()> {
        sqlx::query("UPDATE users SET verified = 1 WHERE email = ?")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_by_email(&self, email: &str) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE email = ?")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct VerificationRepository {
    pool: SqlitePool,
}

impl VerificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        VerificationRepository { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS verification_codes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                code TEXT NOT NULL UNIQUE,
                expires_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn create(&self, email: &str, code: &str, expires_at: chrono::DateTime<chrono::Utc>) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO verification_codes (email, code, expires_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(email)
        .bind(code)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Option<VerificationCode>> {
        let row = sqlx::query_as::<_, VerificationCode>("SELECT * FROM verification_codes WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM verification_codes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_by_email(&self, email: &str) -> Result<()> {
        sqlx::query("DELETE FROM verification_codes WHERE email = ?")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn map_conflict(err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::Conflict("this email address is already taken".into()),
        _ => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_then_lookup_by_email_and_id() {
        let repo = UserRepository::new(pool().await);
        repo.migrate().await.unwrap();

        let id = repo.create("Alice Liddell", "alice@example.test", b"hash", "alice@example.test", "key").await.unwrap();

        let by_email = repo.get_by_email("alice@example.test").await.unwrap().unwrap();
        assert_eq!(by_email.id, id);
        assert!(!by_email.verified);

        let by_id = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "alice@example.test");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let repo = UserRepository::new(pool().await);
        repo.migrate().await.unwrap();
        repo.create("Alice", "alice@example.test", b"hash", "alice@example.test", "key").await.unwrap();

        let err = repo.create("Alice Again", "alice@example.test", b"hash", "alice@example.test", "key").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn mark_verified_then_delete_removes_row() {
        let user_repo = UserRepository::new(pool().await);
        user_repo.migrate().await.unwrap();
        user_repo.create("Bob", "bob@example.test", b"hash", "bob@example.test", "key").await.unwrap();

        user_repo.mark_verified("bob@example.test").await.unwrap();
        assert!(user_repo.get_by_email("bob@example.test").await.unwrap().unwrap().verified);

        user_repo.delete_by_email("bob@example.test").await.unwrap();
        assert!(user_repo.get_by_email("bob@example.test").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn verification_code_lifecycle() {
        let repo = VerificationRepository::new(pool().await);
        repo.migrate().await.unwrap();

        let expires = chrono::Utc::now() + chrono::Duration::hours(1);
        let id = repo.create("carol@example.test", "abc123", expires).await.unwrap();

        let found = repo.get_by_code("abc123").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.email, "carol@example.test");

        repo.delete(id).await.unwrap();
        assert!(repo.get_by_code("abc123").await.unwrap().is_none());
    }
}
