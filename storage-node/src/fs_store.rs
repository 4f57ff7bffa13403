//! Filesystem layout, path safety and the encrypt/decrypt pipeline, §4.B.
//!
//! `resolve_path`'s relative-path + no-`..` rejection is grounded on the
//! teacher's `LocalStore::resolve_path`
//! (`blob_stores/local/src/lib.rs`); the additional symlink-resolves-under-root
//! check follows `original_source/storage/services/fileService.go`'s
//! `RemoveFileFromDisk` (`filepath.EvalSymlinks`), which the spec promotes
//! from a delete-only check to every path used on this node.

use std::path::{Path, PathBuf};

use dfs_crypto::{decode_and_decrypt, decode_key, encrypt_and_encode};
use dfs_types::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cleans and joins `path` under the root, then requires that the
    /// symlink-resolved result still lives under the root. Non-existent
    /// paths (writes of new files) are resolved via their parent directory
    /// instead, since `canonicalize` requires the target to exist.
    fn resolve_path(&self, path: &str) -> Result<PathBuf, Error> {
        if path.contains("..") {
            return Err(Error::PermissionDenied(format!(
                "path '{path}' contains a parent-directory segment"
            )));
        }

        let cleaned = clean_relative(path);
        let joined = self.root.join(&cleaned);

        let root_canonical = self
            .root
            .canonicalize()
            .map_err(|e| Error::StorageIo(format!("cannot canonicalize storage root: {e}")))?;

        let check_dir = joined.parent().unwrap_or(&self.root);
        let check_dir_canonical = if check_dir.exists() {
            check_dir
                .canonicalize()
                .map_err(|e| Error::StorageIo(format!("cannot canonicalize path: {e}")))?
        } else {
            root_canonical.clone()
        };

        if !check_dir_canonical.starts_with(&root_canonical) {
            return Err(Error::PermissionDenied(format!(
                "path '{path}' escapes the storage root"
            )));
        }

        if joined.exists() {
            let resolved = joined
                .canonicalize()
                .map_err(|e| Error::StorageIo(format!("cannot canonicalize path: {e}")))?;
            if !resolved.starts_with(&root_canonical) {
                return Err(Error::PermissionDenied(format!(
                    "path '{path}' escapes the storage root"
                )));
            }
        }

        Ok(joined)
    }

    /// Creates `{root}/{name}` with mode 0755, §4.B.
    pub async fn create_home_directory(&self, name: &str) -> Result<(), Error> {
        let path = self.resolve_path(name)?;
        tokio::fs::create_dir(&path).await?;
        set_dir_mode(&path).await;
        Ok(())
    }

    pub async fn create_missing_dirs(&self, file_path: &str) -> Result<(), Error> {
        let resolved = self.resolve_path(file_path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
            set_dir_mode(parent).await;
        }
        Ok(())
    }

    /// Encrypt-and-save pipeline: fresh IV, AES-CFB, base64-frame, write
    /// mode 0644.
    pub async fn encrypt_and_save(
        &self,
        file_path: &str,
        plaintext: &[u8],
        key_base64: &str,
    ) -> Result<(), Error> {
        let key = decode_key(key_base64)?;
        let encoded = encrypt_and_encode(plaintext, &key);
        let path = self.resolve_path(file_path)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await?;
        file.write_all(&encoded).await?;
        set_file_mode(&path).await;
        Ok(())
    }

    /// Writes pre-encoded bytes as-is, used by `SyncStoredFiles` to restore
    /// another node's on-disk frames verbatim.
    pub async fn write_raw(&self, file_path: &str, encoded: &[u8]) -> Result<(), Error> {
        let path = self.resolve_path(file_path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, encoded).await?;
        set_file_mode(&path).await;
        Ok(())
    }

    /// Decrypt-and-read pipeline: read → base64 decode → split iv → AES-CFB
    /// decrypt.
    pub async fn decrypt_and_read(&self, file_path: &str, key_base64: &str) -> Result<Vec<u8>, Error> {
        let key = decode_key(key_base64)?;
        let path = self.resolve_path(file_path)?;
        let encoded = tokio::fs::read(&path).await?;
        decode_and_decrypt(&encoded, &key)
    }

    pub async fn remove(&self, file_path: &str) -> Result<(), Error> {
        let path = self.resolve_path(file_path)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    /// Dumps every regular file under the root as `relative path -> encoded
    /// bytes`, for `GetStoredFiles`.
    pub async fn dump_all(&self) -> Result<Vec<(String, Vec<u8>)>, Error> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || walk_dir(&root))
            .await
            .map_err(|e| Error::StorageIo(format!("walk task panicked: {e}")))?
    }
}

fn clean_relative(path: &str) -> PathBuf {
    Path::new(path)
        .components()
        .filter(|c| matches!(c, std::path::Component::Normal(_)))
        .collect()
}

#[cfg(unix)]
async fn set_dir_mode(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await;
}

#[cfg(not(unix))]
async fn set_dir_mode(_path: &Path) {}

#[cfg(unix)]
async fn set_file_mode(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).await;
}

#[cfg(not(unix))]
async fn set_file_mode(_path: &Path) {}

fn walk_dir(root: &Path) -> Result<Vec<(String, Vec<u8>)>, Error> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let relative = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                let content = std::fs::read(&path)?;
                out.push((relative, content));
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_dot_dot_segments() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let err = store
            .encrypt_and_save("../escape", b"x", &dfs_crypto::generate_key_base64())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let key = dfs_crypto::generate_key_base64();

        store
            .encrypt_and_save("home/file.bin", b"hello storage", &key)
            .await
            .unwrap();

        let read_back = store.decrypt_and_read("home/file.bin", &key).await.unwrap();
        assert_eq!(read_back, b"hello storage");
    }

    #[tokio::test]
    async fn dump_all_finds_written_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let key = dfs_crypto::generate_key_base64();
        store.encrypt_and_save("a/b.bin", b"one", &key).await.unwrap();
        store.encrypt_and_save("c.bin", b"two", &key).await.unwrap();

        let mut dumped = store.dump_all().await.unwrap();
        dumped.sort();
        assert_eq!(dumped.len(), 2);
    }
}
