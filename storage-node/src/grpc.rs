//! Node-to-node gRPC surface, §4.C. Grounded on
//! `original_source/storage/services/gRpcStorageServer.go`: same nine
//! methods, wired to [`crate::fs_store::FsStore`] and
//! [`crate::repository::FileRepository`] instead of the Go service's
//! `FileService`/`StorageRepository` pair.

use dfs_proto::storage_server::Storage;
use dfs_proto::{
    DeleteFileRequest, FileContent, FileEntry as ProtoFileEntry, FileUniqueName, GetFileByIdRequest, HomeDir,
    OwnedFileRequest, ReadFileRequest, SaveFileRequest, StorageResult, StoredFiles,
};
use tonic::{Request, Response, Status};

use crate::fs_store::FsStore;
use crate::repository::FileRepository;

pub struct StorageService {
    fs: FsStore,
    repo: FileRepository,
}

impl StorageService {
    pub fn new(fs: FsStore, repo: FileRepository) -> Self {
        StorageService { fs, repo }
    }
}

fn to_proto(entry: dfs_types::models::FileEntry) -> ProtoFileEntry {
    ProtoFileEntry {
        id: entry.id as u64,
        owner_id: entry.owner_id as u64,
        name: entry.display_name,
        unique_name: entry.unique_name,
        creation_date: Some(prost_types::Timestamp {
            seconds: entry.creation_date.timestamp(),
            nanos: entry.creation_date.timestamp_subsec_nanos() as i32,
        }),
    }
}

#[tonic::async_trait]
impl Storage for StorageService {
    async fn create_home_directory(
        &self,
        request: Request<HomeDir>,
    ) -> Result<Response<StorageResult>, Status> {
        let success = self.fs.create_home_directory(&request.into_inner().name).await.is_ok();
        Ok(Response::new(StorageResult { success }))
    }

    async fn get_owned_file(
        &self,
        request: Request<OwnedFileRequest>,
    ) -> Result<Response<ProtoFileEntry>, Status> {
        let req = request.into_inner();
        let entry = self
            .repo
            .get_owned_file_by_id(req.file_id as i64, req.owner_id as i64)
            .await
            .map_err(|e| Status::internal(e.to_string()))?
            .ok_or_else(|| Status::not_found("cannot get owned file"))?;
        Ok(Response::new(to_proto(entry)))
    }

    async fn get_file_by_id(
        &self,
        request: Request<GetFileByIdRequest>,
    ) -> Result<Response<ProtoFileEntry>, Status> {
        let req = request.into_inner();
        let entry = self
            .repo
            .get_file_by_id(req.file_id as i64)
            .await
            .map_err(|e| Status::internal(e.to_string()))?
            .ok_or_else(|| Status::not_found("cannot get file by id"))?;
        Ok(Response::new(to_proto(entry)))
    }

    async fn get_file_by_unique_name(
        &self,
        request: Request<FileUniqueName>,
    ) -> Result<Response<ProtoFileEntry>, Status> {
        let entry = self
            .repo
            .get_file_by_unique_name(&request.into_inner().name)
            .await
            .map_err(|e| Status::internal(e.to_string()))?
            .ok_or_else(|| Status::not_found("cannot get file by unique name"))?;
        Ok(Response::new(to_proto(entry)))
    }

    async fn save_file_on_disk(
        &self,
        request: Request<SaveFileRequest>,
    ) -> Result<Response<StorageResult>, Status> {
        let req = request.into_inner();
        let key_base64 = String::from_utf8_lossy(&req.encryption_key).to_string();
        let success = self
            .fs
            .encrypt_and_save(&req.save_path, &req.content, &key_base64)
            .await
            .is_ok();
        Ok(Response::new(StorageResult { success }))
    }

    async fn delete_file_from_disk(
        &self,
        request: Request<DeleteFileRequest>,
    ) -> Result<Response<StorageResult>, Status> {
        let success = self.fs.remove(&request.into_inner().file_path).await.is_ok();
        Ok(Response::new(StorageResult { success }))
    }

    async fn get_file_content_from_disk(
        &self,
        request: Request<ReadFileRequest>,
    ) -> Result<Response<FileContent>, Status> {
        let req = request.into_inner();
        let content = self
            .fs
            .decrypt_and_read(&req.read_path, &req.decryption_key)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;
        Ok(Response::new(FileContent { content }))
    }

    async fn get_stored_files(
        &self,
        _request: Request<()>,
    ) -> Result<Response<StoredFiles>, Status> {
        let dumped = self.fs.dump_all().await.map_err(|e| Status::internal(e.to_string()))?;
        let (paths, contents) = dumped.into_iter().unzip();
        Ok(Response::new(StoredFiles {
            files_path: paths,
            files_content: contents,
        }))
    }

    async fn sync_stored_files(
        &self,
        request: Request<StoredFiles>,
    ) -> Result<Response<StorageResult>, Status> {
        let req = request.into_inner();
        for (path, content) in req.files_path.iter().zip(req.files_content.iter()) {
            if self.fs.create_missing_dirs(path).await.is_err() {
                return Ok(Response::new(StorageResult { success: false }));
            }
            if self.fs.write_raw(path, content).await.is_err() {
                return Ok(Response::new(StorageResult { success: false }));
            }
        }
        Ok(Response::new(StorageResult { success: true }))
    }
}
