//! Request/response DTOs for the HTTP front doors and RPC wire bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::password::password_policy;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterDto {
    #[validate(length(min = 6, max = 32))]
    pub name: String,
    #[validate(email, length(min = 6, max = 48))]
    pub email: String,
    #[validate(length(min = 12, max = 48), custom(function = "password_policy"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginDto {
    #[validate(email, length(min = 6, max = 48))]
    pub email: String,
    #[validate(length(min = 12, max = 48))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub verified: bool,
    pub home_directory: String,
    pub crypt_key: String,
}

impl From<crate::models::User> for UserDto {
    fn from(u: crate::models::User) -> Self {
        UserDto {
            id: u.id,
            name: u.name,
            email: u.email,
            verified: u.verified,
            home_directory: u.home_directory,
            crypt_key: u.crypt_key,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDto {
    pub id: i64,
    pub unique_name: String,
    pub name: String,
    pub owner_id: i64,
}

impl From<crate::models::FileEntry> for FileDto {
    fn from(f: crate::models::FileEntry) -> Self {
        FileDto {
            id: f.id,
            unique_name: f.unique_name,
            name: f.display_name,
            owner_id: f.owner_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareDto {
    pub file_id: i64,
    pub shared_to_id: i64,
    pub shared_by_id: i64,
    pub expiration_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnshareDto {
    pub file_id: i64,
    pub shared_to_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SharedFileDto {
    pub unique_name: String,
    pub name: String,
    pub owner: String,
    pub shared_by: String,
    pub available_to: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SharedForDto {
    pub unique_name: String,
    pub name: String,
    pub shared_for: Vec<String>,
    pub available_to: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnedFileRequestDto {
    pub file_id: i64,
    pub owner_id: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateShareSpaceDto {
    #[validate(length(min = 1, max = 64))]
    pub share_space_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareSpaceMemberDto {
    pub share_space_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareSpaceDto {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
}

impl From<crate::models::ShareSpace> for ShareSpaceDto {
    fn from(s: crate::models::ShareSpace) -> Self {
        ShareSpaceDto {
            id: s.id,
            name: s.name,
            owner_id: s.owner_id,
        }
    }
}
