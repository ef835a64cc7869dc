use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::accounts::repo_types::User;

/// Request body for `POST /signup`. Missing fields decode as empty and are rejected later.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for `POST /login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body shared by delete, block and unblock.
/// `user_id` is the actor; `user_ids` is the target set.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUsersRequest {
    pub user_id: Option<i64>,
    pub user_ids: Option<Vec<i64>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub message: &'static str,
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: &'static str,
    pub user_id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Public row of `GET /users`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
    pub is_blocked: bool,
}

impl From<User> for UserSummary {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            last_seen: u.last_seen.map(|t| t.to_offset(time::UtcOffset::UTC)),
            is_blocked: u.is_blocked,
        }
    }
}
