use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::Account;

// -- JWT Claims --

/// JWT claims shared by the REST middleware (verification) and the auth
/// handlers (issuance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

// Auth and message bodies keep every field optional so that a missing field
// is reported as invalid input by the handler instead of a JSON rejection.

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub token: String,
    pub user: RegisteredUser,
}

/// The identifier may arrive as `username`, `email`, or both.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: Account,
}

// -- Users --

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

// -- Messages --

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: Option<Uuid>,
    pub content: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EditMessageRequest {
    pub content: Option<String>,
}

/// Paging for message listing. Values that are not integers fall back to the
/// defaults; negative ones become 0 and are clamped by the service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MessagePage {
    #[serde(default = "default_page", deserialize_with = "page_or_default")]
    pub page: u32,
    #[serde(default = "default_limit", deserialize_with = "limit_or_default")]
    pub limit: u32,
}

impl Default for MessagePage {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

fn page_or_default<'de, D: Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
    Ok(lenient_u32(&String::deserialize(de)?).unwrap_or_else(default_page))
}

fn limit_or_default<'de, D: Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
    Ok(lenient_u32(&String::deserialize(de)?).unwrap_or_else(default_limit))
}

fn lenient_u32(raw: &str) -> Option<u32> {
    let n: i64 = raw.trim().parse().ok()?;
    Some(n.clamp(0, i64::from(u32::MAX)) as u32)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAck {
    pub message: String,
    pub id: Uuid,
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
