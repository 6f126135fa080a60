//! Row → API model conversion. A row that fails to parse is corrupt data and
//! surfaces as an internal error.

use chrono::{DateTime, Utc};
use courier_db::models::{MessageRow, UserRow, UserSummaryRow};
use courier_db::parse_timestamp;
use courier_types::models::{Account, Message, UserProfile, UserSummary};
use tracing::error;
use uuid::Uuid;

use crate::error::ApiError;

fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    raw.parse().map_err(|e| {
        error!("Corrupt {} '{}': {}", what, raw, e);
        ApiError::Internal(format!("corrupt {}", what))
    })
}

fn parse_time(raw: &str, what: &str) -> Result<DateTime<Utc>, ApiError> {
    parse_timestamp(raw).ok_or_else(|| {
        error!("Corrupt {} '{}'", what, raw);
        ApiError::Internal(format!("corrupt {}", what))
    })
}

pub(crate) fn message_from_row(row: MessageRow) -> Result<Message, ApiError> {
    Ok(Message {
        id: parse_id(&row.id, "message id")?,
        sender_id: parse_id(&row.sender_id, "sender_id")?,
        receiver_id: parse_id(&row.receiver_id, "receiver_id")?,
        created_at: parse_time(&row.created_at, "created_at")?,
        updated_at: parse_time(&row.updated_at, "updated_at")?,
        is_edited: row.is_edited,
        content: row.content,
    })
}

pub(crate) fn account_from_row(row: UserRow) -> Result<Account, ApiError> {
    Ok(Account {
        id: parse_id(&row.id, "user id")?,
        created_at: parse_time(&row.created_at, "created_at")?,
        updated_at: parse_time(&row.updated_at, "updated_at")?,
        username: row.username,
        email: row.email,
        display_name: row.display_name,
        bio: row.bio,
        profile_picture: row.profile_picture,
    })
}

pub(crate) fn profile_from_row(row: UserRow) -> Result<UserProfile, ApiError> {
    Ok(UserProfile {
        id: parse_id(&row.id, "user id")?,
        username: row.username,
        display_name: row.display_name,
        bio: row.bio,
        profile_picture: row.profile_picture,
    })
}

pub(crate) fn summary_from_row(row: UserSummaryRow) -> Result<UserSummary, ApiError> {
    Ok(UserSummary {
        id: parse_id(&row.id, "user id")?,
        username: row.username,
        display_name: row.display_name,
        profile_picture: row.profile_picture,
    })
}
