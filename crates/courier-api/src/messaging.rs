use std::collections::HashMap;

use courier_db::Database;
use courier_types::api::DeleteAck;
use courier_types::models::{Conversation, Message};
use tracing::{info, warn};
use uuid::Uuid;

use crate::conversations;
use crate::convert::{message_from_row, summary_from_row};
use crate::error::ApiError;
use crate::guard;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;
/// Upper bound on page size; larger requests are clamped.
pub const MAX_LIMIT: u32 = 100;
pub const MAX_CONTENT_CHARS: usize = 4000;

/// Send/list/edit/delete over the message and identity stores.
///
/// Synchronous: handlers call it from `spawn_blocking`.
pub struct MessagingService<'a> {
    db: &'a Database,
}

impl<'a> MessagingService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn send_message(
        &self,
        sender_id: Uuid,
        receiver_id: Option<Uuid>,
        content: Option<&str>,
    ) -> Result<Message, ApiError> {
        let (Some(receiver_id), Some(content)) = (receiver_id, content) else {
            return Err(ApiError::InvalidInput("No content or receiver".into()));
        };
        let content = validate_content(content)?;

        if sender_id == receiver_id {
            return Err(ApiError::SelfMessage);
        }
        if !self.db.user_exists(&receiver_id.to_string())? {
            return Err(ApiError::NotFound("Receiver not found".into()));
        }

        let id = Uuid::new_v4();
        let row = self.db.insert_message(
            &id.to_string(),
            &sender_id.to_string(),
            &receiver_id.to_string(),
            content,
        )?;

        info!("Message {} sent from {} to {}", id, sender_id, receiver_id);
        message_from_row(row)
    }

    /// One page of the exchange between two users, newest first. Pages past
    /// the end are empty.
    pub fn list_messages(
        &self,
        current_user_id: Uuid,
        other_user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Message>, ApiError> {
        if !guard::can_view(current_user_id, other_user_id) {
            return Ok(vec![]);
        }

        let (limit, offset) = page_window(page, limit);
        self.db
            .list_messages_between(
                &current_user_id.to_string(),
                &other_user_id.to_string(),
                limit,
                offset,
            )?
            .into_iter()
            .map(message_from_row)
            .collect()
    }

    pub fn edit_message(
        &self,
        actor_id: Uuid,
        message_id: Uuid,
        new_content: Option<&str>,
    ) -> Result<Message, ApiError> {
        let id = message_id.to_string();
        let existing = self.db.get_message(&id)?.map(message_from_row).transpose()?;
        guard::authorize_modify(actor_id, existing)?;

        let content = validate_content(new_content.unwrap_or_default())?;

        // Ownership is re-asserted in the UPDATE predicate; no row means the
        // message disappeared since the check.
        let row = self
            .db
            .update_message_content(&id, &actor_id.to_string(), content)?
            .ok_or_else(|| ApiError::NotFound("Message not found".into()))?;

        info!("Message {} edited by {}", message_id, actor_id);
        message_from_row(row)
    }

    pub fn delete_message(&self, actor_id: Uuid, message_id: Uuid) -> Result<DeleteAck, ApiError> {
        let id = message_id.to_string();
        let existing = self.db.get_message(&id)?.map(message_from_row).transpose()?;
        guard::authorize_modify(actor_id, existing)?;

        if !self.db.delete_message(&id, &actor_id.to_string())? {
            return Err(ApiError::NotFound("Message not found".into()));
        }

        info!("Message {} deleted by {}", message_id, actor_id);
        Ok(DeleteAck {
            message: "Message deleted".into(),
            id: message_id,
        })
    }

    pub fn list_conversations(&self, current_user_id: Uuid) -> Result<Vec<Conversation>, ApiError> {
        let messages = self
            .db
            .latest_message_per_counterpart(&current_user_id.to_string())?
            .into_iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let latest = conversations::aggregate(current_user_id, messages);

        let counterpart_ids: Vec<String> = latest
            .iter()
            .map(|m| m.counterpart(current_user_id).to_string())
            .collect();
        let mut users = HashMap::with_capacity(counterpart_ids.len());
        for row in self.db.get_user_summaries(&counterpart_ids)? {
            let summary = summary_from_row(row)?;
            users.insert(summary.id, summary);
        }
        if users.len() != counterpart_ids.len() {
            warn!(
                "{} of {} counterparts for {} could not be resolved",
                counterpart_ids.len() - users.len(),
                counterpart_ids.len(),
                current_user_id
            );
        }

        Ok(conversations::build_conversations(current_user_id, latest, &users))
    }
}

/// Clamp paging input and turn it into `(limit, offset)`.
///
/// `page` and `limit` below 1 are raised to 1; `limit` is capped at
/// [`MAX_LIMIT`].
pub fn page_window(page: u32, limit: u32) -> (u32, u64) {
    let page = page.max(1);
    let limit = limit.clamp(1, MAX_LIMIT);
    let offset = u64::from(page - 1) * u64::from(limit);
    (limit, offset)
}

fn validate_content(content: &str) -> Result<&str, ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::InvalidInput("Message content cannot be empty".into()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "Message content exceeds {} characters",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(content)
}
