//! Ownership and participant checks for message operations.

use courier_types::models::Message;
use uuid::Uuid;

use crate::error::ApiError;

/// Only the sender may edit or delete a message.
pub fn can_modify(actor_id: Uuid, message: &Message) -> bool {
    message.sender_id == actor_id
}

/// Any two distinct users may exchange and read messages; there are no
/// block lists.
pub fn can_view(actor_id: Uuid, counterpart_id: Uuid) -> bool {
    actor_id != counterpart_id
}

/// Gate for edit/delete. Existence is checked before ownership so that a
/// missing id is always `NotFound`, never `Forbidden`.
pub fn authorize_modify(actor_id: Uuid, message: Option<Message>) -> Result<Message, ApiError> {
    let message = message.ok_or_else(|| ApiError::NotFound("Message not found".into()))?;
    if !can_modify(actor_id, &message) {
        return Err(ApiError::Forbidden(
            "Only the sender can modify this message".into(),
        ));
    }
    Ok(message)
}
