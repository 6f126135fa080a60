//! Conversation list: one row per counterpart, carrying the latest message.
//!
//! Kept free of storage so it can be exercised directly; the messaging
//! service feeds it the user's messages and a map of user cards.

use std::collections::HashMap;

use courier_types::models::{Conversation, Message, UserSummary};
use tracing::warn;
use uuid::Uuid;

/// Visible characters kept in a conversation preview.
pub const PREVIEW_CHARS: usize = 50;

/// Truncate `content` to [`PREVIEW_CHARS`] characters, appending "..." when
/// anything was cut.
pub fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Latest message per counterpart of `user_id`, newest first.
///
/// Messages not involving `user_id` are ignored. On equal timestamps the
/// message seen first wins, so callers that pass newest-first input (as the
/// store does) get the most recently inserted one.
pub fn aggregate(user_id: Uuid, messages: impl IntoIterator<Item = Message>) -> Vec<Message> {
    let mut slot: HashMap<Uuid, usize> = HashMap::new();
    let mut latest: Vec<Message> = Vec::new();

    for message in messages {
        if !message.involves(user_id) {
            continue;
        }
        let counterpart = message.counterpart(user_id);
        match slot.get(&counterpart) {
            Some(&idx) => {
                if message.created_at > latest[idx].created_at {
                    latest[idx] = message;
                }
            }
            None => {
                slot.insert(counterpart, latest.len());
                latest.push(message);
            }
        }
    }

    // Stable: equal timestamps keep first-seen order.
    latest.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    latest
}

/// Join aggregated messages with counterpart cards. Counterparts missing from
/// `users` are dropped.
pub fn build_conversations(
    user_id: Uuid,
    latest: Vec<Message>,
    users: &HashMap<Uuid, UserSummary>,
) -> Vec<Conversation> {
    latest
        .into_iter()
        .filter_map(|message| {
            let counterpart = message.counterpart(user_id);
            let Some(user) = users.get(&counterpart) else {
                warn!("Conversation counterpart {} not found, skipping", counterpart);
                return None;
            };
            Some(Conversation {
                user: user.clone(),
                last_message: preview(&message.content),
                last_message_time: message.created_at,
            })
        })
        .collect()
}
