//! Polling synchronization of the conversation list and the open chat.
//!
//! The server has no push channel, so [`SyncLoop`] refreshes on a fixed
//! interval and can be woken early through its [`SyncHandle`] (opening a
//! chat, sending a message). Every refresh is reconciled against the
//! current [`ViewState`] and published on a `watch` channel only when
//! something changed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use courier_types::api::{DeleteAck, MessagePage};
use courier_types::models::{Conversation, Message, UserSummary};

use crate::api::ApiClient;
use crate::error::{ClientError, Result};

pub const POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Messages fetched for the open chat on each refresh.
pub const CHAT_PAGE_SIZE: u32 = 50;

/// Everything a chat UI renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub conversations: Vec<Conversation>,
    pub open_chat: Option<UserSummary>,
    /// Messages exchanged with `open_chat`, oldest first.
    pub messages: Vec<Message>,
    /// Set while the server is unreachable, cleared by the next good refresh.
    pub last_error: Option<String>,
}

impl ViewState {
    fn open_chat_id(&self) -> Option<Uuid> {
        self.open_chat.as_ref().map(|user| user.id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub conversations_changed: bool,
    pub messages_changed: bool,
}

impl SyncOutcome {
    pub fn changed(&self) -> bool {
        self.conversations_changed || self.messages_changed
    }
}

struct Shared {
    view: watch::Sender<ViewState>,
    wake: Notify,
    cancel: CancellationToken,
}

pub struct SyncLoop {
    client: ApiClient,
    interval: Duration,
    shared: Arc<Shared>,
}

/// Control side of a running [`SyncLoop`]. Cloneable.
#[derive(Clone)]
pub struct SyncHandle {
    client: ApiClient,
    shared: Arc<Shared>,
}

impl SyncLoop {
    /// `client` must already hold a token.
    pub fn new(client: ApiClient, interval: Duration) -> (Self, SyncHandle) {
        let (view, _) = watch::channel(ViewState::default());
        let shared = Arc::new(Shared {
            view,
            wake: Notify::new(),
            cancel: CancellationToken::new(),
        });
        let handle = SyncHandle {
            client: client.clone(),
            shared: shared.clone(),
        };
        (
            Self {
                client,
                interval,
                shared,
            },
            handle,
        )
    }

    /// Runs until [`SyncHandle::stop`] is called. An in-flight refresh is
    /// abandoned on stop.
    pub async fn run(self) {
        let mut consecutive_failures = 0u32;
        info!("sync loop started (interval {:?})", self.interval);

        loop {
            let result = tokio::select! {
                _ = self.shared.cancel.cancelled() => break,
                result = self.refresh() => result,
            };

            match result {
                Ok(outcome) => {
                    if consecutive_failures > 0 {
                        info!("sync recovered after {} failure(s)", consecutive_failures);
                    }
                    consecutive_failures = 0;
                    if outcome.changed() {
                        debug!(?outcome, "view updated");
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    let retry = backoff(self.interval, consecutive_failures);
                    warn!(
                        "sync failed (attempt {}, next retry in {:?}): {}",
                        consecutive_failures, retry, e
                    );
                    let message = e.to_string();
                    self.shared.view.send_if_modified(|view| {
                        if view.last_error.as_deref() == Some(message.as_str()) {
                            return false;
                        }
                        view.last_error = Some(message);
                        true
                    });
                }
            }

            tokio::select! {
                _ = self.shared.cancel.cancelled() => break,
                _ = self.shared.wake.notified() => {}
                _ = tokio::time::sleep(backoff(self.interval, consecutive_failures)) => {}
            }
        }

        info!("sync loop stopped");
    }

    /// One poll cycle: fetch the conversation list and the open chat, then
    /// publish whatever differs from the current view.
    pub async fn refresh(&self) -> Result<SyncOutcome> {
        let peer = self.shared.view.borrow().open_chat_id();

        let conversations = self.client.conversations().await?;
        let page = match peer {
            Some(id) => {
                let page = MessagePage {
                    page: 1,
                    limit: CHAT_PAGE_SIZE,
                };
                Some((id, self.client.messages(id, page).await?))
            }
            None => None,
        };

        let mut outcome = SyncOutcome::default();
        self.shared.view.send_if_modified(|view| {
            let cleared = view.last_error.take().is_some();
            outcome.conversations_changed = reconcile(&mut view.conversations, conversations);
            if let Some((id, newest_first)) = page {
                // The user may have switched chats while we were fetching.
                if view.open_chat_id() == Some(id) {
                    outcome.messages_changed =
                        reconcile(&mut view.messages, display_order(newest_first));
                }
            }
            cleared || outcome.changed()
        });

        Ok(outcome)
    }
}

impl SyncHandle {
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.shared.view.subscribe()
    }

    pub fn snapshot(&self) -> ViewState {
        self.shared.view.borrow().clone()
    }

    /// Switch the open chat and refresh immediately.
    pub fn open_chat(&self, user: UserSummary) {
        self.shared.view.send_if_modified(|view| {
            if view.open_chat.as_ref() == Some(&user) {
                return false;
            }
            if view.open_chat_id() != Some(user.id) {
                view.messages.clear();
            }
            view.open_chat = Some(user);
            true
        });
        self.refresh_now();
    }

    pub fn close_chat(&self) {
        self.shared.view.send_if_modified(|view| {
            let was_open = view.open_chat.take().is_some();
            view.messages.clear();
            was_open
        });
    }

    /// Send `content` to the open chat. The message is shown right away and
    /// the loop is woken to pick up the server's view.
    pub async fn send(&self, content: &str) -> Result<Message> {
        let peer = self
            .shared
            .view
            .borrow()
            .open_chat_id()
            .ok_or(ClientError::NoOpenChat)?;

        let message = self.client.send_message(peer, content).await?;
        self.shared.view.send_if_modified(|view| {
            if view.open_chat_id() != Some(peer) || view.messages.iter().any(|m| m.id == message.id)
            {
                return false;
            }
            view.messages.push(message.clone());
            true
        });
        self.refresh_now();
        Ok(message)
    }

    pub async fn edit(&self, message_id: Uuid, content: &str) -> Result<Message> {
        let message = self.client.edit_message(message_id, content).await?;
        self.refresh_now();
        Ok(message)
    }

    pub async fn delete(&self, message_id: Uuid) -> Result<DeleteAck> {
        let ack = self.client.delete_message(message_id).await?;
        self.refresh_now();
        Ok(ack)
    }

    /// Wake the loop without waiting for the interval.
    pub fn refresh_now(&self) {
        self.shared.wake.notify_one();
    }

    pub fn stop(&self) {
        self.shared.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

/// Replace `current` with `incoming` if they differ. Returns whether it did.
pub fn reconcile<T: PartialEq>(current: &mut Vec<T>, incoming: Vec<T>) -> bool {
    if *current == incoming {
        return false;
    }
    *current = incoming;
    true
}

/// The server pages newest first; chats render oldest first.
fn display_order(mut newest_first: Vec<Message>) -> Vec<Message> {
    newest_first.reverse();
    newest_first
}

/// Wait before the next poll: the interval, doubled per consecutive failure,
/// capped at [`MAX_BACKOFF`].
pub fn backoff(interval: Duration, consecutive_failures: u32) -> Duration {
    if consecutive_failures == 0 {
        return interval;
    }
    interval
        .saturating_mul(2u32.saturating_pow(consecutive_failures))
        .min(MAX_BACKOFF)
        .max(interval)
}
