//! Terminal watcher: logs in, keeps the conversation list (and optionally
//! one chat) in sync and prints every change.
//!
//! COURIER_URL, COURIER_LOGIN and COURIER_PASSWORD are read from the
//! environment or `.env`; an optional first argument names the user whose
//! chat should be followed.

use anyhow::Context;
use tracing::info;

use courier_client::sync::POLL_INTERVAL;
use courier_client::{ApiClient, SyncLoop, ViewState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=info".into()),
        )
        .init();

    let url = std::env::var("COURIER_URL").unwrap_or_else(|_| "http://localhost:3000".into());
    let login = std::env::var("COURIER_LOGIN").context("COURIER_LOGIN is not set")?;
    let password = std::env::var("COURIER_PASSWORD").context("COURIER_PASSWORD is not set")?;

    let mut client = ApiClient::new(url);
    let me = client.login(&login, &password).await?.user;
    info!("logged in as {}", me.username);

    let (sync, handle) = SyncLoop::new(client.clone(), POLL_INTERVAL);

    if let Some(peer) = std::env::args().nth(1) {
        let found = client.search_users(&peer).await?;
        let user = found
            .into_iter()
            .find(|u| u.username == peer)
            .with_context(|| format!("no user named {}", peer))?;
        handle.open_chat(user);
    }

    let mut updates = handle.subscribe();
    let task = tokio::spawn(sync.run());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();
                print_view(&view);
            }
        }
    }

    handle.stop();
    task.await?;
    Ok(())
}

fn print_view(view: &ViewState) {
    if let Some(err) = &view.last_error {
        println!("! {}", err);
        return;
    }

    println!("-- conversations --");
    for conv in &view.conversations {
        println!(
            "{:<24} {}  {}",
            conv.user.label(),
            conv.last_message_time.format("%Y-%m-%d %H:%M"),
            conv.last_message
        );
    }

    if let Some(chat) = &view.open_chat {
        println!("-- chat with {} --", chat.label());
        for m in &view.messages {
            let who = if m.sender_id == chat.id { chat.label() } else { "me" };
            let edited = if m.is_edited { " (edited)" } else { "" };
            println!("{}: {}{}", who, m.content, edited);
        }
    }
}
