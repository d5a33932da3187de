//! `chatsync` terminal client.
//!
//! Joins one room and mirrors it on stdout. Each input line is sent as a
//! message; lines starting with `/` are commands:
//!
//! ```text
//! /older                 load the next older history page
//! /read                  send read receipts for every loaded message
//! /who                   list online users
//! /upload <path> [text]  upload a file with an optional caption
//! /quit                  leave the room
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use chatsync_client::{init_tracing, ClientConfig, SessionEvent, SyncSession};
use chatsync_shared::constants::APP_NAME;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ClientConfig::from_env();
    info!(
        server = %config.server_url,
        room = %config.room,
        user = %config.username,
        "Starting {APP_NAME} v{}",
        env!("CARGO_PKG_VERSION")
    );

    let (session, mut events) = SyncSession::from_config(config);
    let session = Arc::new(session);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            render(&event);
        }
    });

    session.start().await?;
    if let Err(e) = session.load_older_page().await {
        warn!(error = %e, "Initial history load failed");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !handle_line(&session, &line).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    session.stop().await?;
    Ok(())
}

/// Act on one input line. Returns `false` when the user asked to quit.
async fn handle_line(session: &SyncSession, line: &str) -> bool {
    let line = line.trim();
    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let result = match command {
        "" => Ok(()),
        "/quit" => return false,
        "/older" => session.load_older_page().await.map(|outcome| {
            println!("* history: {outcome:?}");
        }),
        "/read" => session.mark_visible_as_read().await.map(|sent| {
            println!("* sent {sent} read receipt(s)");
        }),
        "/who" => session.online_users().map(|online| {
            println!("* online: {}", online.join(", "));
        }),
        "/upload" => {
            let (path, text) = rest.split_once(' ').unwrap_or((rest, ""));
            if path.is_empty() {
                println!("* usage: /upload <path> [text]");
                Ok(())
            } else {
                session
                    .send_attachment(Path::new(path), text.trim())
                    .await
                    .map(|_| ())
            }
        }
        _ => {
            if let Err(e) = session.send_typing().await {
                warn!(error = %e, "Typing notification failed");
            }
            session.send_message(line).await.map(|sent| {
                if !sent {
                    println!("* not connected, message dropped");
                }
            })
        }
    };

    if let Err(e) = result {
        warn!(command = %command, error = %e, "Command failed");
    }
    true
}

fn render(event: &SessionEvent) {
    match event {
        SessionEvent::StateChanged(state) => println!("* session {state}"),
        SessionEvent::MessageAppended { message, from_self } => {
            let marker = if *from_self { ">" } else { " " };
            let time = message.timestamp.format("%H:%M");
            match message.attachment_url {
                Some(ref url) => println!(
                    "{marker}[{time}] {}: {} ({url})",
                    message.username, message.content
                ),
                None => println!("{marker}[{time}] {}: {}", message.username, message.content),
            }
        }
        SessionEvent::HistoryPrepended { page, messages } => {
            println!("* page {page}: {} older message(s)", messages.len());
            for message in messages {
                println!(
                    " [{}] {}: {}",
                    message.timestamp.format("%m-%d %H:%M"),
                    message.username,
                    message.content
                );
            }
        }
        SessionEvent::HistoryExhausted => println!("* beginning of history"),
        SessionEvent::Typing { username } => {
            println!("* {} is typing...", username.as_deref().unwrap_or("someone"));
        }
        SessionEvent::ReadReceipt {
            message_id,
            username,
        } => println!("* {username} read #{message_id}"),
        SessionEvent::PresenceChanged { online } => {
            println!("* online: {}", online.join(", "));
        }
        SessionEvent::ConnectionLost { reason } => println!("* connection lost: {reason}"),
    }
}
