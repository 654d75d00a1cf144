use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use murmur_db::Database;
use murmur_types::error::CoreError;
use murmur_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;
use crate::{engagement, messaging};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh socket may dawdle before sending `join`.
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection: wait for the `join` command,
/// register presence, then relay events both ways until either side drops.
pub async fn handle_connection(
    socket: WebSocket,
    db: Arc<Database>,
    dispatcher: Dispatcher,
    presence_interval: Duration,
) {
    let (mut sender, mut receiver) = socket.split();

    let user_id = match wait_for_join(&mut receiver).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to join, closing");
            return;
        }
    };

    // Unknown ids never make it into the registry
    let profile = match db.get_user(&user_id.to_string()) {
        Ok(Some(row)) => row,
        Ok(None) => {
            warn!("join from unknown user {}, closing", user_id);
            return;
        }
        Err(e) => {
            warn!("user lookup failed for {}: {}", user_id, e);
            return;
        }
    };
    let username = profile.username.clone();

    // Registering pushes the current peer set to this connection too, so the
    // client sees who is already here without asking.
    let (tx, mut user_rx) = mpsc::unbounded_channel();
    let conn_id = dispatcher
        .register(
            user_id,
            profile.username,
            profile.profile_pic_url,
            tx.clone(),
        )
        .await;

    info!("{} ({}) joined the gateway", username, user_id);

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward targeted events -> client, with heartbeat and the periodic
    // presence reconciliation emit (the event-driven pushes make it mostly
    // redundant, but a peer that missed one still converges within the bound).
    let dispatcher_send = dispatcher.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut presence_tick = tokio::time::interval(presence_interval);
        presence_tick.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = user_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = presence_tick.tick() => {
                    let users = dispatcher_send.peers_of(user_id).await;
                    let event = GatewayEvent::ConnectedUsers { users };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let username_recv = username.clone();
    let db_recv = db.clone();
    let dispatcher_recv = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&db_recv, &dispatcher_recv, &username_recv, &tx, cmd)
                            .await;
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            username_recv,
                            e,
                            truncate_frame(&text, 200)
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Cleanup is unconditional: a drop mid-operation never leaves a stale
    // handle behind.
    dispatcher.unregister(user_id, conn_id).await;
    info!("{} ({}) left the gateway", username, user_id);
}

/// Cap a frame for logging without splitting a multi-byte character.
fn truncate_frame(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

async fn wait_for_join(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
) -> Option<Uuid> {
    let timeout = tokio::time::timeout(JOIN_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Join { user_id }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    return Some(user_id);
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}

/// Acks go to the issuing connection only; fan-out to other parties happens
/// inside the ops. Failed commands produce no ack, just a log line.
async fn handle_command(
    db: &Database,
    dispatcher: &Dispatcher,
    username: &str,
    reply: &mpsc::UnboundedSender<GatewayEvent>,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::Join { .. } => {} // Already handled

        GatewayCommand::LikePost {
            post_id,
            user_id,
            like,
        } => {
            let result = if like {
                engagement::like_post(db, dispatcher, post_id, user_id).await
            } else {
                engagement::unlike_post(db, dispatcher, post_id, user_id).await
            };
            match result {
                Ok(()) => {
                    let _ = reply.send(GatewayEvent::PostLiked);
                }
                Err(e) => warn!("{} likePost {} failed: {}", username, post_id, e),
            }
        }

        GatewayCommand::SendNewMsg {
            user_id,
            msg_send_to_user_id,
            msg,
        } => {
            match messaging::send_message(db, dispatcher, user_id, msg_send_to_user_id, &msg)
                .await
            {
                Ok(new_msg) => {
                    let _ = reply.send(GatewayEvent::MsgSent { new_msg });
                }
                Err(e) => warn!("{} sendNewMsg failed: {}", username, e),
            }
        }

        GatewayCommand::SendMsgFromNotification {
            user_id,
            msg_send_to_user_id,
            msg,
        } => {
            match messaging::send_message(db, dispatcher, user_id, msg_send_to_user_id, &msg)
                .await
            {
                Ok(_) => {
                    let _ = reply.send(GatewayEvent::MsgSentFromNotification);
                }
                Err(e) => warn!("{} sendMsgFromNotification failed: {}", username, e),
            }
        }

        GatewayCommand::DeleteMsg {
            user_id,
            messages_with,
            message_id,
        } => match messaging::delete_message(db, user_id, messages_with, message_id) {
            Ok(()) => {
                let _ = reply.send(GatewayEvent::MsgDeleted);
            }
            Err(e) => warn!("{} deleteMsg {} failed: {}", username, message_id, e),
        },

        GatewayCommand::LoadMessages {
            user_id,
            messages_with,
        } => match messaging::load_messages(db, user_id, messages_with) {
            Ok(chat) => {
                let _ = reply.send(GatewayEvent::MessagesLoaded { chat });
            }
            Err(CoreError::NotFound(_)) => {
                let _ = reply.send(GatewayEvent::NoChatFound);
            }
            Err(e) => warn!("{} loadMessages failed: {}", username, e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_frames_pass_through_unchanged() {
        assert_eq!(truncate_frame("hello", 200), "hello");
    }

    #[test]
    fn oversized_frame_is_capped_at_the_limit() {
        let frame = "x".repeat(300);
        assert_eq!(truncate_frame(&frame, 200).len(), 200);
    }

    #[test]
    fn multi_byte_character_straddling_the_limit_is_dropped_whole() {
        // 199 ASCII bytes then a 3-byte char spanning indices 199..202
        let frame = format!("{}€ tail", "a".repeat(199));
        let capped = truncate_frame(&frame, 200);
        assert_eq!(capped, "a".repeat(199));
    }
}
