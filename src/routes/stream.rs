//! Server-sent events relay for one match's chat.
//!
//! Each connection gets a tokio task that polls the database and writes
//! encoded frames into a bounded channel; the response body drains that
//! channel. When the client goes away actix drops the body, the receiver
//! closes and the task stops on its next select.

use actix_web::http::header;
use actix_web::web::Bytes;
use actix_web::{web, HttpRequest, HttpResponse};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use super::matches::hide_read_receipts;
use super::AppState;
use crate::core::sse::{keep_alive, parse_last_event_id, SseFrame};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::models::{Message, StreamQuery};
use crate::services::PostgresClient;

/// Frames buffered per connection before the relay waits on the client
const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy)]
struct RelayConfig {
    poll_interval: Duration,
    heartbeat: Duration,
    batch_size: i64,
    /// Strip `read_at` from this member's own messages
    hide_read_for: Option<Uuid>,
}

/// Build the `messages` frame for a batch and the cursor it advances to.
/// Returns `None` for an empty batch.
fn messages_frame(mut batch: Vec<Message>, hide_read_for: Option<Uuid>) -> Option<(i64, SseFrame)> {
    let cursor = batch.last()?.id;
    if let Some(viewer) = hide_read_for {
        hide_read_receipts(&mut batch, viewer);
    }

    match serde_json::to_string(&batch) {
        Ok(data) => Some((cursor, SseFrame::new("messages", data).with_id(cursor))),
        Err(e) => {
            tracing::error!("Failed to encode message batch: {}", e);
            None
        }
    }
}

fn closed_frame(match_id: Uuid) -> SseFrame {
    SseFrame::new("closed", serde_json::json!({ "matchId": match_id }).to_string())
}

/// GET /api/matches/{match_id}/stream
///
/// Resumes after `Last-Event-ID` when the browser reconnects, else after
/// `?after=`, else only new messages are delivered.
pub async fn stream_messages(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    query: web::Query<StreamQuery>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let match_id = path.into_inner();
    state.load_active_user(auth.id).await?;
    state.participant_match(match_id, auth.id).await?;

    let resume_from = req
        .headers()
        .get("Last-Event-ID")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_last_event_id)
        .or(query.after.map(|after| after.max(0)));

    let cursor = match resume_from {
        Some(cursor) => cursor,
        None => state.db.latest_message_id(match_id).await?,
    };

    let chat = &state.settings.chat;
    let features = state.features_for(auth.id).await?;
    let config = RelayConfig {
        poll_interval: Duration::from_millis(chat.poll_interval_ms.max(50)),
        heartbeat: Duration::from_secs(chat.heartbeat_secs.max(1)),
        batch_size: chat.batch_size.max(1) as i64,
        hide_read_for: (!features.read_receipts).then_some(auth.id),
    };

    let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
    tokio::spawn(relay(state.db.clone(), match_id, cursor, config, tx));

    tracing::info!("Chat stream opened for {} on {} at cursor {}", auth.id, match_id, cursor);

    let body = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<_, Infallible>(chunk), rx))
    });

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        // Compression would buffer frames
        .insert_header((header::CONTENT_ENCODING, "identity"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(body))
}

async fn relay(
    db: Arc<PostgresClient>,
    match_id: Uuid,
    mut cursor: i64,
    config: RelayConfig,
    tx: mpsc::Sender<Bytes>,
) {
    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + config.heartbeat,
        config.heartbeat,
    );
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Tell the client where it starts so a reconnect can resume from here
    let ready = SseFrame::new("ready", serde_json::json!({ "cursor": cursor }).to_string()).with_id(cursor);
    if tx.send(Bytes::from(ready.encode())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            _ = tx.closed() => break,

            _ = poll.tick() => {
                match db.messages_after(match_id, cursor, config.batch_size).await {
                    Ok(batch) => {
                        if let Some((next, frame)) = messages_frame(batch, config.hide_read_for) {
                            cursor = next;
                            if tx.send(Bytes::from(frame.encode())).await.is_err() {
                                break;
                            }
                        }
                    }
                    // Retried on the next tick
                    Err(e) => tracing::warn!("Chat poll failed for {}: {}", match_id, e),
                }
            }

            _ = heartbeat.tick() => {
                if tx.send(Bytes::from_static(keep_alive().as_bytes())).await.is_err() {
                    break;
                }
                match db.is_match_active(match_id).await {
                    Ok(true) => {}
                    Ok(false) => {
                        let _ = tx.send(Bytes::from(closed_frame(match_id).encode())).await;
                        break;
                    }
                    Err(e) => tracing::warn!("Chat liveness check failed for {}: {}", match_id, e),
                }
            }
        }
    }

    tracing::debug!("Chat relay for {} stopped at cursor {}", match_id, cursor);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(id: i64, sender_id: Uuid) -> Message {
        Message {
            id,
            match_id: Uuid::nil(),
            sender_id,
            body: format!("message {}", id),
            flagged: false,
            created_at: Utc::now(),
            read_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_empty_batch_has_no_frame() {
        assert!(messages_frame(Vec::new(), None).is_none());
    }

    #[test]
    fn test_frame_advances_cursor_to_last_id() {
        let sender = Uuid::new_v4();
        let (cursor, frame) = messages_frame(vec![message(7, sender), message(9, sender)], None).unwrap();

        assert_eq!(cursor, 9);
        let encoded = frame.encode();
        assert!(encoded.starts_with("event: messages\nid: 9\ndata: "));
        assert!(encoded.ends_with("\n\n"));

        let data = encoded
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap();
        let decoded: Vec<Message> = serde_json::from_str(data).unwrap();
        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].read_at.is_some());
    }

    #[test]
    fn test_frame_hides_own_read_receipts() {
        let me = Uuid::new_v4();
        let (_, frame) = messages_frame(vec![message(1, me)], Some(me)).unwrap();
        assert!(frame.data.contains("\"readAt\":null"));
    }

    #[test]
    fn test_closed_frame() {
        let encoded = closed_frame(Uuid::nil()).encode();
        assert!(encoded.starts_with("event: closed\n"));
        assert!(encoded.contains("00000000-0000-0000-0000-000000000000"));
    }
}
