use actix_web::{web, HttpResponse};
use std::time::Duration;
use uuid::Uuid;

use super::{stream, today, AppState};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::models::{CountResponse, MatchSummary, Message, MessagePage, MessagesQuery, SendMessageRequest};
use crate::services::CacheKey;

const MATCH_LIST_TTL: Duration = Duration::from_secs(30);
const DEFAULT_PAGE_SIZE: u16 = 50;
const MAX_PAGE_SIZE: u16 = 100;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/matches", web::get().to(list_matches))
        .route("/matches/{match_id}", web::delete().to(unmatch))
        .route("/matches/{match_id}/messages", web::get().to(list_messages))
        .route("/matches/{match_id}/messages", web::post().to(send_message))
        .route("/matches/{match_id}/read", web::post().to(mark_read))
        .route("/matches/{match_id}/stream", web::get().to(stream::stream_messages));
}

/// Without read receipts a member cannot see whether their own messages
/// were read
pub(crate) fn hide_read_receipts(messages: &mut [Message], viewer_id: Uuid) {
    for message in messages.iter_mut().filter(|m| m.sender_id == viewer_id) {
        message.read_at = None;
    }
}

/// GET /api/matches
async fn list_matches(state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    state.load_active_user(auth.id).await?;

    let db = state.db.clone();
    let user_id = auth.id;
    let summaries: Vec<MatchSummary> = state
        .cache
        .get_or_load(&CacheKey::matches(user_id), MATCH_LIST_TTL, || async move {
            let rows = db.list_matches(user_id).await?;
            let today = today();
            Ok::<_, ApiError>(rows.into_iter().map(|row| row.into_summary(today)).collect())
        })
        .await?;

    Ok(HttpResponse::Ok().json(summaries))
}

/// DELETE /api/matches/{match_id}
async fn unmatch(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let match_id = path.into_inner();
    state.load_active_user(auth.id).await?;
    let found = state.participant_match(match_id, auth.id).await?;

    if !state.db.unmatch(match_id, auth.id).await? {
        return Err(ApiError::not_found("Match not found"));
    }

    state.forget_matches(&[found.user_a, found.user_b]).await;
    tracing::info!("Match {} closed by {}", match_id, auth.id);
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/matches/{match_id}/messages?before=&limit=
async fn list_messages(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    query: web::Query<MessagesQuery>,
) -> Result<HttpResponse, ApiError> {
    let match_id = path.into_inner();
    state.load_active_user(auth.id).await?;
    state.participant_match(match_id, auth.id).await?;

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let mut messages = state
        .db
        .list_messages(match_id, query.before, limit as i64)
        .await?;

    if !state.features_for(auth.id).await?.read_receipts {
        hide_read_receipts(&mut messages, auth.id);
    }

    let next_before = if messages.len() == limit as usize {
        messages.first().map(|m| m.id)
    } else {
        None
    };

    Ok(HttpResponse::Ok().json(MessagePage {
        messages,
        next_before,
    }))
}

/// POST /api/matches/{match_id}/messages
async fn send_message(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, ApiError> {
    let match_id = path.into_inner();
    let text = body.body.trim();
    let max_length = state.settings.chat.max_message_length;

    if text.is_empty() {
        return Err(ApiError::validation("Message cannot be empty"));
    }
    if text.chars().count() > max_length {
        return Err(ApiError::validation(format!(
            "Message must be at most {} characters",
            max_length
        )));
    }

    state.load_active_user(auth.id).await?;
    let found = state.participant_match(match_id, auth.id).await?;

    state
        .limiter
        .check(
            &format!("messages:{}", auth.id),
            state.settings.rate_limit.messages_per_minute,
            Duration::from_secs(60),
        )
        .map_err(|limited| ApiError::rate_limited("Sending messages too quickly", limited))?;

    let verdict = state.scanner.scan(text);
    if verdict.is_blocked() {
        tracing::info!("Blocked message from {} in {}: {}", auth.id, match_id, verdict.reasons());
        return Err(ApiError::validation(format!(
            "Message not allowed: {}",
            verdict.reasons()
        )));
    }
    if verdict.is_flagged() {
        tracing::info!("Flagged message from {} in {}: {}", auth.id, match_id, verdict.reasons());
    }

    let message = state
        .db
        .insert_message(match_id, auth.id, text, verdict.is_flagged())
        .await?;

    state.forget_matches(&[found.user_a, found.user_b]).await;
    state.db.touch_last_active(auth.id).await?;

    Ok(HttpResponse::Created().json(message))
}

/// POST /api/matches/{match_id}/read
async fn mark_read(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let match_id = path.into_inner();
    state.load_active_user(auth.id).await?;
    state.participant_match(match_id, auth.id).await?;

    let updated = state.db.mark_read(match_id, auth.id).await?;
    Ok(HttpResponse::Ok().json(CountResponse { updated }))
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
            body: "hi".to_string(),
            flagged: false,
            created_at: Utc::now(),
            read_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_hide_read_receipts_only_on_own_messages() {
        let me = Uuid::new_v4();
        let them = Uuid::new_v4();
        let mut messages = vec![message(1, me), message(2, them)];

        hide_read_receipts(&mut messages, me);

        assert!(messages[0].read_at.is_none());
        assert!(messages[1].read_at.is_some());
    }
}
