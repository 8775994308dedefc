use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpResponse};
use std::time::Duration;
use validator::Validate;

use super::{today, AppState};
use crate::core::ages::{age_on, is_adult, MINIMUM_AGE};
use crate::error::ApiError;
use crate::models::{ApprovalStatus, LoginRequest, ProfileResponse, RegisterRequest, User};
use crate::services::postgres::NewUser;
use crate::services::{PostgresError, TokenService};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth/register", web::post().to(register))
        .route("/auth/login", web::post().to(login))
        .route("/auth/logout", web::post().to(logout));
}

pub(crate) fn session_cookie(tokens: &TokenService, token: String) -> Cookie<'static> {
    Cookie::build(tokens.cookie_name().to_string(), token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(tokens.secure_cookie())
        .max_age(CookieDuration::seconds(tokens.ttl().num_seconds()))
        .finish()
}

pub(crate) fn removal_cookie(tokens: &TokenService) -> Cookie<'static> {
    let mut cookie = Cookie::build(tokens.cookie_name().to_string(), "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(tokens.secure_cookie())
        .finish();
    cookie.make_removal();
    cookie
}

async fn hash_password(state: &AppState, password: String) -> Result<String, ApiError> {
    let tokens = state.tokens.clone();
    web::block(move || tokens.hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

async fn password_matches(state: &AppState, password: String, hash: String) -> Result<bool, ApiError> {
    let tokens = state.tokens.clone();
    web::block(move || tokens.verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn signed_in(state: &AppState, user: User, created: bool) -> Result<HttpResponse, ApiError> {
    let token = state.tokens.issue(user.id, user.role)?;
    let (_, plan) = state.plan_for(user.id).await?;
    let age = age_on(user.birthdate, today());

    let mut response = if created {
        HttpResponse::Created()
    } else {
        HttpResponse::Ok()
    };

    Ok(response
        .cookie(session_cookie(&state.tokens, token))
        .json(ProfileResponse { user, age, plan }))
}

/// Create an account and start a session
///
/// POST /api/auth/register
async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    req.validate()?;

    if !is_adult(req.birthdate, today()) {
        return Err(ApiError::validation(format!(
            "You must be at least {} years old",
            MINIMUM_AGE
        )));
    }

    let display_name = req.display_name.trim().to_string();
    let verdict = state.scanner.scan(&display_name);
    if verdict.is_blocked() {
        return Err(ApiError::validation(format!(
            "Display name not allowed: {}",
            verdict.reasons()
        )));
    }

    let password_hash = hash_password(&state, req.password).await?;
    let approval_status = if state.settings.moderation.auto_approve {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Pending
    };

    let user = state
        .db
        .create_user(NewUser {
            email: req.email.trim().to_lowercase(),
            password_hash,
            display_name,
            birthdate: req.birthdate,
            gender: req.gender.trim().to_lowercase(),
            approval_status,
        })
        .await
        .map_err(|e| match e {
            PostgresError::Conflict(_) => ApiError::conflict("Email is already registered"),
            other => other.into(),
        })?;

    tracing::info!("Registered user {} ({:?})", user.id, user.approval_status);
    signed_in(&state, user, true).await
}

/// POST /api/auth/login
async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    req.validate()?;

    let email = req.email.trim().to_lowercase();
    let limits = &state.settings.rate_limit;
    let limiter_key = format!("login:{}", email);
    state
        .limiter
        .check(
            &limiter_key,
            limits.login_attempts,
            Duration::from_secs(limits.login_window_secs),
        )
        .map_err(|limited| ApiError::rate_limited("Too many login attempts", limited))?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = state.db.get_user_by_email(&email).await?.ok_or_else(invalid)?;
    if !password_matches(&state, req.password, user.password_hash.clone()).await? {
        tracing::info!("Failed login for {}", user.id);
        return Err(invalid());
    }
    if user.is_banned {
        return Err(ApiError::forbidden("Account is suspended"));
    }

    state.limiter.reset(&limiter_key);
    state.db.touch_last_active(user.id).await?;

    tracing::info!("User {} logged in", user.id);
    signed_in(&state, user, false).await
}

/// Sessions are stateless; logging out only clears the cookie
///
/// POST /api/auth/logout
async fn logout(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::NoContent()
        .cookie(removal_cookie(&state.tokens))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionSettings;

    fn tokens() -> TokenService {
        TokenService::new(
            &SessionSettings {
                jwt_secret: "cookie-secret".to_string(),
                ttl_hours: 2,
                cookie_name: "kindred_session".to_string(),
                secure_cookie: true,
            },
            4,
        )
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(&tokens(), "abc".to_string());
        assert_eq!(cookie.name(), "kindred_session");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(CookieDuration::hours(2)));
    }

    #[test]
    fn test_removal_cookie_expires() {
        let cookie = removal_cookie(&tokens());
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }
}
