use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::core::permissions::{has_permission, Permission};
use crate::error::ApiError;
use crate::models::Role;
use crate::services::TokenService;

/// Authenticated caller, taken from the session cookie or a bearer token
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    /// Role at the time the session was issued
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, ApiError> {
    let tokens = req
        .app_data::<web::Data<TokenService>>()
        .ok_or_else(|| ApiError::Internal("token service not configured".to_string()))?;

    let token = session_token(req, tokens.cookie_name())
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    let claims = tokens.verify(&token)?;
    Ok(AuthUser {
        id: claims.sub,
        role: claims.role,
    })
}

/// Bearer header wins over the cookie
fn session_token(req: &HttpRequest, cookie_name: &str) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    bearer.or_else(|| req.cookie(cookie_name).map(|c| c.value().to_string()))
}

/// 403 unless `role` grants `permission`
pub fn require_permission(role: Role, permission: Permission) -> Result<(), ApiError> {
    if has_permission(role, permission) {
        Ok(())
    } else {
        tracing::warn!("Role {:?} lacks permission {}", role, permission.as_str());
        Err(ApiError::forbidden(format!(
            "Missing permission: {}",
            permission.as_str()
        )))
    }
}
