use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::error::AppError;
use crate::flash::{Flash, FLASH_COOKIE};
use crate::state::AppState;

/// Proof that the request carries a valid admin session.
/// Redirects to the login page when it does not.
#[derive(Debug, Clone, Copy)]
pub struct AdminSession;

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if is_admin(&parts.headers, state) {
            Ok(AdminSession)
        } else {
            Err(AppError::LoginRequired)
        }
    }
}

/// Whether the visitor is the admin, for pages open to everyone.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAdmin(pub bool);

impl FromRequestParts<AppState> for MaybeAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAdmin(is_admin(&parts.headers, state)))
    }
}

/// Notice left by the previous request, if any.
#[derive(Debug, Clone, Default)]
pub struct IncomingFlash(pub Option<Flash>);

impl<S: Send + Sync> FromRequestParts<S> for IncomingFlash {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(IncomingFlash(
            cookie_value(&parts.headers, FLASH_COOKIE).and_then(Flash::decode),
        ))
    }
}

/// The single admin predicate every gated route goes through.
pub fn is_admin(headers: &HeaderMap, state: &AppState) -> bool {
    cookie_value(headers, &state.config.auth.cookie_name)
        .is_some_and(|token| state.sessions.verify(token))
}

pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}
