//! One-shot notices carried across a redirect in a short-lived cookie.

use std::fmt;

use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use url::form_urlencoded;

pub const FLASH_COOKIE: &str = "jotter_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Info,
    Error,
}

impl FlashLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashLevel::Info => "info",
            FlashLevel::Error => "error",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(FlashLevel::Info),
            "error" => Some(FlashLevel::Error),
            _ => None,
        }
    }
}

impl fmt::Display for FlashLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }

    /// Cookie value: `<level>=<form-encoded message>`.
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair(self.level.as_str(), &self.message)
            .finish()
    }

    pub fn decode(value: &str) -> Option<Self> {
        let (level, message) = form_urlencoded::parse(value.as_bytes()).next()?;
        Some(Self {
            level: FlashLevel::parse(&level)?,
            message: message.into_owned(),
        })
    }

    pub fn set_cookie(&self) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age=60",
            FLASH_COOKIE,
            self.encode()
        )
    }
}

pub fn clear_flash_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", FLASH_COOKIE)
}

/// Redirect to `to`, leaving `flash` for the page rendered there.
pub fn redirect_with(to: &str, flash: Flash) -> Response {
    (
        AppendHeaders([(header::SET_COOKIE, flash.set_cookie())]),
        Redirect::to(to),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode() {
        let flash = Flash::error("Failed; to = create & post");
        let encoded = flash.encode();
        assert!(!encoded.contains(';'));
        assert!(!encoded.contains(' '));
        assert_eq!(Flash::decode(&encoded), Some(flash));
    }

    #[test]
    fn decode_rejects_unknown_level() {
        assert_eq!(Flash::decode("debug=hi"), None);
        assert_eq!(Flash::decode(""), None);
    }

    #[test]
    fn redirect_sets_cookie() {
        let response = redirect_with("/blog/", Flash::info("Post created"));
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/blog/");
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("jotter_flash=info=Post+created;"));
    }
}
