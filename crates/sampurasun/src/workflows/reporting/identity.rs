use axum::http::{header, HeaderMap};
use serde::Serialize;

/// Authenticated caller, resolved outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerIdentity {
    pub subject: String,
}

impl CallerIdentity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    /// Identity used by scheduled and command-line work.
    pub fn system() -> Self {
        Self::new("system")
    }
}

/// Maps a bearer credential onto a caller. Verification mechanics live in the implementation.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, bearer: &str) -> Option<CallerIdentity>;
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
