use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::config::BasicAuth;
use crate::errors::AppError;

/// Rejects requests without the configured basic credentials.
pub async fn require_basic_auth(
    State(expected): State<Arc<BasicAuth>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorized = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(decode_basic)
        .is_some_and(|(user, pass)| credentials_match(&expected, &user, &pass));

    if !authorized {
        warn!(uri = %req.uri(), "rejected request with missing or wrong credentials");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(req).await)
}

/// Both halves are always compared, in constant time.
fn credentials_match(expected: &BasicAuth, user: &str, pass: &str) -> bool {
    let user_ok = user.as_bytes().ct_eq(expected.username.as_bytes());
    let pass_ok = pass.as_bytes().ct_eq(expected.password.as_bytes());
    (user_ok & pass_ok).into()
}

fn decode_basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}
