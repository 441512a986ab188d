//! Hot-path check protocol.
//!
//! The edge proxy calls `GET /queues/{domain}` on every origin hit; the
//! reply is either "admit" (`200`) or "wait, here is your position"
//! (`429`). The variant with a second path segment additionally enables
//! queueing for the domain, which the edge triggers when the origin is
//! over its rate limit.
//!
//! Decision order is load-bearing: enable / enabled gate first (an operator
//! can activate a domain through the edge at any moment), then the
//! allow-list short-circuit, then the permitted-client short-circuit, and
//! only then any ticket work.

use axum::extract::{Path, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use waitingroom_core::{Client, COOKIE_NAME};

use super::error::ApiError;
use crate::state::SharedState;

/// Body of every check reply.
#[derive(Debug, Default, Serialize)]
pub struct QueueResult {
    pub id: String,
    pub enabled: bool,
    pub permitted_client: bool,
    pub serial_no: i64,
    pub permitted_no: i64,
    pub remaining_wait_second: i64,
}

/// `GET /queues/{domain}` — check without enabling.
pub async fn check(
    State(state): State<SharedState>,
    Path(domain): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    do_check(&state, &domain, false, headers).await
}

/// `GET /queues/{domain}/{enable}` — check, enabling the queue first when
/// the second segment is non-empty.
pub async fn check_enable(
    State(state): State<SharedState>,
    Path((domain, enable)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    do_check(&state, &domain, !enable.is_empty(), headers).await
}

/// `GET /status` — liveness, pings the shared store.
pub async fn status(State(state): State<SharedState>) -> Result<&'static str, ApiError> {
    state.engine.ping().await?;
    Ok("ok")
}

async fn do_check(
    state: &SharedState,
    domain: &str,
    enable: bool,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (mut client, evict_cookie) = read_client(state, &headers);
    // A broken cookie is evicted on whatever reply this request ends in,
    // unless a fresh cookie replaces it below.
    let stale = evict_cookie.then(|| eviction_cookie(domain));

    if enable {
        state.engine.enable_queue(domain).await?;
    } else if !state.engine.is_enabled_queue(domain).await? {
        return respond(StatusCode::OK, QueueResult::default(), stale);
    }

    if state.engine.is_in_white_list(domain).await? {
        return respond(StatusCode::OK, QueueResult::default(), stale);
    }

    if state.engine.is_permitted_client(&client).await? {
        let body = QueueResult {
            id: client.id,
            enabled: true,
            permitted_client: true,
            ..QueueResult::default()
        };
        return respond(StatusCode::OK, body, stale);
    }

    let serial_no = state
        .engine
        .assign_serial_number(domain, &mut client)
        .await?;
    let cookie = save_cookie(state, domain, &client)?;

    if client.has_serial_number()
        && state
            .engine
            .check_and_permit_client(domain, &client)
            .await?
    {
        let body = QueueResult {
            id: client.id,
            enabled: true,
            permitted_client: true,
            ..QueueResult::default()
        };
        return respond(StatusCode::OK, body, Some(cookie));
    }

    let (remaining_wait_second, permitted_no) = state
        .engine
        .calc_remaining_wait_second(domain, &client)
        .await?;
    let body = QueueResult {
        id: client.id,
        enabled: true,
        permitted_client: false,
        serial_no,
        permitted_no,
        remaining_wait_second,
    };
    respond(StatusCode::TOO_MANY_REQUESTS, body, Some(cookie))
}

/// Decodes the inbound cookie. A missing cookie yields a fresh client; a
/// cookie that fails to open yields a fresh client plus an eviction flag.
fn read_client(state: &SharedState, headers: &HeaderMap) -> (Client, bool) {
    let Some(value) = cookie_value(headers) else {
        return (Client::default(), false);
    };
    match state.codec.open(&value) {
        Ok(client) => (client, false),
        Err(e) => {
            tracing::warn!(error = %e, "can't decode waiting room cookie");
            (Client::default(), true)
        }
    }
}

/// Extracts the waiting-room cookie value from the request headers.
fn cookie_value(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                if name.trim() == COOKIE_NAME {
                    return Some(value.trim().to_string());
                }
            }
        }
    }
    None
}

/// Seals `client` into a Set-Cookie header value with the protocol's
/// attributes.
fn save_cookie(state: &SharedState, domain: &str, client: &Client) -> Result<String, ApiError> {
    let sealed = state.codec.seal(client)?;
    Ok(format!(
        "{COOKIE_NAME}={sealed}; Max-Age={}; Domain={domain}; Path=/; Secure; HttpOnly",
        state.config.permitted_access_sec
    ))
}

/// Set-Cookie value that evicts a broken cookie from the browser.
fn eviction_cookie(domain: &str) -> String {
    format!("{COOKIE_NAME}=; Max-Age=0; Domain={domain}; Path=/; Secure; HttpOnly")
}

fn respond(
    status: StatusCode,
    body: QueueResult,
    cookie: Option<String>,
) -> Result<Response, ApiError> {
    let mut response = (status, Json(body)).into_response();
    if let Some(cookie) = cookie {
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| ApiError::Internal(format!("cookie header: {e}")))?;
        response.headers_mut().append(SET_COOKIE, value);
    }
    Ok(response)
}
