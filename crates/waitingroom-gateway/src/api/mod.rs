//! HTTP surface of the gateway.
//!
//! Hot path: `GET /queues/{domain}` (and the enabling variant) plus
//! `GET /status`. Management lives under `/v1`.

pub mod check;
pub mod error;
pub mod pagination;
pub mod queues;
pub mod whitelist;

use axum::routing::{delete, get, put};
use axum::{middleware, Router};

use crate::state::SharedState;
use error::ApiError;

/// Builds the full gateway router.
pub fn router(state: SharedState) -> Router {
    let v1 = Router::new()
        .route("/queues", get(queues::get_queues).post(queues::create_queue))
        .route(
            "/queues/{domain}",
            put(queues::update_queue).delete(queues::delete_queue),
        )
        .route(
            "/whitelist",
            get(whitelist::get_white_list).post(whitelist::create_white_list),
        )
        .route("/whitelist/{domain}", delete(whitelist::delete_white_list))
        .layer(middleware::from_fn(crate::middleware::expose_pagination));

    Router::new()
        .route("/status", get(check::status))
        .route("/queues/{domain}", get(check::check))
        .route("/queues/{domain}/{enable}", get(check::check_enable))
        .nest("/v1", v1)
        .layer(middleware::from_fn(crate::middleware::request_logger))
        .with_state(state)
}

/// Validates a fully-qualified domain name.
///
/// Labels are 1–63 characters of ASCII alphanumerics and hyphens, no label
/// starts or ends with a hyphen, at least two labels, 253 characters
/// overall, and the top-level label is not all digits.
pub fn validate_domain(domain: &str) -> Result<(), ApiError> {
    let invalid = || ApiError::Validation(format!("'{domain}' is not a valid fqdn"));

    if domain.is_empty() || domain.len() > 253 {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid());
    }
    for label in &labels {
        if label.is_empty() || label.len() > 63 {
            return Err(invalid());
        }
        if !label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(invalid());
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid());
        }
    }
    if labels
        .last()
        .is_some_and(|tld| tld.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(invalid());
    }
    Ok(())
}
