//! Management API for queue state.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::pagination::{apply_total_header, PageQuery, Pagination};
use super::validate_domain;
use crate::state::SharedState;

/// One queue as seen by operators.
#[derive(Debug, Serialize, Deserialize)]
pub struct Queue {
    pub domain: String,
    #[serde(default)]
    pub current_number: i64,
    #[serde(default)]
    pub permitted_number: i64,
}

/// Body of queue update requests. The path names the domain; a body domain
/// is accepted only when it agrees.
#[derive(Debug, Deserialize)]
pub struct QueueUpdate {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub current_number: i64,
    #[serde(default)]
    pub permitted_number: i64,
}

fn validate_numbers(current_number: i64, permitted_number: i64) -> Result<(), ApiError> {
    if current_number < 0 || permitted_number < 0 {
        return Err(ApiError::Validation(
            "current_number and permitted_number must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// `GET /v1/queues` — page through the enabled queues.
pub async fn get_queues(
    State(state): State<SharedState>,
    Query(query): Query<PageQuery>,
) -> Result<(HeaderMap, Json<Vec<Queue>>), ApiError> {
    let pagination = Pagination::from_query(&query);
    let (start, stop) = pagination.range();

    let domains = state.engine.get_enable_domains(start, stop).await?;
    let mut queues = Vec::with_capacity(domains.len());
    for domain in domains {
        let current_number = state.engine.get_current_number(&domain).await?;
        // A watermark can expire between the set read and here; surface
        // that as -1 rather than a fake zero.
        let permitted_number = state.engine.get_permit_number(&domain).await?.unwrap_or(-1);
        queues.push(Queue {
            domain,
            current_number,
            permitted_number,
        });
    }
    let total = state.engine.get_enable_domains_count().await?;

    let mut headers = HeaderMap::new();
    pagination.apply_headers(&mut headers);
    apply_total_header(&mut headers, total);
    Ok((headers, Json(queues)))
}

/// `POST /v1/queues` — enable a domain and seed its counters.
pub async fn create_queue(
    State(state): State<SharedState>,
    Json(queue): Json<Queue>,
) -> Result<StatusCode, ApiError> {
    validate_domain(&queue.domain)?;
    validate_numbers(queue.current_number, queue.permitted_number)?;

    state.engine.enable_queue(&queue.domain).await?;
    apply_update(&state, &queue.domain, queue.current_number, queue.permitted_number).await?;
    Ok(StatusCode::CREATED)
}

/// `PUT /v1/queues/{domain}` — overwrite a queue's counters.
///
/// The domain must already be queueing; creating a queue goes through
/// `POST /v1/queues`.
pub async fn update_queue(
    State(state): State<SharedState>,
    Path(domain): Path<String>,
    Json(update): Json<QueueUpdate>,
) -> Result<StatusCode, ApiError> {
    validate_domain(&domain)?;
    if update.domain.as_deref().is_some_and(|d| d != domain) {
        return Err(ApiError::Validation(
            "body domain does not match path domain".to_string(),
        ));
    }
    validate_numbers(update.current_number, update.permitted_number)?;

    if !state.engine.is_enabled_queue_fresh(&domain).await? {
        return Err(ApiError::NotFound);
    }

    apply_update(&state, &domain, update.current_number, update.permitted_number).await?;
    Ok(StatusCode::OK)
}

/// `DELETE /v1/queues/{domain}` — tear a queue down.
pub async fn delete_queue(
    State(state): State<SharedState>,
    Path(domain): Path<String>,
) -> Result<StatusCode, ApiError> {
    validate_domain(&domain)?;
    state.engine.reset(&domain).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn apply_update(
    state: &SharedState,
    domain: &str,
    current_number: i64,
    permitted_number: i64,
) -> Result<(), ApiError> {
    state.engine.extend_domains_ttl().await?;
    state.engine.save_current_number(domain, current_number).await?;
    state.engine.save_permit_number(domain, permitted_number).await?;
    Ok(())
}
