//! Management API for the allow-list.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::pagination::{apply_total_header, PageQuery, Pagination};
use super::validate_domain;
use crate::state::SharedState;

/// One allow-list entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct WhiteList {
    pub domain: String,
}

/// `GET /v1/whitelist` — page through the allow-list.
pub async fn get_white_list(
    State(state): State<SharedState>,
    Query(query): Query<PageQuery>,
) -> Result<(HeaderMap, Json<Vec<WhiteList>>), ApiError> {
    let pagination = Pagination::from_query(&query);
    let (start, stop) = pagination.range();

    let domains = state.engine.get_white_list_domains(start, stop).await?;
    let entries = domains
        .into_iter()
        .map(|domain| WhiteList { domain })
        .collect();
    let total = state.engine.get_white_list_domains_count().await?;

    let mut headers = HeaderMap::new();
    pagination.apply_headers(&mut headers);
    apply_total_header(&mut headers, total);
    Ok((headers, Json(entries)))
}

/// `POST /v1/whitelist` — add a domain to the allow-list.
pub async fn create_white_list(
    State(state): State<SharedState>,
    Json(entry): Json<WhiteList>,
) -> Result<StatusCode, ApiError> {
    validate_domain(&entry.domain)?;
    state.engine.add_white_list_domain(&entry.domain).await?;
    Ok(StatusCode::CREATED)
}

/// `DELETE /v1/whitelist/{domain}` — remove a domain from the allow-list.
pub async fn delete_white_list(
    State(state): State<SharedState>,
    Path(domain): Path<String>,
) -> Result<StatusCode, ApiError> {
    validate_domain(&domain)?;
    state.engine.remove_white_list_domain(&domain).await?;
    Ok(StatusCode::NO_CONTENT)
}
