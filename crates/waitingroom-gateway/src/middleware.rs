//! Request-level middleware.

use std::time::Instant;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

/// Logs one structured event per request.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    if status.is_server_error() {
        tracing::error!(%method, %uri, status = status.as_u16(), elapsed_ms, "REQUEST_ERROR");
    } else {
        tracing::info!(%method, %uri, status = status.as_u16(), elapsed_ms, "REQUEST");
    }
    response
}

/// Lets browser-based management consoles read the pagination headers
/// cross-origin.
pub async fn expose_pagination(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "Access-Control-Allow-Origin",
        HeaderValue::from_static("*"),
    );
    headers.insert(
        "Access-Control-Expose-Headers",
        HeaderValue::from_static(concat_headers()),
    );
    response
}

const fn concat_headers() -> &'static str {
    // Keep in sync with the pagination module's header names.
    "X-Pagination-Current-Page, X-Pagination-Limit, X-Pagination-Total-Pages"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::pagination::{HEADER_CURRENT_PAGE, HEADER_LIMIT, HEADER_TOTAL_PAGES};

    #[test]
    fn exposed_header_list_matches_pagination_module() {
        let exposed = concat_headers();
        for name in [HEADER_CURRENT_PAGE, HEADER_LIMIT, HEADER_TOTAL_PAGES] {
            assert!(exposed.contains(name), "{name} not exposed");
        }
    }
}
