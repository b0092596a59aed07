use std::fmt;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
    Router,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::error_response;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id assigned to one HTTP request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug)]
struct RequestPolicy {
    timeout: Duration,
}

/// Wraps every route with request id assignment and a deadline. A request
/// that outlives the deadline is dropped, cancelling its store and cache
/// calls, and answered with 504.
pub fn with_request_tracking(router: Router, timeout: Duration) -> Router {
    router.layer(axum::middleware::from_fn_with_state(RequestPolicy { timeout }, track_request))
}

async fn track_request(
    State(policy): State<RequestPolicy>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = RequestId::generate();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    request.extensions_mut().insert(request_id.clone());
    let started = Instant::now();

    let mut response = match tokio::time::timeout(policy.timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(
                event_name = "system.http.timeout",
                correlation_id = %request_id,
                method = %method,
                path = %path,
                timeout_ms = policy.timeout.as_millis() as u64,
                "request exceeded its deadline"
            );
            error_response(StatusCode::GATEWAY_TIMEOUT, "request timed out", request_id.as_str())
        }
    };

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    info!(
        event_name = "system.http.request",
        correlation_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request completed"
    );
    response
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::{with_request_tracking, REQUEST_ID_HEADER};

    fn slow_router() -> Router {
        let router = Router::new()
            .route("/fast", get(|| async { "ok" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            );
        with_request_tracking(router, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn responses_carry_a_fresh_request_id() {
        let response = slow_router()
            .oneshot(Request::builder().uri("/fast").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let header = response.headers().get(REQUEST_ID_HEADER).expect("request id header");
        let id = header.to_str().expect("ascii");
        assert_eq!(uuid::Uuid::parse_str(id).ok().map(|uuid| uuid.get_version_num()), Some(4));
    }

    #[tokio::test]
    async fn requests_past_the_deadline_get_gateway_timeout() {
        let response = slow_router()
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let header = response.headers().get(REQUEST_ID_HEADER).cloned().expect("header");
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["error"], "request timed out");
        assert_eq!(json["correlation_id"], header.to_str().expect("ascii"));
    }
}
