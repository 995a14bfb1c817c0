//! Per-route request accounting.
//!
//! Upload responses carry their [`UploadOutcome`] as a response extension, so
//! `http_requests_total` is labelled with the same numeric code as
//! `upload_rejections_total`. Other routes report `none`.

use algrhub_intake::ErrorCode;
use algrhub_telemetry::{Metrics, REQUEST_ID_HEADER, with_request_context};
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

const NO_UPLOAD_CODE: &str = "none";

/// Pipeline code an upload response was answered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UploadOutcome(pub(crate) ErrorCode);

impl UploadOutcome {
    fn label(self) -> String {
        self.0.as_u16().to_string()
    }
}

/// Run the request inside its request context, then count it by route,
/// HTTP status and upload code.
pub(crate) async fn track_requests(
    State(metrics): State<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let route = request.extensions().get::<MatchedPath>().map_or_else(
        || request.uri().path().to_string(),
        |matched| matched.as_str().to_string(),
    );
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = with_request_context(request_id, route.clone(), next.run(request)).await;
    let upload_code = response
        .extensions()
        .get::<UploadOutcome>()
        .copied()
        .map_or_else(|| NO_UPLOAD_CODE.to_string(), UploadOutcome::label);
    metrics.inc_http_request(&route, response.status().as_u16(), &upload_code);
    response
}
