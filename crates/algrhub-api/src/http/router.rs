//! Router construction and server host for the API.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use algrhub_intake::UploadOrchestrator;
use algrhub_telemetry::{Metrics, REQUEST_ID_HEADER, build_sha, set_request_context};
use axum::{
    Router,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{HeaderName, Method, Request, header::CONTENT_TYPE},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Span, info};

use crate::error::ApiServerError;
use crate::http::constants::{
    ROUTE_HEALTH, ROUTE_LANGUAGES, ROUTE_METRICS, ROUTE_STATUS, ROUTE_UPLOAD,
};
use crate::http::health::{health, languages, metrics, status};
use crate::http::telemetry::track_requests;
use crate::http::upload::upload;
use crate::state::ApiState;

/// Axum router wrapper that hosts the upload API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Wire the orchestrator and metrics into the router and middleware stack.
    ///
    /// `max_upload_bytes` bounds the body of an upload request.
    #[must_use]
    pub fn new(
        orchestrator: Arc<UploadOrchestrator>,
        telemetry: Metrics,
        max_upload_bytes: usize,
    ) -> Self {
        let state = Arc::new(ApiState::new(orchestrator, telemetry.clone()));
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, HeaderName::from_static(REQUEST_ID_HEADER)]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = tracing::field::Empty,
                    request_id = tracing::field::Empty,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|request: &Request<_>, span: &Span| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default();
                let route = request
                    .extensions()
                    .get::<MatchedPath>()
                    .map_or_else(|| request.uri().path(), MatchedPath::as_str);
                set_request_context(span, request_id, route);
            })
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(algrhub_telemetry::set_request_id_layer())
            .layer(algrhub_telemetry::propagate_request_id_layer())
            .layer(trace_layer)
            .layer(axum::middleware::from_fn_with_state(telemetry, track_requests));

        let router = Router::new()
            .route(
                ROUTE_UPLOAD,
                post(upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
            )
            .route(ROUTE_STATUS, get(status))
            .route(ROUTE_LANGUAGES, get(languages))
            .route(ROUTE_HEALTH, get(health))
            .route(ROUTE_METRICS, get(metrics))
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Self { router }
    }

    /// Bind `addr` and serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or the server loop fails.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> Result<(), ApiServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the server loop fails.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ApiServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener
            .local_addr()
            .map_err(|source| ApiServerError::Serve { source })?;
        info!(addr = %local, "Starting API");
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })?;
        info!("API stopped");
        Ok(())
    }

    /// Consume the server and return the configured router.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }
}
