/// Shared constants and header names.
pub mod constants;
/// Problem response helpers.
pub mod errors;
/// Status, health, and metrics endpoints.
pub mod health;
/// Router construction and server host.
pub mod router;
/// Per-route request accounting middleware.
pub mod telemetry;
/// Multipart upload endpoint.
pub mod upload;
