//! Route paths, form field names, and problem type URIs.

pub(crate) const ROUTE_UPLOAD: &str = "/services/algr/upload";
pub(crate) const ROUTE_STATUS: &str = "/services/algr/status";
pub(crate) const ROUTE_LANGUAGES: &str = "/services/algr/languages";
pub(crate) const ROUTE_HEALTH: &str = "/health";
pub(crate) const ROUTE_METRICS: &str = "/metrics";

pub(crate) const FIELD_FILE: &str = "file";
pub(crate) const FIELD_NAME: &str = "name";
pub(crate) const FIELD_DESCRIPTION: &str = "description";
pub(crate) const FIELD_LANGUAGE: &str = "language";
pub(crate) const FIELD_USER_ID: &str = "user_id";

pub(crate) const PROBLEM_INTERNAL: &str = "https://algrhub.dev/problems/internal";
