//! Discovery of an externally provided Postgres database for integration tests.

use anyhow::{Result, bail};
use url::Url;

/// Environment variable naming the test database.
pub const TEST_DATABASE_URL_ENV: &str = "ALGRHUB_TEST_DATABASE_URL";

/// Connection string of the test database, if one is configured.
///
/// # Errors
///
/// Returns an error when the variable is set but is not a `postgres://` URL.
pub fn test_database_url() -> Result<Option<String>> {
    parse_database_url(std::env::var(TEST_DATABASE_URL_ENV).ok())
}

fn parse_database_url(value: Option<String>) -> Result<Option<String>> {
    let Some(value) = value.filter(|value| !value.trim().is_empty()) else {
        return Ok(None);
    };
    let url = Url::parse(value.trim())?;
    if !matches!(url.scheme(), "postgres" | "postgresql") {
        bail!("{TEST_DATABASE_URL_ENV} must use the postgres scheme");
    }
    Ok(Some(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_database_url_handles_absent_and_blank() -> Result<()> {
        assert_eq!(parse_database_url(None)?, None);
        assert_eq!(parse_database_url(Some("  ".into()))?, None);
        Ok(())
    }

    #[test]
    fn parse_database_url_requires_postgres_scheme() -> Result<()> {
        let url = parse_database_url(Some("postgres://u:p@localhost:5432/algr".into()))?;
        assert_eq!(url.as_deref(), Some("postgres://u:p@localhost:5432/algr"));
        assert!(parse_database_url(Some("mysql://localhost/db".into())).is_err());
        Ok(())
    }
}
