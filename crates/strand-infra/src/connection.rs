//! Database connection strings

use crate::error::InfraError;

/// Parts needed to assemble a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParts<'a> {
    /// URL scheme (`postgres` or `cockroachdb`)
    pub scheme: &'a str,
    /// Database user
    pub user: &'a str,
    /// Plain-text password (percent-encoded when assembled)
    pub password: &'a str,
    /// Database host
    pub host: &'a str,
    /// Database port
    pub port: u16,
    /// Database name
    pub database: &'a str,
    /// SSL mode (defaults to `disable`)
    pub ssl_mode: Option<&'a str>,
}

/// Assemble `<scheme>://<user>:<password>@<host>:<port>/<db>?sslmode=<mode>`.
pub fn build_database_url(parts: &ConnectionParts<'_>) -> String {
    format!(
        "{}://{}:{}@{}:{}/{}?sslmode={}",
        parts.scheme,
        urlencoding::encode(parts.user),
        urlencoding::encode(parts.password),
        parts.host,
        parts.port,
        parts.database,
        parts.ssl_mode.filter(|m| !m.is_empty()).unwrap_or("disable"),
    )
}

/// Rewrite `cockroachdb://` to `postgres://` so sqlx accepts the URL.
///
/// CockroachDB speaks the Postgres wire protocol.
pub fn normalize_database_url(url: &str) -> Result<String, InfraError> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| InfraError::InvalidUrl(redact_database_url(url)))?;
    match scheme {
        "postgres" | "postgresql" => Ok(url.to_string()),
        "cockroachdb" | "cockroach" => Ok(format!("postgres://{rest}")),
        other => Err(InfraError::InvalidUrl(format!("unsupported scheme '{other}'"))),
    }
}

/// Mask the password in a connection string so it can be logged.
pub fn redact_database_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.split_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:****@{host}"),
        None => url.to_string(),
    }
}
