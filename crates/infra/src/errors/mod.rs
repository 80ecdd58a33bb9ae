//! Error conversions between infrastructure libraries and the domain

use hourmark_domain::HourmarkError;

/// Newtype bridging third-party errors into [`HourmarkError`]
///
/// Repositories and clients convert through this type so the `?` operator
/// works against the domain `Result` alias.
#[derive(Debug)]
pub struct InfraError(pub HourmarkError);

impl From<InfraError> for HourmarkError {
    fn from(err: InfraError) -> Self {
        err.0
    }
}

impl From<rusqlite::Error> for InfraError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self(HourmarkError::Conflict(err.to_string()))
            }
            _ => Self(HourmarkError::Database(err.to_string())),
        }
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(err: r2d2::Error) -> Self {
        Self(HourmarkError::Database(format!("connection pool error: {err}")))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(err: serde_json::Error) -> Self {
        Self(HourmarkError::Database(format!("stored JSON corrupt: {err}")))
    }
}

impl From<reqwest::Error> for InfraError {
    fn from(err: reqwest::Error) -> Self {
        let transient = err.is_timeout()
            || err.is_connect()
            || err.status().map_or(
                // No status at all: network-level failure, worth retrying
                err.is_request() || err.is_body() || err.is_decode(),
                |status| status.is_server_error() || status.as_u16() == 429,
            );
        Self(HourmarkError::Provider { transient, message: err.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_violation_maps_to_conflict() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("UNIQUE constraint failed".into()),
        );
        let converted: HourmarkError = InfraError::from(err).into();
        assert!(matches!(converted, HourmarkError::Conflict(_)));
    }

    #[test]
    fn other_sqlite_errors_map_to_database() {
        let err = rusqlite::Error::InvalidQuery;
        let converted: HourmarkError = InfraError::from(err).into();
        assert!(matches!(converted, HourmarkError::Database(_)));
    }
}
