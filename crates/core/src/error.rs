//! Unified error types for prts-sync.
//!
//! Every variant renders with a stable uppercase code so log lines can be
//! grepped by failure class.

use tokio_rusqlite::rusqlite;

/// Unified error type shared by the store, the extractors and the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty subject name).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL built from configuration or a subject name.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network-level fetch failure (connect, timeout, body read).
    #[error("FETCH_FAILED: {0}")]
    FetchFailed(String),

    /// Non-success HTTP status.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// A page no longer has the container the parser is anchored on.
    #[error("LAYOUT_CHANGED: {0}")]
    LayoutChanged(String),

    /// The render surface could not produce a loaded page.
    #[error("RENDER_FAILED: {0}")]
    RenderFailed(String),

    /// Database operation failed.
    #[error("DATABASE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("MIGRATION_FAILED: {0}")]
    MigrationFailed(String),

    /// Local file output failed.
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::LayoutChanged("div#filter-data".to_string());
        assert!(err.to_string().contains("LAYOUT_CHANGED"));
        assert!(err.to_string().contains("div#filter-data"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, Error::Database(_)));
        assert!(err.to_string().starts_with("DATABASE_ERROR"));
    }

    #[test]
    fn test_from_io_error() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing dir").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("IO_ERROR"));
    }

    #[test]
    fn test_from_call_error_unwraps_inner() {
        let wrapped = tokio_rusqlite::Error::Error(Error::InvalidInput("empty".into()));
        let err: Error = wrapped.into();
        assert!(matches!(err, Error::InvalidInput(msg) if msg == "empty"));
    }
}
