//! Unified error type for the federation proxy.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The caller is not authenticated, or the token is invalid/expired.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The caller lacks permission for the requested action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request data failed validation (malformed body, unparseable ID, unknown prefix).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A conflicting resource already exists (duplicate prefix, duplicate mapping).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An update was well-formed but incompatible with existing state.
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// The caller has exceeded the login rate limit.
    #[error("Too many requests: {0}")]
    RateLimited(String),

    /// A backend server could not be reached, or returned something unusable.
    #[error("Backend error [{backend}]: {message}")]
    Backend { backend: String, message: String },

    /// A database operation failed.
    #[error("Database error: {source}")]
    Database {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::Validation(_) => 400,
            Error::Conflict(_) => 409,
            Error::Unprocessable(_) => 422,
            Error::RateLimited(_) => 429,
            Error::Backend { .. } => 502,
            Error::Database { .. } => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code, surfaced to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::Validation(_) => "validation",
            Error::Conflict(_) => "conflict",
            Error::Unprocessable(_) => "unprocessable",
            Error::RateLimited(_) => "rate_limited",
            Error::Backend { .. } => "backend_error",
            Error::Database { .. } => "database_error",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }

    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("backend", "abc-123");
        assert_eq!(err.to_string(), "backend not found: abc-123");
        assert_eq!(err.http_status(), 404);
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn unauthorized_display() {
        let err = Error::Unauthorized("bad token".into());
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn forbidden_display() {
        let err = Error::Forbidden("admin only".into());
        assert_eq!(err.http_status(), 403);
    }

    #[test]
    fn conflict_display() {
        let err = Error::Conflict("prefix already registered".into());
        assert_eq!(err.http_status(), 409);
    }

    #[test]
    fn rate_limited_display() {
        let err = Error::RateLimited("too many login attempts".into());
        assert_eq!(err.http_status(), 429);
        assert_eq!(err.code(), "rate_limited");
    }

    #[test]
    fn backend_display() {
        let err = Error::backend("s1", "connection refused");
        assert_eq!(err.to_string(), "Backend error [s1]: connection refused");
        assert_eq!(err.http_status(), 502);
    }

    #[test]
    fn database_display() {
        let err = Error::database("disk full");
        assert!(err.to_string().contains("disk full"));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn result_alias() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok_fn().unwrap(), 42);
    }
}
