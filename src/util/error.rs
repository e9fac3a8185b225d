//! Error classification for retry/backoff decisions.
use anyhow::Error;
use reqwest::StatusCode;
use sqlx::Error as SqlxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// Transient: network hiccup, timeout, 5xx.
    Retryable,
    /// Caller's fault: validation, 404, malformed payload.
    NonRetryable,
    /// Operator's fault: bad config, auth failure, corrupted state.
    Fatal,
}

#[must_use]
pub(crate) fn classify_error(error: &Error) -> ErrorKind {
    if let Some(reqwest_err) = error.downcast_ref::<reqwest::Error>() {
        if reqwest_err.is_timeout() || reqwest_err.is_connect() {
            return ErrorKind::Retryable;
        }

        if let Some(status) = reqwest_err.status() {
            match status {
                StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT => return ErrorKind::Retryable,
                StatusCode::BAD_REQUEST
                | StatusCode::NOT_FOUND
                | StatusCode::UNPROCESSABLE_ENTITY => return ErrorKind::NonRetryable,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return ErrorKind::Fatal,
                _ => {}
            }
        }
    }

    if let Some(sqlx_err) = error.downcast_ref::<SqlxError>() {
        match sqlx_err {
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Database(_) => {
                return ErrorKind::Retryable
            }
            SqlxError::RowNotFound => return ErrorKind::NonRetryable,
            SqlxError::Configuration(_) => return ErrorKind::Fatal,
            _ => {}
        }
    }

    ErrorKind::NonRetryable
}

#[must_use]
pub(crate) fn is_retryable(error: &Error) -> bool {
    matches!(classify_error(error), ErrorKind::Retryable)
}

#[must_use]
pub(crate) fn is_fatal(error: &Error) -> bool {
    matches!(classify_error(error), ErrorKind::Fatal)
}
