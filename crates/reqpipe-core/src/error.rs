//! Error taxonomy, classification and handling side effects.
//!
//! Failures are classified exactly once, at the pipeline boundary, into an
//! [`ApiError`]. From that point every consumer (retry eligibility, logging,
//! user messaging) matches on the tagged [`ErrorKind`] instead of inspecting
//! raw statuses.

use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use time::OffsetDateTime;

use crate::transport::{HttpError, HttpErrorKind};

/// Flat error taxonomy for classified failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Request was sent but no response arrived.
    Network,
    /// HTTP 401: credentials missing or expired.
    Authentication,
    /// HTTP 403: authenticated but not permitted.
    Authorization,
    /// HTTP 400: the request payload was rejected.
    Validation,
    /// Application-level failure (404, non-200 envelope code, other statuses).
    Business,
    /// HTTP 500 or a local configuration/serialization failure.
    System,
    /// Anything that could not be classified.
    Unknown,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Validation => "validation",
            Self::Business => "business",
            Self::System => "system",
            Self::Unknown => "unknown",
        }
    }

    /// Default severity assigned at classification time.
    pub const fn default_severity(self) -> Severity {
        match self {
            Self::Network | Self::Authorization | Self::Validation | Self::Business => {
                Severity::Warning
            }
            Self::Authentication | Self::System | Self::Unknown => Severity::Error,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity attached to a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

/// Classified pipeline failure. Immutable once constructed.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    kind: ErrorKind,
    severity: Severity,
    message: String,
    /// Business code carried by a non-200 envelope.
    code: Option<i64>,
    /// HTTP status when a response was received.
    status: Option<u16>,
    request_id: Option<String>,
    timestamp: OffsetDateTime,
}

impl ApiError {
    pub fn new(kind: ErrorKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            code: None,
            status: None,
            request_id: None,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Classify an HTTP failure status (a response was received).
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let (kind, fallback) = match status {
            400 => (ErrorKind::Validation, "request validation failed"),
            401 => (ErrorKind::Authentication, "authentication required"),
            403 => (ErrorKind::Authorization, "access denied"),
            404 => (ErrorKind::Business, "resource not found"),
            500 => (ErrorKind::System, "internal server error"),
            _ => (ErrorKind::Business, "request failed"),
        };

        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("{fallback} (status {status})"));

        let mut error = Self::new(kind, kind.default_severity(), message);
        error.status = Some(status);
        error
    }

    /// Classify a transport failure (no response was received).
    pub fn from_transport(error: &HttpError) -> Self {
        match error.kind() {
            HttpErrorKind::Aborted => Self::superseded(),
            _ => Self::new(
                ErrorKind::Network,
                ErrorKind::Network.default_severity(),
                error.message(),
            ),
        }
    }

    /// A non-200 envelope code from an otherwise successful response.
    pub fn business(code: i64, message: impl Into<String>) -> Self {
        let mut error = Self::new(ErrorKind::Business, Severity::Warning, message);
        error.code = Some(code);
        error
    }

    /// A local failure before or after the wire (config, serialization).
    pub fn system(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::System, Severity::Error, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, Severity::Error, message)
    }

    /// The request was intentionally cancelled by a newer one under the
    /// same key. Exempt from retry and from user-facing side effects.
    pub fn superseded() -> Self {
        Self::new(
            ErrorKind::Network,
            Severity::Info,
            "request superseded by a newer call",
        )
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub const fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> Option<i64> {
        self.code
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub const fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    pub const fn is_superseded(&self) -> bool {
        matches!(self.kind, ErrorKind::Network) && matches!(self.severity, Severity::Info)
    }

    /// Whether the failure class is eligible for automatic retry:
    /// a network failure or a 5xx response. Supersession is exempt.
    pub fn is_retryable(&self) -> bool {
        if self.is_superseded() {
            return false;
        }
        matches!(self.kind, ErrorKind::Network)
            || self.status.is_some_and(|status| (500..=599).contains(&status))
    }

    /// User-facing message keyed by error kind.
    pub fn user_message(&self) -> &str {
        match self.kind {
            ErrorKind::Network => "network error, please check your connection",
            ErrorKind::Authentication => "session expired, please log in again",
            ErrorKind::Authorization => "you do not have permission to perform this action",
            ErrorKind::System => "server error, please try again later",
            ErrorKind::Validation | ErrorKind::Business | ErrorKind::Unknown => &self.message,
        }
    }
}

/// Observer notified after an error has been classified and logged.
pub trait ErrorListener: Send + Sync {
    fn on_error(&self, error: &ApiError);
}

/// Fan-out point for error handling side effects.
///
/// Handling order: structured log, then registered listeners. Callers that
/// requested silent handling never reach the hub.
#[derive(Default)]
pub struct ErrorHub {
    listeners: Mutex<Vec<Arc<dyn ErrorListener>>>,
}

impl ErrorHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn ErrorListener>) {
        self.listeners
            .lock()
            .expect("error hub lock is not poisoned")
            .push(listener);
    }

    pub fn handle(&self, error: &ApiError) {
        match error.severity() {
            Severity::Critical | Severity::Error => tracing::error!(
                kind = %error.kind(),
                severity = error.severity().as_str(),
                code = error.code(),
                status = error.status(),
                request_id = error.request_id(),
                message = error.message(),
                "request failed"
            ),
            Severity::Warning => tracing::warn!(
                kind = %error.kind(),
                severity = error.severity().as_str(),
                code = error.code(),
                status = error.status(),
                request_id = error.request_id(),
                message = error.message(),
                "request failed"
            ),
            Severity::Info => tracing::info!(
                kind = %error.kind(),
                request_id = error.request_id(),
                message = error.message(),
                "request failed"
            ),
        }

        let listeners = self
            .listeners
            .lock()
            .expect("error hub lock is not poisoned")
            .clone();
        for listener in listeners {
            listener.on_error(error);
        }
    }
}
