//! Capability results and failure classification.
//!
//! Loaders and actions never throw to change control flow: a redirect or
//! an expected status is returned as [`LoadResult::Signal`], an uncaught
//! error as [`LoadResult::Failure`].

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Outcome of a single loader or action invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult {
    /// Structured payload for the route.
    Success(Value),
    /// Deliberate flow control: redirect or expected status.
    Signal(ControlSignal),
    /// Unexpected error.
    Failure(RouteFailure),
}

impl LoadResult {
    /// Implicit result of a route without a loader.
    pub fn empty() -> Self {
        LoadResult::Success(Value::Null)
    }

    pub fn json(payload: impl Into<Value>) -> Self {
        LoadResult::Success(payload.into())
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        LoadResult::Signal(ControlSignal::redirect(location))
    }

    pub fn status(status: u16) -> Self {
        LoadResult::Signal(ControlSignal::status(status))
    }

    pub fn fail(message: impl Into<String>) -> Self {
        LoadResult::Failure(RouteFailure::new(message))
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, LoadResult::Signal(signal) if signal.is_redirect())
    }

    /// Classify a non-success result for the boundary resolver.
    ///
    /// Returns `None` for successes and redirects.
    pub fn failure(&self) -> Option<(FailureKind, Value)> {
        match self {
            LoadResult::Success(_) => None,
            LoadResult::Signal(signal) if signal.is_redirect() => None,
            LoadResult::Signal(signal) => Some((
                FailureKind::ExpectedStatus {
                    status: signal.status_code(),
                },
                signal.body().clone(),
            )),
            LoadResult::Failure(failure) => {
                Some((FailureKind::UnexpectedError, failure.to_payload()))
            }
        }
    }
}

impl<E> From<Result<Value, E>> for LoadResult
where
    E: std::error::Error,
{
    fn from(result: Result<Value, E>) -> Self {
        match result {
            Ok(payload) => LoadResult::Success(payload),
            Err(e) => LoadResult::Failure(RouteFailure::from_error(&e)),
        }
    }
}

/// Explicit response-with-status signal returned by a capability.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSignal {
    status: u16,
    location: Option<String>,
    body: Value,
}

impl ControlSignal {
    /// `302 Found` redirect.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::redirect_with(302, location)
    }

    pub fn redirect_with(status: u16, location: impl Into<String>) -> Self {
        Self {
            status,
            location: Some(location.into()),
            body: Value::Null,
        }
    }

    /// Expected, user-facing status such as 404 or 403.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            location: None,
            body: Value::Null,
        }
    }

    pub fn not_found() -> Self {
        Self::status(404)
    }

    pub fn forbidden() -> Self {
        Self::status(403)
    }

    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// A signal is a redirect when it carries a location and a 3xx status.
    pub fn is_redirect(&self) -> bool {
        self.location.is_some() && (300..400).contains(&self.status)
    }
}

/// Unexpected error raised by a capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RouteFailure {
    message: String,
}

impl RouteFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Capture an error and its source chain as a failure message.
    pub fn from_error(error: &dyn std::error::Error) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn to_payload(&self) -> Value {
        serde_json::json!({ "message": self.message })
    }
}

/// Failure class used to pick a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    UnexpectedError,
    ExpectedStatus { status: u16 },
}

impl FailureKind {
    /// HTTP status the failure renders with.
    pub fn status(&self) -> u16 {
        match self {
            FailureKind::UnexpectedError => 500,
            FailureKind::ExpectedStatus { status } => *status,
        }
    }

    pub fn is_unexpected(&self) -> bool {
        matches!(self, FailureKind::UnexpectedError)
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::UnexpectedError => "unexpected",
            FailureKind::ExpectedStatus { .. } => "status",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::UnexpectedError => f.write_str("unexpected error"),
            FailureKind::ExpectedStatus { status } => write!(f, "status {}", status),
        }
    }
}
