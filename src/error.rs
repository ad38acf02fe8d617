//! Error handling for the console.
//!
//! Every fallible operation in the crate returns a [`ConsoleResult`].
//! Prefer adding a new variant over squeezing a failure into
//! [`ConsoleError::Store`], since resolvers and the HTTP layer
//! render each variant differently.

use std::collections::BTreeMap;
use std::fmt;

use async_graphql::ErrorExtensions;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Where unauthenticated visitors are sent.
pub const SIGN_UP_PATH: &str = "/signup";

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// A referenced document doesn't exist.
    #[error("No {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// A submitted form failed validation. Carries every failing field,
    /// not just the first.
    #[error("{0}")]
    Validation(FieldErrors),

    /// The document store failed to carry out an operation.
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// A stored document couldn't be read as the expected entity.
    #[error("Malformed document {collection}/{id}: {source}")]
    MalformedDocument {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode document: {0}")]
    Encoding(#[source] serde_json::Error),

    /// The request carries no admin session.
    #[error("Sign in required")]
    SessionRequired,

    /// The admin session header couldn't be parsed.
    #[error("Invalid admin session header: {0}")]
    InvalidSessionHeader(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// The student isn't on the event's attendee list.
    #[error("Student {student} is not registered for event {event}")]
    NotRegistered { event: String, student: String },

    #[error("Student {student} has been credited for event {event}; unmark attendance first")]
    AttendanceCredited { event: String, student: String },

    /// The reward can't be redeemed right now.
    #[error("Cannot redeem reward: {0}")]
    Redemption(String),

    #[error("The live subscription ended: {0}")]
    SubscriptionClosed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConsoleError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation(_)
            | Self::InvalidSessionHeader(_)
            | Self::InvalidTimestamp(_)
            | Self::NotRegistered { .. }
            | Self::AttendanceCredited { .. }
            | Self::Redemption(_) => StatusCode::BAD_REQUEST,
            Self::SessionRequired => StatusCode::UNAUTHORIZED,
            Self::Store(_)
            | Self::MalformedDocument { .. }
            | Self::Encoding(_)
            | Self::SubscriptionClosed(_)
            | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ErrorExtensions for ConsoleError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_err, extensions| {
            extensions.set("status", i32::from(self.status_code().as_u16()));

            match self {
                Self::Validation(errors) => {
                    if let Ok(fields) = async_graphql::Value::from_json(json!(errors.as_map())) {
                        extensions.set("fieldErrors", fields);
                    }
                }
                Self::SessionRequired => extensions.set("redirect", SIGN_UP_PATH.to_owned()),
                _ => {}
            }
        })
    }
}

impl IntoResponse for ConsoleError {
    fn into_response(self) -> Response {
        let body = match &self {
            Self::Validation(errors) => json!({
                "message": "validation failed",
                "fieldErrors": errors.as_map(),
            }),
            Self::SessionRequired => json!({
                "message": self.to_string(),
                "redirect": SIGN_UP_PATH,
            }),
            other => json!({ "message": other.to_string() }),
        };

        (self.status_code(), Json(body)).into_response()
    }
}

/// Inline form errors, keyed by the name of the offending field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<&'static str, String> {
        &self.0
    }

    /// Rejects the submission if any field failed.
    pub fn into_result(self) -> ConsoleResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ConsoleError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages = self
            .0
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "Invalid form: {}", messages)
    }
}
