use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileErrorKind {
    InvalidItem,
    NotFound,
    Transport,
    Materialization,
    Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct ReconcileError {
    pub kind: ReconcileErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ReconcileError {
    pub fn new(kind: ReconcileErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            body: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Prefixes the message with the resource kind and item name the failure belongs to.
    pub fn for_item(mut self, kind_label: &str, name: &str) -> Self {
        self.message = format!("{kind_label} '{name}': {}", self.message);
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ReconcileErrorKind::NotFound
    }
}

pub fn invalid_item(message: impl Into<String>) -> ReconcileError {
    ReconcileError::new(ReconcileErrorKind::InvalidItem, message)
}

pub fn not_found(message: impl Into<String>) -> ReconcileError {
    ReconcileError::new(ReconcileErrorKind::NotFound, message)
}

pub fn protocol_error(message: impl Into<String>) -> ReconcileError {
    ReconcileError::new(ReconcileErrorKind::Protocol, message)
}

/// Non-success remote status; status and raw body are kept verbatim in the message.
pub fn remote_status(action: &str, status: u16, body: &str) -> ReconcileError {
    ReconcileError::new(
        ReconcileErrorKind::Transport,
        format!("{action} failed with status {status}: {body}"),
    )
    .with_status(status)
    .with_body(body)
}

pub fn network_failure(action: &str, detail: impl std::fmt::Display) -> ReconcileError {
    ReconcileError::new(
        ReconcileErrorKind::Transport,
        format!("{action} failed: {detail}"),
    )
}

pub fn materialization_failed(cause: ReconcileError) -> ReconcileError {
    ReconcileError {
        kind: ReconcileErrorKind::Materialization,
        message: format!("extra_vars could not be created: {}", cause.message),
        status: cause.status,
        body: cause.body,
    }
}
