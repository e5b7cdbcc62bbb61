//! Common DTOs shared across handlers

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Standard error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Acknowledgement body returned for handled webhook deliveries
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl WebhookAck {
    pub fn handled() -> Self {
        Self {
            received: true,
            status: None,
        }
    }

    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            received: true,
            status: Some(status.into()),
        }
    }
}
