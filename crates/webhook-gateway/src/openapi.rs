//! OpenAPI documentation configuration
//!
//! Uses utoipa to generate the OpenAPI 3.0 specification from handler
//! annotations and schema derives.

use utoipa::OpenApi;

use crate::handlers;
use crate::handlers::health::HealthResponse;
use crate::models::common::{ErrorResponse, WebhookAck};

/// OpenAPI documentation for the payment webhook gateway
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Payment Webhook Gateway",
        version = "1.0.0",
        description = "Receives payment-provider notifications for the Telegram bot, \
            reconciles them against user balances and subscriptions, and keeps an \
            append-only payment ledger.\n\n\
            The webhook endpoint is unauthenticated; requests are accepted only from \
            the provider's published IP ranges.",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Discovery", description = "API discovery and metadata"),
        (name = "Payments", description = "Payment provider webhook")
    ),
    paths(
        handlers::health_check,
        handlers::openapi_json,
        handlers::handle_payment_webhook,
    ),
    components(schemas(HealthResponse, ErrorResponse, WebhookAck))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::openapi();
        let json = spec.to_json().unwrap();
        assert!(json.contains("/api/v1/payments/webhook"));
        assert!(json.contains("/api/v1/health"));
    }
}
