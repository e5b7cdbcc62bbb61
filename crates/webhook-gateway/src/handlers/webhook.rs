//! Payment webhook dispatcher
//!
//! Validation happens in a fixed order: origin, body shape, event name,
//! metadata. The body is taken as raw bytes so the origin check runs
//! before any parsing cost is paid.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use shared::{DbPool, Error};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::middleware::origin::{extract_client_ip, is_allowed_origin};
use crate::models::common::{ErrorResponse, WebhookAck};
use crate::models::webhook::{PaymentEvent, PaymentMetadata, PaymentNotification};
use crate::services::entitlements::{EntitlementService, ProcessOutcome};
use crate::services::notifier::Notifier;

/// Handle payment provider notifications
///
/// POST /api/v1/payments/webhook
///
/// # Security
///
/// The provider does not sign payloads; requests are accepted only from
/// its published IP ranges. The check is configurable via
/// `PAYMENT_IP_CHECK_ENABLED` (default: enabled in release builds).
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    tag = "Payments",
    request_body(content = String, description = "Raw notification payload", content_type = "application/json"),
    responses(
        (status = 200, description = "Notification processed", body = WebhookAck),
        (status = 400, description = "Malformed payload, amount, event or metadata", body = ErrorResponse),
        (status = 403, description = "IP not in provider allow-list", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Processing failed", body = ErrorResponse)
    )
)]
pub async fn handle_payment_webhook(
    pool: web::Data<DbPool>,
    notifier: web::Data<Arc<Notifier>>,
    req_http: HttpRequest,
    payload: web::Bytes,
) -> impl Responder {
    let ip_check_enabled = std::env::var("PAYMENT_IP_CHECK_ENABLED")
        .map(|v| v.to_lowercase() != "false")
        .unwrap_or_else(|_| !cfg!(debug_assertions));

    if ip_check_enabled {
        let client_ip = extract_client_ip(&req_http);

        // Strip port if present: "185.71.76.5:443" or "[2a02:5180::1]:443".
        // A bare IPv6 address has more than one colon and no port.
        let ip_only = if let Some(rest) = client_ip.strip_prefix('[') {
            rest.split(']').next().unwrap_or(&client_ip)
        } else if client_ip.matches(':').count() > 1 {
            &client_ip
        } else {
            client_ip.split(':').next().unwrap_or(&client_ip)
        };

        if !is_allowed_origin(ip_only) {
            warn!(client_ip = %client_ip, "Webhook rejected: IP not in provider allow-list");
            return HttpResponse::Forbidden().json(ErrorResponse::new(
                "ip_not_allowed",
                "Request IP not in allowed webhook sources",
            ));
        }

        debug!(client_ip = %client_ip, "Webhook origin validated");
    }

    let notification: PaymentNotification = match serde_json::from_slice(&payload) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "Webhook body failed to parse");
            return HttpResponse::BadRequest()
                .json(ErrorResponse::new("invalid_body", "Invalid request body"));
        }
    };

    if let Err(e) = notification.validate_envelope() {
        warn!(error = %e, "Webhook envelope rejected");
        return HttpResponse::BadRequest()
            .json(ErrorResponse::new("invalid_body", "Invalid request body"));
    }

    let event = match notification.event.parse::<PaymentEvent>() {
        Ok(e) => e,
        Err(_) => {
            warn!(event = %notification.event, "Unknown webhook event");
            return HttpResponse::BadRequest().json(ErrorResponse::new(
                "invalid_event",
                format!("Invalid event: {}", notification.event),
            ));
        }
    };

    let object = &notification.object;
    let metadata = match PaymentMetadata::classify(&object.metadata) {
        Ok(m) => m,
        Err(e) => {
            warn!(payment_id = %object.id, error = %e, "Webhook metadata rejected");
            return HttpResponse::BadRequest()
                .json(ErrorResponse::new("invalid_metadata", e.to_string()));
        }
    };

    match EntitlementService::process(&pool, event, object, metadata).await {
        Ok(ProcessOutcome::Credited {
            user,
            tokens_credited,
        }) => {
            notifier.package_credited(&user, tokens_credited).await;
            HttpResponse::Ok().json(WebhookAck::handled())
        }
        Ok(ProcessOutcome::SubscriptionActivated {
            user,
            level,
            fallback_duration,
        }) => {
            if let Some(raw) = fallback_duration {
                notifier
                    .duration_fallback(user.telegram_id, &object.id, &raw)
                    .await;
            }
            notifier.subscription_activated(&user, level).await;
            HttpResponse::Ok().json(WebhookAck::handled())
        }
        Ok(ProcessOutcome::CancellationRecorded { telegram_id }) => {
            notifier
                .payment_canceled(telegram_id, &object.id, object.cancellation_details.as_ref())
                .await;
            HttpResponse::Ok().json(WebhookAck::handled())
        }
        Ok(ProcessOutcome::RefundRecorded) => {
            HttpResponse::Ok().json(WebhookAck::with_status("refund_recorded"))
        }
        Ok(ProcessOutcome::Duplicate) => {
            HttpResponse::Ok().json(WebhookAck::with_status("duplicate"))
        }
        Err(Error::Validation(msg)) => {
            warn!(payment_id = %object.id, error = %msg, "Webhook payload invalid");
            HttpResponse::BadRequest().json(ErrorResponse::new("invalid_payload", msg))
        }
        Err(Error::NotFound { entity, id }) => {
            warn!(payment_id = %object.id, entity = %entity, id = %id, "Webhook target not found");
            HttpResponse::NotFound().json(ErrorResponse::new(
                "not_found",
                format!("{} not found: {}", entity, id),
            ))
        }
        Err(e) => {
            error!(payment_id = %object.id, error = %e, "Webhook processing failed");
            notifier.dispatch_failed(&object.id, &e.to_string()).await;
            HttpResponse::InternalServerError().json(ErrorResponse::new(
                "internal_error",
                "Failed to process notification",
            ))
        }
    }
}
