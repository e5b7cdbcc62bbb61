//! Route configuration

use actix_web::web;

use crate::handlers;

/// Configure all routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // Health check endpoint (no auth required)
            .route("/health", web::get().to(handlers::health_check))
            // OpenAPI JSON endpoint (no auth required)
            .route("/openapi.json", web::get().to(handlers::openapi_json))
            // Payment provider webhook (no auth - validated by source IP).
            // Registered as a resource so non-POST methods get 405.
            .service(
                web::resource("/payments/webhook")
                    .route(web::post().to(handlers::handle_payment_webhook)),
            ),
    );
}
