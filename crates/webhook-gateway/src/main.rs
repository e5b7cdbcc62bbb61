//! Payment webhook gateway
//!
//! HTTP server receiving payment-provider notifications for the Telegram
//! bot: validates origin, applies balance and subscription changes, keeps
//! the payment ledger and notifies users and the admin.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use shared::{db, Config};
use tracing_actix_web::TracingLogger;

mod handlers;
mod middleware;
mod models;
mod openapi;
mod repositories;
mod routes;
mod services;

use services::notifier::Notifier;
use services::telegram::BotApi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    shared::init_tracing();

    tracing::info!("Starting webhook gateway...");

    let config = Config::from_env().context("Failed to load configuration")?;

    let db_pool = db::create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;

    sqlx::migrate!()
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;

    db::check_health(&db_pool)
        .await
        .context("Database health check failed")?;

    let bot = Arc::new(BotApi::new(&config.telegram));
    let notifier = Arc::new(Notifier::new(bot, config.telegram.admin_chat_id));

    let server_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Webhook gateway listening on {}", server_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(notifier.clone()))
            .configure(routes::configure)
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind to {}", server_addr))?
    .run()
    .await
    .context("Server error")?;

    Ok(())
}
