//! Payment webhook gateway library
//!
//! Exposes the gateway's modules for integration testing.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod repositories;
pub mod routes;
pub mod services;
