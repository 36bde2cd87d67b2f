//! HTTP API Layer
//!
//! REST API of the payment ledger using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for payments, debt, methods and the gateway callback
//! - **Middleware**: Bearer-token authentication and audit logging
//! - **DTOs**: Request/Response bodies; money always travels as decimal strings
//! - **Error Handling**: Ledger errors mapped onto consistent error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let app = create_router(AppState::new(service, config));
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use domain_billing::PaymentService;

use crate::config::ApiConfig;
use crate::handlers::{debt, documents, gateway, health, methods, payments};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PaymentService>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(service: PaymentService, config: ApiConfig) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
        }
    }
}

/// Creates the main API router
///
/// Health and the provider IPN are public; everything under `/api/v1`
/// requires a bearer token.
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/gateway/vnpay/ipn", get(gateway::vnpay_ipn));

    let document_routes = Router::new()
        .route("/", post(documents::sync_document))
        .route("/:kind/:id/payments", post(payments::record_payment))
        .route("/:kind/:id/status", get(payments::get_status))
        .route("/:kind/:id/transactions", get(payments::list_transactions))
        .route("/:kind/:id/gateway-checkout", post(payments::gateway_checkout));

    let transaction_routes = Router::new()
        .route("/:id", get(payments::get_transaction))
        .route("/:id/confirm", post(payments::confirm))
        .route("/:id/reject", post(payments::reject));

    let debt_routes = Router::new()
        .route("/:owner_kind", get(debt::summarize_all))
        .route("/:owner_kind/:owner_id", get(debt::owner_summary))
        .route("/:owner_kind/:owner_id/aging", get(debt::dealer_aging));

    let method_routes = Router::new()
        .route("/", get(methods::list_methods).post(methods::create_method))
        .route("/:id", patch(methods::update_method));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/documents", document_routes)
        .nest("/transactions", transaction_routes)
        .nest("/debt", debt_routes)
        .nest("/payment-methods", method_routes)
        .route("/admin/gateway/expire", post(payments::expire_gateway))
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
