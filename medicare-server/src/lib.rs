//! medicare-server - clinic backend with realtime page refresh
//!
//! REST handlers over a document store, session tokens checked per request,
//! and a WebSocket channel that tells open pages when to refetch.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod history;
pub mod mailer;
pub mod realtime;
pub mod sweep;

use axum::{
    http::Method,
    routing::{get, patch, post},
    Extension, Router,
};
use medicare_core::AccountKind;
use medicare_store::{DocumentStore, HistoryLog};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use auth::{SessionValidator, TokenSigner};
use handlers::{accounts, appointments, health, password_reset, patients, supply};
use mailer::Mailer;
use realtime::RealtimeHub;

/// Application state
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub history: Arc<Mutex<HistoryLog>>,
    pub hub: RealtimeHub,
    pub signer: TokenSigner,
    pub mailer: Mailer,
    pub config: config::ServerConfig,
}

impl AppState {
    /// Build the state and start the realtime hub. Must run inside a tokio runtime.
    pub fn new(
        config: config::ServerConfig,
        store: Arc<dyn DocumentStore>,
        history: HistoryLog,
    ) -> Result<Self, String> {
        let signer = TokenSigner::new(config.session_secret()?, config.auth.session_ttl_days);
        Ok(Self {
            store,
            history: Arc::new(Mutex::new(history)),
            hub: RealtimeHub::spawn(),
            signer,
            mailer: Mailer::new(config.mail.clone()),
            config,
        })
    }

    pub fn validator(&self) -> SessionValidator<'_> {
        SessionValidator::new(self.store.as_ref(), &self.signer)
    }
}

/// Routes shared by the three account collections
fn account_routes(kind: AccountKind) -> Router<Arc<AppState>> {
    let base = format!("/api/{}", kind.collection());
    Router::new()
        .route(
            &base,
            get(accounts::list)
                .put(accounts::sign_up)
                .post(accounts::sign_in),
        )
        .route(&format!("{}/authenticate", base), post(accounts::authenticate))
        .route(&format!("{}/deauthenticate", base), post(accounts::deauthenticate))
        .route(&format!("{}/bulk", base), post(accounts::bulk))
        .route(
            &format!("{}/{{id}}", base),
            get(accounts::read)
                .patch(accounts::update)
                .delete(accounts::remove),
        )
        .layer(Extension(kind))
}

/// Build the application router with all routes and middleware
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let account_router = AccountKind::LOOKUP_ORDER
        .into_iter()
        .fold(Router::new(), |router, kind| router.merge(account_routes(kind)));

    Router::new()
        .route("/health", get(health::health))
        .route("/ws", get(realtime::socket::ws_upgrade))
        .route("/api/active", get(health::active))
        .route("/api/active/{id}", get(health::active_one))
        // Accounts (rfid is static, so it wins over /api/users/{id})
        .merge(account_router)
        .route("/api/users/rfid", post(accounts::find_by_rfid))
        .route("/api/forgotPassword", post(password_reset::request_code))
        .route("/api/forgotPassword/verify", post(password_reset::verify))
        .route("/api/forgotPassword/reset", post(password_reset::reset))
        // Appointments
        .route(
            "/api/appointments",
            get(appointments::list).put(appointments::create),
        )
        .route("/api/appointments/{id}", get(appointments::read))
        .route("/api/appointments/user/{id}", get(appointments::list_for_user))
        .route("/api/appointments/approve/{id}", post(appointments::approve))
        .route(
            "/api/appointments/reject/{id}",
            post(appointments::reject_appointment),
        )
        .route("/api/appointments/cancel/{id}", post(appointments::cancel))
        // Patients
        .route("/api/patients", get(patients::list).put(patients::create))
        .route(
            "/api/patients/{id}",
            get(patients::read)
                .patch(patients::update)
                .delete(patients::remove),
        )
        .route(
            "/api/patients/{id}/medicalRecords",
            get(patients::list_records).put(patients::create_record),
        )
        .route(
            "/api/patients/{id}/medicalRecords/{rid}",
            patch(patients::update_record).delete(patients::remove_record),
        )
        // Supply
        .route(
            "/api/supply/categories",
            get(supply::list_categories).post(supply::create_category),
        )
        .route(
            "/api/supply/categories/{id}",
            get(supply::read_category)
                .patch(supply::update_category)
                .delete(supply::remove_category),
        )
        .route("/api/supply/categories/{id}/items", get(supply::category_items))
        .route(
            "/api/supply/items",
            get(supply::list_items).post(supply::create_item),
        )
        .route(
            "/api/supply/items/{id}",
            patch(supply::update_item).delete(supply::remove_item),
        )
        .route("/api/supply/barcode", get(supply::find_by_barcode))
        .route("/api/prices", get(supply::price_list))
        // History
        .route("/api/history", get(handlers::history::all))
        .route("/api/history/{route}", get(handlers::history::by_route))
        .route(
            "/api/history/{route}/{subroute}",
            get(handlers::history::by_subroute),
        )
        .route("/api/routes", get(handlers::history::routes))
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::session_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(50 * 1024 * 1024)) // 50MB
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
