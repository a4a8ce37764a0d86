// rest_api/src/lib.rs

use std::sync::Arc;

use anyhow::{Context, Error as AnyhowError};
use axum::{
    extract::FromRef,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use log::{error, info, warn};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};

use lib::storage_engine::{AccountStorageEngine, SledAccountStorage};
use lib::ClinicService;
use models::errors::{ClinicError, ClinicResult, ErrorKind};
use models::medical::{NewAccount, Role};
use security::{register_account, status_for_kind, AuthError, JwtKeys};

pub mod config;
pub mod extract;
pub mod handlers;

use crate::config::{BootstrapAdmin, ClinicApiConfig};

#[derive(Debug, Error)]
pub enum RestApiError {
    #[error(transparent)]
    Clinic(#[from] ClinicError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// A body, path or query string that could not be decoded.
    #[error("{0}")]
    BadRequest(String),
}

impl RestApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            RestApiError::Clinic(e) => (status_for_kind(e.kind()), e.kind().as_str()),
            RestApiError::Auth(e) => e.status_and_kind(),
            RestApiError::Join(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Infrastructure.as_str()),
            RestApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorKind::Validation.as_str()),
        }
    }
}

impl IntoResponse for RestApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "status": "error",
            "kind": kind,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

// Shared state for the Axum application
#[derive(Clone)]
pub struct AppState {
    pub clinic: Arc<ClinicService>,
    pub accounts: Arc<dyn AccountStorageEngine>,
    pub keys: JwtKeys,
}

impl AppState {
    pub fn new(clinic: ClinicService, keys: JwtKeys) -> Self {
        let accounts: Arc<dyn AccountStorageEngine> = Arc::new(SledAccountStorage::new(clinic.store()));
        AppState { clinic: Arc::new(clinic), accounts, keys }
    }

    /// Runs a synchronous clinic operation off the async runtime.
    pub async fn run_blocking<T, F>(&self, operation: F) -> Result<T, RestApiError>
    where
        F: FnOnce(&ClinicService) -> ClinicResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let clinic = Arc::clone(&self.clinic);
        Ok(tokio::task::spawn_blocking(move || operation(&clinic)).await??)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> JwtKeys {
        state.keys.clone()
    }
}

pub fn build_router(state: AppState) -> Router {
    use crate::handlers::*;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/api/v1/health", get(health_check_handler))
        .route("/api/v1/version", get(version_handler))
        // Accounts
        .route("/api/v1/auth/register", post(register_handler))
        .route("/api/v1/auth/login", post(login_handler))
        .route("/api/v1/auth/me", get(me_handler))
        // Patient
        .route("/api/v1/patient/examinations", post(register_examination_handler))
        .route("/api/v1/patient/queue", get(patient_queue_handler))
        .route("/api/v1/patient/visits", get(patient_visits_handler))
        .route(
            "/api/v1/patient/profile",
            get(patient_profile_handler).put(update_patient_profile_handler),
        )
        // Front desk
        .route("/api/v1/receptionist/queue", post(front_desk_register_handler))
        .route("/api/v1/receptionist/queue/next", get(next_queue_number_handler))
        .route("/api/v1/receptionist/queue/:id", patch(advance_queue_handler))
        .route("/api/v1/receptionist/queues/today", get(todays_queue_all_handler))
        .route(
            "/api/v1/receptionist/patients",
            get(list_patients_handler).post(register_walk_in_handler),
        )
        .route(
            "/api/v1/receptionist/patients/:id",
            get(patient_record_handler).put(staff_update_profile_handler),
        )
        // Doctor
        .route("/api/v1/doctor/queue", get(doctor_queue_handler))
        .route("/api/v1/doctor/queue/:id", patch(advance_queue_handler))
        .route("/api/v1/doctor/patients/:id", get(patient_record_handler).put(staff_update_profile_handler))
        .route("/api/v1/doctor/patients/:id/records", get(patient_history_handler))
        .route("/api/v1/doctor/visits", get(doctor_visits_handler))
        .route("/api/v1/doctor/visits/:id", get(get_visit_handler))
        .route("/api/v1/doctor/visits/:id/complete", post(complete_visit_handler))
        .route(
            "/api/v1/doctor/prescriptions",
            post(create_prescription_handler).get(doctor_prescriptions_handler),
        )
        // Pharmacy
        .route("/api/v1/pharmacist/prescriptions", get(list_prescriptions_handler))
        .route("/api/v1/pharmacist/prescriptions/:id", get(get_prescription_handler))
        .route("/api/v1/pharmacist/prescriptions/:id/approve", post(approve_prescription_handler))
        .route("/api/v1/pharmacist/prescriptions/:id/reject", post(reject_prescription_handler))
        .route("/api/v1/pharmacist/prescriptions/:id/dispense", post(dispense_prescription_handler))
        .route(
            "/api/v1/pharmacist/medicines",
            get(list_medicines_handler).post(create_medicine_handler),
        )
        .route(
            "/api/v1/pharmacist/medicines/:id",
            get(get_medicine_handler).put(update_medicine_handler),
        )
        .route("/api/v1/pharmacist/medicines/:id/restock", post(restock_handler))
        // Cashier
        .route("/api/v1/cashier/unsettled", get(unsettled_visits_handler))
        .route(
            "/api/v1/cashier/pending",
            get(pending_payments_handler).post(flag_pending_payment_handler),
        )
        .route(
            "/api/v1/cashier/transactions",
            get(settlement_history_handler).post(create_settlement_handler),
        )
        .route("/api/v1/cashier/transactions/:id/pay", post(mark_paid_handler))
        .with_state(state)
        .layer(cors)
}

/// Creates the configured administrator unless its email is already taken.
pub async fn ensure_bootstrap_admin(
    admin: &BootstrapAdmin,
    accounts: &dyn AccountStorageEngine,
) -> Result<(), RestApiError> {
    if accounts.get_account_by_email(&admin.email).await?.is_some() {
        return Ok(());
    }
    let summary = register_account(
        NewAccount {
            name: admin.name.clone(),
            email: admin.email.clone(),
            password: admin.password.clone(),
            phone: None,
            address: None,
            role: Role::Admin,
        },
        accounts,
    )
    .await?;
    info!("Created bootstrap administrator {} ({})", summary.email, summary.id);
    Ok(())
}

// Main function to start the REST API server
pub async fn start_server(
    config: ClinicApiConfig,
    shutdown_rx: oneshot::Receiver<()>,
) -> Result<(), AnyhowError> {
    let clinic = ClinicService::open(&config.storage).context("Failed to open clinic storage")?;
    let keys = JwtKeys::from_secret(config.rest_api.jwt_secret.as_bytes(), config.rest_api.token_ttl_hours);
    let app_state = AppState::new(clinic, keys);

    if let Some(admin) = &config.rest_api.bootstrap_admin {
        ensure_bootstrap_admin(admin, app_state.accounts.as_ref())
            .await
            .context("Failed to create bootstrap administrator")?;
    }

    let app = build_router(app_state.clone());

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to address: {}", addr))?;
    info!("Clinic REST API listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if shutdown_rx.await.is_err() {
                warn!("Shutdown sender dropped; stopping server");
            }
            info!("Received shutdown signal.");
        })
        .await
        .context("REST API server failed to start or run")?;

    app_state
        .clinic
        .store()
        .flush_async()
        .await
        .context("Failed to flush clinic storage on shutdown")?;
    info!("REST API server stopped.");
    Ok(())
}
