// rest_api/src/handlers.rs

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use lib::{ExaminationRequest, NewPrescription, RegistrationReceipt, SettlementRequest, VisitSummary};
use models::errors::{ClinicError, ClinicResult, Entity};
use models::identifiers::{AccountId, MedicineId, PrescriptionId, QueueId, SettlementId, VisitId};
use models::medical::{
    AccountSummary, Action, Examination, Login, Medicine, MedicineUpdate, NewAccount, NewMedicine,
    PatientProfile, PatientProfileUpdate, Prescription, PrescriptionStatus, QueuePosition,
    QueueStatus, QueueTicket, Role, Settlement, Visit,
};
use security::{login, register_account, register_patient, AuthError, AuthenticatedActor, LoginResponse};

use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::{AppState, RestApiError};

type Created<T> = (StatusCode, Json<T>);

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Defaults to `patient`; any other role needs an administrator's token.
    #[serde(default)]
    pub role: Option<Role>,
}

/// A walk-in patient's account and profile, entered at the front desk.
#[derive(Debug, Deserialize)]
pub struct WalkInRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(flatten)]
    pub profile: PatientProfileUpdate,
}

/// A patient's account together with their profile.
#[derive(Debug, Serialize)]
pub struct PatientRecord {
    pub account: AccountSummary,
    pub profile: PatientProfile,
}

#[derive(Debug, Deserialize)]
pub struct FrontDeskRegistration {
    pub patient_id: AccountId,
    pub complaint: String,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceQueueRequest {
    pub status: QueueStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct VisitFilter {
    /// Every doctor's pending worklist instead of the caller's own history.
    #[serde(default)]
    pub pending: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PrescriptionFilter {
    #[serde(default)]
    pub status: Option<PrescriptionStatus>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MedicineFilter {
    #[serde(default)]
    pub low_stock: bool,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub delta: i64,
}

/// A completed visit still waiting for the cashier.
#[derive(Debug, Serialize)]
pub struct UnsettledVisit {
    pub visit: Visit,
    pub suggested_total: u64,
}

pub async fn health_check_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok", "message": "REST API is healthy"})))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"version": env!("CARGO_PKG_VERSION")})))
}

// --- Accounts ---

pub async fn register_handler(
    State(state): State<AppState>,
    caller: Option<AuthenticatedActor>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<Created<AccountSummary>, RestApiError> {
    let role = payload.role.unwrap_or(Role::Patient);
    if role != Role::Patient {
        let AuthenticatedActor(actor) = caller.ok_or(AuthError::MissingToken)?;
        actor.authorize(Action::ManageStaff)?;
    }

    let registration = NewAccount {
        name: payload.name,
        email: payload.email,
        password: payload.password,
        phone: payload.phone,
        address: payload.address,
        role,
    };
    let summary = register_account(registration, state.accounts.as_ref()).await?;
    info!("Registered {} account {}", summary.role, summary.id);
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<Login>,
) -> Result<Json<LoginResponse>, RestApiError> {
    let response = login(payload, state.accounts.as_ref(), &state.keys).await?;
    Ok(Json(response))
}

pub async fn me_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<AccountSummary>, RestApiError> {
    let account = state
        .accounts
        .get_account(actor.account_id)
        .await?
        .ok_or_else(|| ClinicError::not_found(Entity::Account, actor.account_id))?;
    Ok(Json(account.summary()))
}

// --- Patient ---

pub async fn register_examination_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiJson(request): ApiJson<ExaminationRequest>,
) -> Result<Created<RegistrationReceipt>, RestApiError> {
    let receipt = state.run_blocking(move |clinic| clinic.register_self(&actor, &request)).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn patient_queue_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<Option<QueuePosition>>, RestApiError> {
    let position = state.run_blocking(move |clinic| clinic.patient_queue_status(&actor)).await?;
    Ok(Json(position))
}

pub async fn patient_visits_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<Vec<VisitSummary>>, RestApiError> {
    let visits = state.run_blocking(move |clinic| clinic.patient_visits(&actor)).await?;
    Ok(Json(visits))
}

pub async fn patient_profile_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<PatientProfile>, RestApiError> {
    actor.authorize(Action::ViewOwnRecords)?;
    let profile = state
        .accounts
        .get_patient_profile(actor.account_id)
        .await?
        .ok_or_else(|| ClinicError::not_found(Entity::PatientProfile, actor.account_id))?;
    Ok(Json(profile))
}

pub async fn update_patient_profile_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiJson(update): ApiJson<PatientProfileUpdate>,
) -> Result<Json<PatientProfile>, RestApiError> {
    actor.authorize(Action::ViewOwnRecords)?;
    let profile = state.accounts.update_patient_profile(actor.account_id, update).await?;
    Ok(Json(profile))
}

// --- Front desk ---

pub async fn front_desk_register_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiJson(request): ApiJson<FrontDeskRegistration>,
) -> Result<Created<RegistrationReceipt>, RestApiError> {
    let receipt = state
        .run_blocking(move |clinic| clinic.register_for_patient(&actor, request.patient_id, &request.complaint))
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn next_queue_number_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<Value>, RestApiError> {
    let next = state.run_blocking(move |clinic| clinic.next_queue_number(&actor)).await?;
    Ok(Json(json!({"next_queue_number": next})))
}

pub async fn advance_queue_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(id): ApiPath<u64>,
    ApiJson(request): ApiJson<AdvanceQueueRequest>,
) -> Result<Json<QueueTicket>, RestApiError> {
    let ticket = state
        .run_blocking(move |clinic| clinic.advance_queue(&actor, QueueId(id), request.status))
        .await?;
    Ok(Json(ticket))
}

pub async fn todays_queue_all_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<Vec<QueueTicket>>, RestApiError> {
    let tickets = state.run_blocking(move |clinic| clinic.todays_queue_all(&actor)).await?;
    Ok(Json(tickets))
}

pub async fn list_patients_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<Vec<AccountSummary>>, RestApiError> {
    actor.authorize(Action::ManagePatients)?;
    let patients = state.accounts.list_accounts(Some(Role::Patient)).await?;
    Ok(Json(patients))
}

pub async fn register_walk_in_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiJson(payload): ApiJson<WalkInRegistration>,
) -> Result<Created<PatientRecord>, RestApiError> {
    actor.authorize(Action::ManagePatients)?;
    let registration = NewAccount {
        name: payload.name,
        email: payload.email,
        password: payload.password,
        phone: payload.phone,
        address: payload.address,
        role: Role::Patient,
    };
    let account = register_patient(registration, payload.profile, state.accounts.as_ref()).await?;
    let profile = state
        .accounts
        .get_patient_profile(account.id)
        .await?
        .ok_or_else(|| ClinicError::not_found(Entity::PatientProfile, account.id))?;
    info!("Staff {} registered walk-in patient {}", actor.account_id, account.id);
    Ok((StatusCode::CREATED, Json(PatientRecord { account, profile })))
}

pub async fn patient_record_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(patient_id): ApiPath<AccountId>,
) -> Result<Json<PatientRecord>, RestApiError> {
    actor.authorize(Action::ManagePatients)?;
    let account = patient_account(&state, patient_id).await?;
    let profile = state
        .accounts
        .get_patient_profile(patient_id)
        .await?
        .ok_or_else(|| ClinicError::not_found(Entity::PatientProfile, patient_id))?;
    Ok(Json(PatientRecord { account, profile }))
}

pub async fn staff_update_profile_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(patient_id): ApiPath<AccountId>,
    ApiJson(update): ApiJson<PatientProfileUpdate>,
) -> Result<Json<PatientRecord>, RestApiError> {
    actor.authorize(Action::ManagePatients)?;
    let account = patient_account(&state, patient_id).await?;
    let profile = state.accounts.update_patient_profile(patient_id, update).await?;
    info!("Staff {} updated the profile of patient {}", actor.account_id, patient_id);
    Ok(Json(PatientRecord { account, profile }))
}

// Staff routes address patients only; other accounts read as missing.
async fn patient_account(state: &AppState, patient_id: AccountId) -> Result<AccountSummary, RestApiError> {
    match state.accounts.get_account(patient_id).await? {
        Some(account) if account.role == Role::Patient => Ok(account.summary()),
        _ => Err(ClinicError::not_found(Entity::PatientProfile, patient_id).into()),
    }
}

// --- Doctor ---

pub async fn patient_history_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(patient_id): ApiPath<AccountId>,
) -> Result<Json<Vec<VisitSummary>>, RestApiError> {
    actor.authorize(Action::ViewVisits)?;
    patient_account(&state, patient_id).await?;
    let history = state
        .run_blocking(move |clinic| clinic.patient_history(&actor, patient_id))
        .await?;
    Ok(Json(history))
}

pub async fn doctor_queue_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<Vec<QueuePosition>>, RestApiError> {
    let line = state.run_blocking(move |clinic| clinic.todays_queue(&actor)).await?;
    Ok(Json(line))
}

pub async fn doctor_visits_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiQuery(filter): ApiQuery<VisitFilter>,
) -> Result<Json<Vec<Visit>>, RestApiError> {
    let visits = state
        .run_blocking(move |clinic| {
            if filter.pending {
                clinic.pending_visits(&actor)
            } else {
                clinic.doctor_visits(&actor)
            }
        })
        .await?;
    Ok(Json(visits))
}

pub async fn get_visit_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Visit>, RestApiError> {
    let visit = state.run_blocking(move |clinic| clinic.get_visit(&actor, VisitId(id))).await?;
    Ok(Json(visit))
}

pub async fn complete_visit_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(id): ApiPath<u64>,
    ApiJson(exam): ApiJson<Examination>,
) -> Result<Json<Visit>, RestApiError> {
    let visit = state
        .run_blocking(move |clinic| clinic.complete_visit(&actor, VisitId(id), &exam))
        .await?;
    Ok(Json(visit))
}

pub async fn create_prescription_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiJson(request): ApiJson<NewPrescription>,
) -> Result<Created<Prescription>, RestApiError> {
    let prescription = state
        .run_blocking(move |clinic| clinic.create_prescription(&actor, &request))
        .await?;
    Ok((StatusCode::CREATED, Json(prescription)))
}

pub async fn doctor_prescriptions_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<Vec<Prescription>>, RestApiError> {
    let prescriptions = state.run_blocking(move |clinic| clinic.doctor_prescriptions(&actor)).await?;
    Ok(Json(prescriptions))
}

// --- Pharmacy ---

pub async fn list_prescriptions_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiQuery(filter): ApiQuery<PrescriptionFilter>,
) -> Result<Json<Vec<Prescription>>, RestApiError> {
    let prescriptions = state
        .run_blocking(move |clinic| clinic.list_prescriptions(&actor, filter.status))
        .await?;
    Ok(Json(prescriptions))
}

pub async fn get_prescription_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Prescription>, RestApiError> {
    let prescription = state
        .run_blocking(move |clinic| clinic.get_prescription(&actor, PrescriptionId(id)))
        .await?;
    Ok(Json(prescription))
}

pub async fn approve_prescription_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Prescription>, RestApiError> {
    let prescription = state
        .run_blocking(move |clinic| clinic.approve_prescription(&actor, PrescriptionId(id)))
        .await?;
    Ok(Json(prescription))
}

pub async fn reject_prescription_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(id): ApiPath<u64>,
    ApiJson(request): ApiJson<RejectRequest>,
) -> Result<Json<Prescription>, RestApiError> {
    let prescription = state
        .run_blocking(move |clinic| clinic.reject_prescription(&actor, PrescriptionId(id), &request.reason))
        .await?;
    Ok(Json(prescription))
}

pub async fn dispense_prescription_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Prescription>, RestApiError> {
    let prescription = state
        .run_blocking(move |clinic| clinic.dispense_prescription(&actor, PrescriptionId(id)))
        .await?;
    Ok(Json(prescription))
}

pub async fn list_medicines_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiQuery(filter): ApiQuery<MedicineFilter>,
) -> Result<Json<Vec<Medicine>>, RestApiError> {
    let medicines = state
        .run_blocking(move |clinic| {
            if filter.low_stock {
                clinic.low_stock(&actor)
            } else {
                clinic.list_medicines(&actor)
            }
        })
        .await?;
    Ok(Json(medicines))
}

pub async fn create_medicine_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiJson(new): ApiJson<NewMedicine>,
) -> Result<Created<Medicine>, RestApiError> {
    let medicine = state.run_blocking(move |clinic| clinic.create_medicine(&actor, new)).await?;
    Ok((StatusCode::CREATED, Json(medicine)))
}

pub async fn get_medicine_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Medicine>, RestApiError> {
    let medicine = state.run_blocking(move |clinic| clinic.get_medicine(&actor, MedicineId(id))).await?;
    Ok(Json(medicine))
}

pub async fn update_medicine_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(id): ApiPath<u64>,
    ApiJson(update): ApiJson<MedicineUpdate>,
) -> Result<Json<Medicine>, RestApiError> {
    let medicine = state
        .run_blocking(move |clinic| clinic.update_medicine(&actor, MedicineId(id), update))
        .await?;
    Ok(Json(medicine))
}

pub async fn restock_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(id): ApiPath<u64>,
    ApiJson(request): ApiJson<RestockRequest>,
) -> Result<Json<Medicine>, RestApiError> {
    let medicine = state
        .run_blocking(move |clinic| clinic.restock(&actor, MedicineId(id), request.delta))
        .await?;
    Ok(Json(medicine))
}

// --- Cashier ---

pub async fn unsettled_visits_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<Vec<UnsettledVisit>>, RestApiError> {
    let visits = state
        .run_blocking(move |clinic| {
            clinic
                .unsettled_visits(&actor)?
                .into_iter()
                .map(|visit| {
                    let suggested_total = clinic.suggested_total(&actor, visit.id)?;
                    Ok(UnsettledVisit { visit, suggested_total })
                })
                .collect::<ClinicResult<Vec<_>>>()
        })
        .await?;
    Ok(Json(visits))
}

pub async fn pending_payments_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<Vec<Settlement>>, RestApiError> {
    let pending = state.run_blocking(move |clinic| clinic.pending_payments(&actor)).await?;
    Ok(Json(pending))
}

pub async fn flag_pending_payment_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiJson(request): ApiJson<SettlementRequest>,
) -> Result<Created<Settlement>, RestApiError> {
    let settlement = state
        .run_blocking(move |clinic| clinic.flag_pending_payment(&actor, &request))
        .await?;
    Ok((StatusCode::CREATED, Json(settlement)))
}

pub async fn settlement_history_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<Vec<Settlement>>, RestApiError> {
    let history = state.run_blocking(move |clinic| clinic.settlement_history(&actor)).await?;
    Ok(Json(history))
}

pub async fn create_settlement_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiJson(request): ApiJson<SettlementRequest>,
) -> Result<Created<Settlement>, RestApiError> {
    let settlement = state
        .run_blocking(move |clinic| clinic.create_settlement(&actor, &request))
        .await?;
    Ok((StatusCode::CREATED, Json(settlement)))
}

pub async fn mark_paid_handler(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Settlement>, RestApiError> {
    let settlement = state
        .run_blocking(move |clinic| clinic.mark_paid(&actor, SettlementId(id)))
        .await?;
    Ok(Json(settlement))
}
