use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use medicare_core::{
    patient::{MedicalRecordPatch, NewMedicalRecord, NewPatient, PatientPatch},
    AccountKind, HistoryRecord, MedicareError, Patient, Result, Topic,
};
use medicare_store::document_store;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::{extract_body, message, new_id, parse, publish, reject, ApiResult};
use crate::auth::{require, Actor};
use crate::realtime::Notice;
use crate::AppState;

const COLLECTION: &str = "patients";
const CLINICIANS: [AccountKind; 2] = [AccountKind::Staff, AccountKind::Doctor];

fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

fn load_patient(state: &AppState, id: &str) -> Result<Patient> {
    document_store::load::<Patient>(state.store.as_ref(), COLLECTION, id)?
        .ok_or_else(|| MedicareError::not_found("Patient"))
}

fn save_patient(state: &AppState, patient: &Patient) -> Result<()> {
    document_store::save(state.store.as_ref(), COLLECTION, &patient.id, patient)?;
    Ok(())
}

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult {
    let patients = document_store::load_all::<Patient>(state.store.as_ref(), COLLECTION).map_err(reject)?;

    let mut views = Map::new();
    for patient in patients {
        let view = serde_json::to_value(&patient).map_err(reject)?;
        views.insert(patient.id, view);
    }
    Ok(Json(Value::Object(views)).into_response())
}

pub async fn read(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let patient = load_patient(&state, &id).map_err(reject)?;
    Ok(Json(patient).into_response())
}

/// PUT /api/patients
pub async fn create(State(state): State<Arc<AppState>>, request: Request) -> ApiResult {
    let actor = Actor::from_request(&request);
    let body = extract_body(request).await?;
    register(&state, actor.as_ref(), body).map_err(reject)
}

fn register(state: &AppState, actor: Option<&Actor>, body: Value) -> Result<Response> {
    require(actor, &CLINICIANS)?;
    let request: NewPatient = parse(body)?;
    let patient = request.into_patient(new_id(), &today(), new_id)?;
    save_patient(state, &patient)?;

    publish(
        state,
        actor,
        vec![Notice::refresh(Topic::patients())],
        HistoryRecord::new(
            COLLECTION,
            "profile",
            "create",
            format!("Patient: \"{}\" Created", patient.name),
        ),
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Patient created successfully",
            "patient": patient,
        })),
    )
        .into_response())
}

/// PATCH /api/patients/{id}
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    let body = extract_body(request).await?;
    amend(&state, actor.as_ref(), &id, body).map_err(reject)
}

fn amend(state: &AppState, actor: Option<&Actor>, id: &str, body: Value) -> Result<Response> {
    require(actor, &CLINICIANS)?;
    let patch: PatientPatch = parse(body)?;
    let mut patient = load_patient(state, id)?;
    patch.apply(&mut patient)?;
    save_patient(state, &patient)?;

    publish(
        state,
        actor,
        vec![
            Notice::refresh(Topic::patients()),
            Notice::refresh(Topic::patient(id)),
        ],
        HistoryRecord::new(
            COLLECTION,
            "profile",
            "update",
            format!("Patient: \"{}\" Updated", patient.name),
        ),
    );

    Ok(Json(json!({
        "message": "Patient updated successfully",
        "patient": patient,
    }))
    .into_response())
}

/// DELETE /api/patients/{id}
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    discharge(&state, actor.as_ref(), &id).map_err(reject)
}

fn discharge(state: &AppState, actor: Option<&Actor>, id: &str) -> Result<Response> {
    require(actor, &CLINICIANS)?;
    let patient = load_patient(state, id)?;
    state.store.delete(COLLECTION, id)?;

    publish(
        state,
        actor,
        vec![
            Notice::refresh(Topic::patients()),
            Notice::redirect(Topic::patient(id)),
        ],
        HistoryRecord::new(
            COLLECTION,
            "profile",
            "delete",
            format!("Patient: \"{}\" Deleted", patient.name),
        ),
    );

    Ok(message(StatusCode::OK, "Patient deleted successfully"))
}

/// GET /api/patients/{id}/medicalRecords
pub async fn list_records(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let patient = load_patient(&state, &id).map_err(reject)?;
    Ok(Json(patient.medical_records).into_response())
}

/// PUT /api/patients/{id}/medicalRecords
pub async fn create_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    let body = extract_body(request).await?;
    add_record(&state, actor.as_ref(), &id, body).map_err(reject)
}

fn add_record(state: &AppState, actor: Option<&Actor>, id: &str, body: Value) -> Result<Response> {
    require(actor, &CLINICIANS)?;
    let request: NewMedicalRecord = parse(body)?;
    let mut patient = load_patient(state, id)?;

    let record = request.into_record(new_id(), &today())?;
    patient.medical_records.insert(record.id.clone(), record.clone());
    save_patient(state, &patient)?;

    publish(
        state,
        actor,
        vec![Notice::refresh(Topic::patient(id))],
        HistoryRecord::new(
            COLLECTION,
            "medicalRecords",
            "create",
            format!("Medical record added for \"{}\"", patient.name),
        ),
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Medical record created successfully",
            "record": record,
        })),
    )
        .into_response())
}

/// PATCH /api/patients/{id}/medicalRecords/{rid}
pub async fn update_record(
    State(state): State<Arc<AppState>>,
    Path((id, record_id)): Path<(String, String)>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    let body = extract_body(request).await?;
    amend_record(&state, actor.as_ref(), &id, &record_id, body).map_err(reject)
}

fn amend_record(
    state: &AppState,
    actor: Option<&Actor>,
    id: &str,
    record_id: &str,
    body: Value,
) -> Result<Response> {
    require(actor, &CLINICIANS)?;
    let patch: MedicalRecordPatch = parse(body)?;
    let mut patient = load_patient(state, id)?;

    let record = patient
        .medical_records
        .get_mut(record_id)
        .ok_or_else(|| MedicareError::not_found("Medical record"))?;
    patch.apply(record)?;
    let record = record.clone();
    save_patient(state, &patient)?;

    publish(
        state,
        actor,
        vec![
            Notice::refresh(Topic::patient(id)),
            Notice::refresh(Topic::medical_record(id, record_id)),
        ],
        HistoryRecord::new(
            COLLECTION,
            "medicalRecords",
            "update",
            format!("Medical record of \"{}\" updated", patient.name),
        ),
    );

    Ok(Json(json!({
        "message": "Medical record updated successfully",
        "record": record,
    }))
    .into_response())
}

/// DELETE /api/patients/{id}/medicalRecords/{rid}
pub async fn remove_record(
    State(state): State<Arc<AppState>>,
    Path((id, record_id)): Path<(String, String)>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    drop_record(&state, actor.as_ref(), &id, &record_id).map_err(reject)
}

fn drop_record(state: &AppState, actor: Option<&Actor>, id: &str, record_id: &str) -> Result<Response> {
    require(actor, &CLINICIANS)?;
    let mut patient = load_patient(state, id)?;
    if patient.medical_records.remove(record_id).is_none() {
        return Err(MedicareError::not_found("Medical record"));
    }
    save_patient(state, &patient)?;

    publish(
        state,
        actor,
        vec![
            Notice::refresh(Topic::patient(id)),
            Notice::redirect(Topic::medical_record(id, record_id)),
        ],
        HistoryRecord::new(
            COLLECTION,
            "medicalRecords",
            "delete",
            format!("Medical record of \"{}\" deleted", patient.name),
        ),
    );

    Ok(message(StatusCode::OK, "Medical record deleted successfully"))
}
