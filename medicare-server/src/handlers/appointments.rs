use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use medicare_core::{
    appointment::validate_schedule, Account, AccountKind, Appointment, AppointmentStatus,
    HistoryRecord, MedicareError, NewAppointment, Result, Topic,
};
use medicare_store::document_store;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::{extract_body, new_id, parse, publish, reject, ApiResult};
use crate::auth::{require, Actor};
use crate::realtime::Notice;
use crate::AppState;

const COLLECTION: &str = "appointments";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RejectBody {
    reason: String,
}

/// Topics touched by any change to one appointment
fn appointment_notices(owner_id: &str) -> Vec<Notice> {
    vec![
        Notice::refresh(Topic::appointments()),
        Notice::refresh(Topic::appointments_of(owner_id)),
        Notice::refresh(Topic::account(AccountKind::User, owner_id)),
    ]
}

fn load_appointment(state: &AppState, id: &str) -> Result<Appointment> {
    document_store::load::<Appointment>(state.store.as_ref(), COLLECTION, id)?
        .ok_or_else(|| MedicareError::not_found("Appointment"))
}

fn mail_owner(state: &AppState, owner_id: &str, subject: &str, text: String) {
    match document_store::load::<Account>(state.store.as_ref(), AccountKind::User.collection(), owner_id) {
        Ok(Some(owner)) => {
            state.mailer.send(&owner.email, subject, text);
        }
        Ok(None) => tracing::debug!(user = %owner_id, "Appointment owner gone, no mail sent"),
        Err(e) => tracing::warn!(user = %owner_id, "Could not load appointment owner: {}", e),
    }
}

/// GET /api/appointments
pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult {
    let appointments =
        document_store::load_all::<Appointment>(state.store.as_ref(), COLLECTION).map_err(reject)?;

    let mut views = Map::new();
    for appointment in appointments {
        let view = serde_json::to_value(&appointment).map_err(reject)?;
        views.insert(appointment.id, view);
    }
    Ok(Json(Value::Object(views)).into_response())
}

/// GET /api/appointments/{id}
pub async fn read(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let appointment = load_appointment(&state, &id).map_err(reject)?;
    Ok(Json(appointment).into_response())
}

/// GET /api/appointments/user/{id}
pub async fn list_for_user(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    owned_by(&state, &id)
        .map(|appointments| Json(appointments).into_response())
        .map_err(reject)
}

fn owned_by(state: &AppState, user_id: &str) -> Result<Vec<Appointment>> {
    if state
        .store
        .get(AccountKind::User.collection(), user_id)?
        .is_none()
    {
        return Err(MedicareError::not_found("User"));
    }

    let mut appointments = Vec::new();
    for (id, doc) in state.store.find_by(COLLECTION, "user/id", &json!(user_id))? {
        appointments.push(document_store::decode::<Appointment>(COLLECTION, &id, doc)?);
    }
    Ok(appointments)
}

/// PUT /api/appointments
pub async fn create(State(state): State<Arc<AppState>>, request: Request) -> ApiResult {
    let actor = Actor::from_request(&request);
    let body = extract_body(request).await?;
    book(&state, actor.as_ref(), body).map_err(reject)
}

fn book(state: &AppState, actor: Option<&Actor>, body: Value) -> Result<Response> {
    require(actor, &AccountKind::LOOKUP_ORDER)?;

    let request: NewAppointment = parse(body)?;
    request.validate_fields()?;

    if state
        .store
        .get(AccountKind::User.collection(), &request.user.id)?
        .is_none()
    {
        return Err(MedicareError::not_found("User"));
    }

    let now = chrono::Local::now().naive_local();
    let slot = validate_schedule(
        request.appointment.service,
        &request.appointment.date,
        &request.appointment.time,
        now,
    )?;

    let appointment = request.into_appointment(new_id(), chrono::Utc::now().to_rfc3339());
    document_store::save(state.store.as_ref(), COLLECTION, &appointment.id, &appointment)?;

    let owner_id = appointment.owner_id().to_string();
    let service = appointment.appointment.service.as_str();
    publish(
        state,
        actor,
        appointment_notices(&owner_id),
        HistoryRecord::new(
            COLLECTION,
            "booking",
            "create",
            format!(
                "Booked {} appointment for \"{}\" on {}",
                service, appointment.patient.name, slot
            ),
        ),
    );
    mail_owner(
        state,
        &owner_id,
        "New Appointment",
        format!(
            "Your {} appointment on {} at {} has been received and is pending approval.",
            service, appointment.appointment.date, appointment.appointment.time
        ),
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Appointment created successfully",
            "appointment": appointment,
        })),
    )
        .into_response())
}

/// POST /api/appointments/approve/{id}
pub async fn approve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    transition(&state, actor.as_ref(), &id, AppointmentStatus::Approved, None).map_err(reject)
}

/// POST /api/appointments/reject/{id}
pub async fn reject_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    let body = extract_body(request).await?;
    let result = parse::<RejectBody>(body).and_then(|body| {
        if body.reason.trim().is_empty() {
            return Err(MedicareError::validation("A reason is required"));
        }
        transition(&state, actor.as_ref(), &id, AppointmentStatus::Rejected, Some(body.reason))
    });
    result.map_err(reject)
}

/// POST /api/appointments/cancel/{id}
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    transition(&state, actor.as_ref(), &id, AppointmentStatus::Cancelled, None).map_err(reject)
}

fn transition(
    state: &AppState,
    actor: Option<&Actor>,
    id: &str,
    to: AppointmentStatus,
    reason: Option<String>,
) -> Result<Response> {
    let actor = match to {
        AppointmentStatus::Cancelled => require(actor, &AccountKind::LOOKUP_ORDER)?,
        _ => require(actor, &[AccountKind::Staff, AccountKind::Doctor])?,
    };

    let mut appointment = load_appointment(state, id)?;
    if actor.is(AccountKind::User) && appointment.owner_id() != actor.id {
        return Err(MedicareError::forbidden("Not allowed to cancel this appointment"));
    }

    let from = appointment.status();
    appointment.apply(to, reason)?;
    document_store::save(state.store.as_ref(), COLLECTION, &appointment.id, &appointment)?;

    tracing::info!(appointment = %id, from = %from, to = %to, actor = %actor.id, "Appointment status changed");

    let owner_id = appointment.owner_id().to_string();
    let action = match to {
        AppointmentStatus::Approved => "approve",
        AppointmentStatus::Rejected => "reject",
        _ => "cancel",
    };
    publish(
        state,
        Some(actor),
        appointment_notices(&owner_id),
        HistoryRecord::new(
            COLLECTION,
            "booking",
            action,
            format!(
                "Appointment of \"{}\" moved from {} to {}",
                appointment.patient.name, from, to
            ),
        ),
    );

    let booking = &appointment.appointment;
    let text = match to {
        AppointmentStatus::Rejected => format!(
            "Your {} appointment on {} at {} has been rejected. Reason: {}",
            booking.service.as_str(),
            booking.date,
            booking.time,
            booking.rejected_reason
        ),
        _ => format!(
            "Your {} appointment on {} at {} has been {}.",
            booking.service.as_str(),
            booking.date,
            booking.time,
            to
        ),
    };
    mail_owner(state, &owner_id, "Appointment Update", text);

    Ok(Json(json!({
        "message": format!("Appointment {} successfully", to),
        "appointment": appointment,
    }))
    .into_response())
}
