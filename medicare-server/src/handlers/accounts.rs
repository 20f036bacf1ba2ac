//! Account handlers shared by `/api/users`, `/api/staffs` and `/api/doctors`.
//!
//! The collection is selected by the `AccountKind` extension each router
//! attaches.

use axum::{
    extract::{Extension, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use medicare_core::{Account, AccountKind, HistoryRecord, Membership, MedicareError, Profile, Result, Topic};
use medicare_store::document_store;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::{extract_body, message, new_id, parse, publish, reject, ApiResult};
use crate::auth::{hash_password, require_self_or_staff, verify_password, Actor};
use crate::realtime::Notice;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SignUp {
    email: String,
    name: String,
    password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SignIn {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    id: String,
    #[serde(rename = "sessionKey")]
    session_key: String,
}

#[derive(Debug, Deserialize)]
struct BulkBody {
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RfidBody {
    rfid: String,
}

#[derive(Debug, Deserialize)]
struct MembershipInput {
    rfid: String,
    until: String,
}

fn credentials_view(kind: AccountKind, id: &str, session_key: &str) -> Value {
    json!({
        "type": kind.as_str(),
        "id": id,
        "sessionKey": session_key,
    })
}

fn load_account(state: &AppState, kind: AccountKind, id: &str) -> Result<Account> {
    document_store::load::<Account>(state.store.as_ref(), kind.collection(), id)?
        .ok_or_else(|| MedicareError::not_found(kind.label()))
}

fn save_account(state: &AppState, kind: AccountKind, account: &Account) -> Result<()> {
    document_store::save(state.store.as_ref(), kind.collection(), &account.id, account)?;
    Ok(())
}

/// Whether any account other than (`kind`, `id`) uses the email.
fn email_taken(state: &AppState, email: &str, except: Option<(AccountKind, &str)>) -> Result<bool> {
    // Staff first, then doctors, then users
    for kind in [AccountKind::Staff, AccountKind::Doctor, AccountKind::User] {
        let matches = state
            .store
            .find_by(kind.collection(), "email", &json!(email))?;
        if matches
            .iter()
            .any(|(id, _)| except != Some((kind, id.as_str())))
        {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Sign up (PUT /api/{collection})
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<AccountKind>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    let body = extract_body(request).await?;
    create_account(&state, kind, actor.as_ref(), body).map_err(reject)
}

fn create_account(state: &AppState, kind: AccountKind, actor: Option<&Actor>, body: Value) -> Result<Response> {
    let request: SignUp = parse(body)?;
    if request.email.trim().is_empty() || request.name.trim().is_empty() || request.password.is_empty() {
        return Err(MedicareError::validation("Invalid request body"));
    }

    // Not atomic: two concurrent sign-ups with one email can both pass
    if email_taken(state, &request.email, None)? {
        return Err(MedicareError::conflict("Account already exists"));
    }

    let password_hash = hash_password(&request.password).map_err(MedicareError::Storage)?;
    let account = Account::new(new_id(), request.email, request.name, password_hash);
    save_account(state, kind, &account)?;

    let view = account.typed_view(kind);
    publish(
        state,
        actor,
        vec![Notice::refresh(Topic::accounts(kind))],
        HistoryRecord::new(
            kind.collection(),
            "sign",
            "sign-up",
            format!("{}: \"{}\" Signed Up", kind.label(), account.name),
        )
        .by(Some(view.clone())),
    );
    state.mailer.send(
        &account.email,
        "Medicare Account",
        format!("Welcome to Medicare, {}! Your account has been created.", account.name),
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("{} created successfully", kind.label()),
            "account": view,
        })),
    )
        .into_response())
}

/// Sign in (POST /api/{collection})
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<AccountKind>,
    request: Request,
) -> ApiResult {
    let body = extract_body(request).await?;
    open_session(&state, kind, body).map_err(reject)
}

fn open_session(state: &AppState, kind: AccountKind, body: Value) -> Result<Response> {
    let request: SignIn = parse(body)?;
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(MedicareError::validation("Invalid request body"));
    }

    let (id, doc) = state
        .store
        .find_by(kind.collection(), "email", &json!(request.email))?
        .into_iter()
        .next()
        .ok_or_else(|| MedicareError::not_found(kind.label()))?;
    let mut account: Account = document_store::decode(kind.collection(), &id, doc)?;

    if !verify_password(&request.password, &account.credentials.password_hash) {
        tracing::warn!(collection = kind.collection(), id = %account.id, "Sign-in with wrong password");
        return Err(MedicareError::unauthorized("Invalid password"));
    }

    let session_key = state
        .signer
        .issue(&account.id)
        .map_err(|e| MedicareError::Storage(e.to_string()))?;
    account.add_session(session_key.clone());
    save_account(state, kind, &account)?;

    crate::history::record(
        &state.history,
        HistoryRecord::new(
            kind.collection(),
            "sign",
            "sign-in",
            format!("{}: \"{}\" Signed In", kind.label(), account.name),
        )
        .by(Some(account.typed_view(kind))),
    );
    state.mailer.send(
        &account.email,
        "Sign In",
        format!("A new sign-in to your Medicare account was made on {}.", chrono::Utc::now().to_rfc2822()),
    );

    Ok(Json(json!({
        "message": "Signed in successfully",
        "credentials": credentials_view(kind, &account.id, &session_key),
    }))
    .into_response())
}

/// POST /api/{collection}/authenticate
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<AccountKind>,
    request: Request,
) -> ApiResult {
    let body = extract_body(request).await?;
    check_session(&state, kind, body).map_err(reject)
}

fn check_session(state: &AppState, kind: AccountKind, body: Value) -> Result<Response> {
    let request: SessionBody = parse(body)?;
    let session = state
        .validator()
        .validate_in(kind, &request.id, &request.session_key)?;

    let view = session.account.typed_view(kind);
    crate::history::record(
        &state.history,
        HistoryRecord::new(
            kind.collection(),
            "sign",
            "authenticate",
            format!("{}: \"{}\" Authenticated", kind.label(), session.account.name),
        )
        .by(Some(view.clone())),
    );

    Ok(Json(json!({
        "message": "Authenticated",
        "credentials": credentials_view(kind, &session.account.id, &request.session_key),
        "account": view,
    }))
    .into_response())
}

/// POST /api/{collection}/deauthenticate
pub async fn deauthenticate(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<AccountKind>,
    request: Request,
) -> ApiResult {
    let body = extract_body(request).await?;
    close_session(&state, kind, body).map_err(reject)
}

fn close_session(state: &AppState, kind: AccountKind, body: Value) -> Result<Response> {
    let request: SessionBody = parse(body)?;
    let mut account = load_account(state, kind, &request.id)?;

    // Expired tokens are removed too
    if !account.remove_session(&request.session_key) {
        return Err(MedicareError::unauthorized("Invalid sessionKey"));
    }
    save_account(state, kind, &account)?;

    crate::history::record(
        &state.history,
        HistoryRecord::new(
            kind.collection(),
            "sign",
            "sign-out",
            format!("{}: \"{}\" Signed Out", kind.label(), account.name),
        )
        .by(Some(account.typed_view(kind))),
    );

    Ok(message(StatusCode::OK, "Signed out successfully"))
}

/// GET /api/{collection}
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<AccountKind>,
) -> ApiResult {
    let accounts = document_store::load_all::<Account>(state.store.as_ref(), kind.collection())
        .map_err(reject)?;

    let views: Map<String, Value> = accounts
        .iter()
        .map(|account| (account.id.clone(), account.public_view()))
        .collect();
    Ok(Json(Value::Object(views)).into_response())
}

/// GET /api/{collection}/{id}
pub async fn read(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<AccountKind>,
    Path(id): Path<String>,
) -> ApiResult {
    let account = load_account(&state, kind, &id).map_err(reject)?;
    Ok(Json(account.public_view()).into_response())
}

/// POST /api/{collection}/bulk
pub async fn bulk(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<AccountKind>,
    request: Request,
) -> ApiResult {
    let body = extract_body(request).await?;
    let request: BulkBody = parse(body).map_err(reject)?;

    let mut views = Map::new();
    for id in request.ids {
        if let Some(account) =
            document_store::load::<Account>(state.store.as_ref(), kind.collection(), &id).map_err(reject)?
        {
            views.insert(id, account.public_view());
        }
    }
    Ok(Json(Value::Object(views)).into_response())
}

/// PATCH /api/{collection}/{id}
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<AccountKind>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    let body = extract_body(request).await?;
    update_account(&state, kind, &id, actor.as_ref(), body).map_err(reject)
}

fn merge_profile(profile: &Profile, patch: &Value) -> Result<Profile> {
    let Some(patch) = patch.as_object() else {
        return Err(MedicareError::validation("Invalid profile"));
    };
    let mut merged = serde_json::to_value(profile)?;
    if let Some(fields) = merged.as_object_mut() {
        for (key, value) in patch {
            fields.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(merged).map_err(|_| MedicareError::validation("Invalid profile"))
}

enum MembershipChange {
    Added,
    Updated,
    Removed,
}

/// Apply the `membership` key of a user patch. Absent key means no change.
fn apply_membership(
    state: &AppState,
    account: &mut Account,
    patch: Option<&Value>,
) -> Result<Option<MembershipChange>> {
    let Some(patch) = patch else {
        return Ok(None);
    };

    if patch.is_null() {
        return Ok(account.membership.take().map(|_| MembershipChange::Removed));
    }

    let input: MembershipInput = serde_json::from_value(patch.clone())
        .map_err(|_| MedicareError::validation("Invalid membership"))?;
    if input.rfid.trim().is_empty() {
        return Err(MedicareError::validation("Invalid membership"));
    }
    medicare_core::appointment::parse_date(&input.until)
        .map_err(|_| MedicareError::validation("Invalid membership"))?;

    let holders = state.store.find_by(
        AccountKind::User.collection(),
        "membership/rfid",
        &json!(input.rfid),
    )?;
    if holders.iter().any(|(id, _)| *id != account.id) {
        return Err(MedicareError::conflict("Membership already taken"));
    }

    let change = match &account.membership {
        None => Some(MembershipChange::Added),
        Some(current) if current.rfid != input.rfid || current.until != input.until => {
            Some(MembershipChange::Updated)
        }
        Some(_) => None,
    };
    let since = account
        .membership
        .as_ref()
        .map(|m| m.since.clone())
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

    account.membership = Some(Membership {
        rfid: input.rfid,
        since,
        until: input.until,
    });
    Ok(change)
}

fn update_account(
    state: &AppState,
    kind: AccountKind,
    id: &str,
    actor: Option<&Actor>,
    body: Value,
) -> Result<Response> {
    require_self_or_staff(actor, kind, id)?;
    let mut account = load_account(state, kind, id)?;

    let membership_patch = if kind == AccountKind::User {
        body.get("membership")
    } else {
        None
    };
    let name = body.get("name");
    let email = body.get("email");
    let profile = body.get("profile");
    if name.is_none() && email.is_none() && profile.is_none() && membership_patch.is_none() {
        return Err(MedicareError::validation("Invalid request body"));
    }

    if let Some(name) = name {
        match name.as_str() {
            Some(name) if !name.trim().is_empty() => account.name = name.to_string(),
            _ => return Err(MedicareError::validation("Invalid name")),
        }
    }

    if let Some(email) = email {
        let email = match email.as_str() {
            Some(email) if !email.trim().is_empty() => email,
            _ => return Err(MedicareError::validation("Invalid email")),
        };
        if email_taken(state, email, Some((kind, id)))? {
            return Err(MedicareError::conflict("Email already taken"));
        }
        account.email = email.to_string();
    }

    if let Some(profile) = profile {
        account.profile = merge_profile(&account.profile, profile)?;
    }

    let change = apply_membership(state, &mut account, membership_patch)?;
    save_account(state, kind, &account)?;

    if let Some(change) = change {
        let until = account
            .membership
            .as_ref()
            .map(|m| m.until.clone())
            .unwrap_or_default();
        let text = match change {
            MembershipChange::Added => format!(
                "Thank you for subscribing to Medicare Membership. Your subscription will expire on {}",
                until
            ),
            MembershipChange::Updated => format!(
                "Your Medicare Membership has been updated. Your subscription will expire on {}",
                until
            ),
            MembershipChange::Removed => "Your Medicare Membership has been cancelled.".to_string(),
        };
        state.mailer.send(&account.email, "Membership Subscription", text);
    }

    publish(
        state,
        actor,
        vec![
            Notice::refresh(Topic::accounts(kind)),
            Notice::refresh(Topic::account(kind, id)),
        ],
        HistoryRecord::new(
            kind.collection(),
            "account",
            "update",
            format!("{}: \"{}\" Updated", kind.label(), account.name),
        ),
    );

    Ok(Json(json!({
        "message": format!("{} updated successfully", kind.label()),
        "account": account.public_view(),
    }))
    .into_response())
}

/// DELETE /api/{collection}/{id}
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<AccountKind>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    delete_account(&state, kind, &id, actor.as_ref()).map_err(reject)
}

fn delete_account(state: &AppState, kind: AccountKind, id: &str, actor: Option<&Actor>) -> Result<Response> {
    require_self_or_staff(actor, kind, id)?;
    let account = load_account(state, kind, id)?;

    let mut notices = Vec::new();
    if kind == AccountKind::User {
        let owned = state.store.find_by("appointments", "user/id", &json!(id))?;
        for (appointment_id, _) in &owned {
            state.store.delete("appointments", appointment_id)?;
        }
        if !owned.is_empty() {
            tracing::info!(user = %id, appointments = owned.len(), "Deleted appointments of removed user");
            notices.push(Notice::refresh(Topic::appointments()));
            notices.push(Notice::redirect(Topic::appointments_of(id)));
        }
    }

    state.store.delete(kind.collection(), id)?;

    notices.push(Notice::refresh(Topic::accounts(kind)));
    notices.push(Notice::redirect(Topic::account(kind, id)));
    publish(
        state,
        actor,
        notices,
        HistoryRecord::new(
            kind.collection(),
            "index",
            "delete",
            format!("{}: \"{}\" Deleted", kind.label(), account.name),
        ),
    );
    state.mailer.send(
        &account.email,
        "Account Deleted",
        "Your Medicare account has been deleted.",
    );

    Ok(message(
        StatusCode::OK,
        format!("{} deleted successfully", kind.label()),
    ))
}

/// POST /api/users/rfid
pub async fn find_by_rfid(State(state): State<Arc<AppState>>, request: Request) -> ApiResult {
    let body = extract_body(request).await?;
    let request: RfidBody = parse(body).map_err(reject)?;

    let holder = state
        .store
        .find_by(AccountKind::User.collection(), "membership/rfid", &json!(request.rfid))
        .map_err(reject)?
        .into_iter()
        .next()
        .ok_or_else(|| reject(MedicareError::not_found("User")))?;

    let (id, doc) = holder;
    let account: Account =
        document_store::decode(AccountKind::User.collection(), &id, doc).map_err(reject)?;
    Ok(Json(account.typed_view(AccountKind::User)).into_response())
}
