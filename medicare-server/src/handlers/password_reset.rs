//! Forgot-password flow: mail a one-time code, verify it, then set a new password.
//!
//! Codes live in the `OTP` collection, one live code per email. Issuing a
//! new code discards the previous ones.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::Response,
};
use chrono::{DateTime, TimeDelta, Utc};
use medicare_core::{Account, AccountKind, HistoryRecord, MedicareError, Result, Topic};
use medicare_store::{document_store, DocumentStore, StoreError};
use password_hash::rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use super::{extract_body, message, new_id, parse, reject, ApiResult};
use crate::auth::hash_password;
use crate::realtime::Notice;
use crate::AppState;

pub const COLLECTION: &str = "OTP";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpRecord {
    pub email: String,
    #[serde(rename = "OTP")]
    pub code: String,
    pub expires: DateTime<Utc>,
    /// Set once the code was confirmed through `/verify`
    #[serde(default)]
    pub verified: bool,
}

impl OtpRecord {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires > now
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ForgotBody {
    email: String,
    #[serde(rename = "OTP")]
    otp: String,
    password: String,
}

fn code_part() -> u32 {
    100 + OsRng.next_u32() % 900
}

/// Six digits in two groups, e.g. `482-917`.
fn generate_code() -> String {
    format!("{}-{}", code_part(), code_part())
}

/// First account holding the email, in user, staff, doctor order.
fn find_account(store: &dyn DocumentStore, email: &str) -> Result<Option<(AccountKind, Account)>> {
    for kind in AccountKind::LOOKUP_ORDER {
        if let Some((id, doc)) = store
            .find_by(kind.collection(), "email", &json!(email))?
            .into_iter()
            .next()
        {
            let account = document_store::decode(kind.collection(), &id, doc)?;
            return Ok(Some((kind, account)));
        }
    }
    Ok(None)
}

fn codes_for(store: &dyn DocumentStore, email: &str) -> std::result::Result<Vec<(String, OtpRecord)>, StoreError> {
    store
        .find_by(COLLECTION, "email", &json!(email))?
        .into_iter()
        .map(|(id, doc)| {
            let record: OtpRecord = document_store::decode(COLLECTION, &id, doc)?;
            Ok((id, record))
        })
        .collect()
}

fn discard_codes(store: &dyn DocumentStore, email: &str) -> std::result::Result<usize, StoreError> {
    let ids: Vec<String> = store
        .find_by(COLLECTION, "email", &json!(email))?
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    for id in &ids {
        store.delete(COLLECTION, id)?;
    }
    Ok(ids.len())
}

/// Replace any earlier codes for `email` with a fresh one and return it.
pub fn issue_code(
    store: &dyn DocumentStore,
    email: &str,
    now: DateTime<Utc>,
    ttl: TimeDelta,
) -> std::result::Result<String, StoreError> {
    discard_codes(store, email)?;
    let record = OtpRecord {
        email: email.to_string(),
        code: generate_code(),
        expires: now + ttl,
        verified: false,
    };
    document_store::save(store, COLLECTION, &new_id(), &record)?;
    Ok(record.code)
}

/// Mark a live matching code as verified. The reset window restarts from `now`.
pub fn verify_code(
    store: &dyn DocumentStore,
    email: &str,
    code: &str,
    now: DateTime<Utc>,
    ttl: TimeDelta,
) -> std::result::Result<bool, StoreError> {
    let found = codes_for(store, email)?
        .into_iter()
        .find(|(_, record)| record.is_live(now) && record.code == code);
    let Some((id, mut record)) = found else {
        return Ok(false);
    };

    record.verified = true;
    record.expires = now + ttl;
    document_store::save(store, COLLECTION, &id, &record)?;
    Ok(true)
}

/// A reset needs a live code that was verified or is supplied with the reset.
fn reset_allowed(
    store: &dyn DocumentStore,
    email: &str,
    code: Option<&str>,
    now: DateTime<Utc>,
) -> std::result::Result<bool, StoreError> {
    Ok(codes_for(store, email)?.iter().any(|(_, record)| {
        record.is_live(now) && (record.verified || code == Some(record.code.as_str()))
    }))
}

/// Delete codes past their expiry. Returns how many were removed.
pub fn purge_expired(store: &dyn DocumentStore, now: DateTime<Utc>) -> std::result::Result<usize, StoreError> {
    let mut purged = 0;
    for (id, doc) in store.list(COLLECTION)? {
        let expired = match document_store::decode::<OtpRecord>(COLLECTION, &id, doc) {
            Ok(record) => !record.is_live(now),
            Err(e) => {
                tracing::warn!(id = %id, "Removing unreadable reset code: {}", e);
                true
            }
        };
        if expired {
            store.delete(COLLECTION, &id)?;
            purged += 1;
        }
    }
    if purged > 0 {
        tracing::debug!(purged = purged, "Expired reset codes removed");
    }
    Ok(purged)
}

fn ttl(state: &AppState) -> TimeDelta {
    TimeDelta::seconds(state.config.auth.otp_ttl_secs.max(1))
}

/// POST /api/forgotPassword
pub async fn request_code(State(state): State<Arc<AppState>>, request: Request) -> ApiResult {
    let body = extract_body(request).await?;
    send_code(&state, parse(body).map_err(reject)?).map_err(reject)
}

fn send_code(state: &AppState, body: ForgotBody) -> Result<Response> {
    if body.email.trim().is_empty() {
        return Err(MedicareError::validation("Email is required"));
    }
    if find_account(state.store.as_ref(), &body.email)?.is_none() {
        return Err(MedicareError::validation("Email not found"));
    }

    let code = issue_code(state.store.as_ref(), &body.email, Utc::now(), ttl(state))?;
    tracing::info!(email = %body.email, "Password reset code issued");
    state.mailer.send(
        &body.email,
        "Forgot Password",
        format!("Your OTP is {}. Please use this OTP to reset your password.", code),
    );

    Ok(message(StatusCode::OK, "OTP sent to your email"))
}

/// POST /api/forgotPassword/verify
pub async fn verify(State(state): State<Arc<AppState>>, request: Request) -> ApiResult {
    let body = extract_body(request).await?;
    check_code(&state, parse(body).map_err(reject)?).map_err(reject)
}

fn check_code(state: &AppState, body: ForgotBody) -> Result<Response> {
    if body.email.trim().is_empty() || body.otp.trim().is_empty() {
        return Err(MedicareError::validation("Email and OTP are required"));
    }
    if !verify_code(state.store.as_ref(), &body.email, body.otp.trim(), Utc::now(), ttl(state))? {
        tracing::warn!(email = %body.email, "Reset code did not match");
        return Err(MedicareError::validation("Invalid OTP"));
    }
    Ok(message(StatusCode::OK, "OTP verified"))
}

/// POST /api/forgotPassword/reset
pub async fn reset(State(state): State<Arc<AppState>>, request: Request) -> ApiResult {
    let body = extract_body(request).await?;
    set_password(&state, parse(body).map_err(reject)?).map_err(reject)
}

fn set_password(state: &AppState, body: ForgotBody) -> Result<Response> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(MedicareError::validation("Email and Password are required"));
    }
    let store = state.store.as_ref();
    let (kind, mut account) = find_account(store, &body.email)?
        .ok_or_else(|| MedicareError::validation("Email not found"))?;

    let code = Some(body.otp.trim()).filter(|c| !c.is_empty());
    if !reset_allowed(store, &body.email, code, Utc::now())? {
        return Err(MedicareError::validation("Invalid OTP"));
    }

    account.credentials.password_hash = hash_password(&body.password).map_err(MedicareError::Storage)?;
    let revoked = account.credentials.sessions.len();
    account.credentials.sessions.clear();
    document_store::save(store, kind.collection(), &account.id, &account)?;
    discard_codes(store, &body.email)?;
    tracing::info!(collection = kind.collection(), id = %account.id, revoked = revoked, "Password reset");

    state.hub.notify(Notice::refresh(Topic::account(kind, &account.id)));
    crate::history::record(
        &state.history,
        HistoryRecord::new(
            kind.collection(),
            "sign",
            "reset-password",
            format!("{}: \"{}\" Reset Password", kind.label(), account.name),
        )
        .by(Some(account.typed_view(kind))),
    );
    state.mailer.send(
        &account.email,
        "Password Changed",
        "Your Medicare password was changed and every session was signed out.",
    );

    Ok(message(StatusCode::OK, "Password updated"))
}
