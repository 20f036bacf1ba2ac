use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use medicare_core::{Account, AccountKind, MedicareError};
use serde_json::Value;
use std::sync::Arc;

use crate::{handlers::reject, AppState};

use super::validator::SessionRejection;

/// The authenticated caller of a request.
///
/// `session_key` is the causing session for every notification the request
/// triggers; the connection holding it is skipped on fan-out.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub kind: AccountKind,
    pub session_key: String,
    pub account: Account,
}

impl Actor {
    /// Actor attached by the session middleware, if the request carried one.
    pub fn from_request(request: &Request) -> Option<Actor> {
        request.extensions().get::<Actor>().cloned()
    }

    pub fn is(&self, kind: AccountKind) -> bool {
        self.kind == kind
    }

    /// Public view recorded as the history actor
    pub fn view(&self) -> Value {
        self.account.typed_view(self.kind)
    }
}

/// Require an authenticated actor of one of the given kinds.
pub fn require<'a>(actor: Option<&'a Actor>, kinds: &[AccountKind]) -> Result<&'a Actor, MedicareError> {
    let actor = actor.ok_or_else(|| MedicareError::unauthorized("Authentication required"))?;
    if !kinds.contains(&actor.kind) {
        return Err(MedicareError::forbidden(format!(
            "A {} account cannot perform this action",
            actor.kind
        )));
    }
    Ok(actor)
}

/// Require the account itself or a staff actor.
pub fn require_self_or_staff<'a>(
    actor: Option<&'a Actor>,
    kind: AccountKind,
    id: &str,
) -> Result<&'a Actor, MedicareError> {
    let actor = actor.ok_or_else(|| MedicareError::unauthorized("Authentication required"))?;
    if actor.is(AccountKind::Staff) || (actor.kind == kind && actor.id == id) {
        Ok(actor)
    } else {
        Err(MedicareError::forbidden("Not allowed to modify this account"))
    }
}

/// Split an `Authorization` value of the form `<actorId> <sessionKey>`.
pub fn parse_authorization(value: &str) -> Option<(&str, &str)> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(id), Some(key), None) => Some((id, key)),
        _ => None,
    }
}

fn is_public(path: &str) -> bool {
    if path == "/health" || path == "/ws" || path.starts_with("/api/forgotPassword") {
        return true;
    }
    AccountKind::LOOKUP_ORDER.into_iter().any(|kind| {
        path.strip_prefix("/api/")
            .and_then(|rest| rest.strip_prefix(kind.collection()))
            .is_some_and(|rest| rest == "/authenticate" || rest == "/deauthenticate")
    })
}

/// Attach the calling actor when an `Authorization` header is present.
///
/// Requests without the header, or whose header names no stored account,
/// continue anonymously; handlers decide whether they need an actor.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    if is_public(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let Some(value) = request.headers().get(header::AUTHORIZATION) else {
        return Ok(next.run(request).await);
    };

    let malformed = || reject(MedicareError::unauthorized("Invalid Authorization header")).into_response();
    let value = value.to_str().map_err(|_| malformed())?;
    let (actor_id, session_key) = parse_authorization(value).ok_or_else(malformed)?;

    let validated = state.validator().validate(actor_id, session_key);
    let session = match validated {
        Ok(session) => session,
        // A header naming no stored account is ignored, like a missing one
        Err(SessionRejection::UnknownActor) => {
            tracing::debug!(
                actor = %actor_id,
                path = %request.uri().path(),
                "Unknown account in Authorization header, continuing anonymously"
            );
            return Ok(next.run(request).await);
        }
        Err(rejection) => {
            tracing::warn!(
                actor = %actor_id,
                path = %request.uri().path(),
                reason = %rejection,
                "Session rejected"
            );
            let err = match rejection {
                SessionRejection::Malformed(_) | SessionRejection::Store(_) => rejection.into(),
                other => MedicareError::unauthorized(other.to_string()),
            };
            return Err(reject(err).into_response());
        }
    };

    let actor = Actor {
        id: session.account.id.clone(),
        kind: session.kind,
        session_key: session_key.to_string(),
        account: session.account,
    };
    tracing::debug!(actor = %actor.id, kind = %actor.kind, "Session accepted");
    request.extensions_mut().insert(actor);

    Ok(next.run(request).await)
}
