//! Session validation.
//!
//! A session is valid only when the token is both listed on the account
//! and cryptographically sound. The two checks are separate predicates so
//! explicit sign-out (unlisting) and natural expiry stay independent.

use medicare_core::{Account, AccountKind, MedicareError};
use medicare_store::{document_store, DocumentStore, StoreError};
use thiserror::Error;

use super::token::{TokenError, TokenSigner};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionRejection {
    #[error("Account not found")]
    UnknownActor,

    #[error("Invalid sessionKey")]
    NotListed,

    #[error("Token expired")]
    Expired,

    #[error("Invalid sessionKey")]
    BadSignature,

    #[error("Stored account is malformed: {0}")]
    Malformed(String),

    #[error("Storage error: {0}")]
    Store(String),
}

impl From<StoreError> for SessionRejection {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Malformed { .. } => SessionRejection::Malformed(err.to_string()),
            other => SessionRejection::Store(other.to_string()),
        }
    }
}

impl From<SessionRejection> for MedicareError {
    fn from(rejection: SessionRejection) -> Self {
        match rejection {
            SessionRejection::UnknownActor => MedicareError::not_found("Account"),
            SessionRejection::NotListed
            | SessionRejection::Expired
            | SessionRejection::BadSignature => MedicareError::unauthorized(rejection.to_string()),
            SessionRejection::Malformed(_) | SessionRejection::Store(_) => {
                MedicareError::Storage(rejection.to_string())
            }
        }
    }
}

/// An account whose session passed both checks
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub kind: AccountKind,
    pub account: Account,
}

pub struct SessionValidator<'a> {
    store: &'a dyn DocumentStore,
    signer: &'a TokenSigner,
}

impl<'a> SessionValidator<'a> {
    pub fn new(store: &'a dyn DocumentStore, signer: &'a TokenSigner) -> Self {
        Self { store, signer }
    }

    /// Validate a session for an account in any collection.
    pub fn validate(&self, actor_id: &str, token: &str) -> Result<ValidatedSession, SessionRejection> {
        let (kind, account) = self.locate(actor_id)?.ok_or(SessionRejection::UnknownActor)?;
        self.check(&account, token)?;
        Ok(ValidatedSession { kind, account })
    }

    /// Validate a session against a single collection.
    pub fn validate_in(
        &self,
        kind: AccountKind,
        actor_id: &str,
        token: &str,
    ) -> Result<ValidatedSession, SessionRejection> {
        let account: Account = document_store::load(self.store, kind.collection(), actor_id)?
            .ok_or(SessionRejection::UnknownActor)?;
        self.check(&account, token)?;
        Ok(ValidatedSession { kind, account })
    }

    /// Find an account by id, searching users, then staff, then doctors.
    pub fn locate(&self, actor_id: &str) -> Result<Option<(AccountKind, Account)>, SessionRejection> {
        for kind in AccountKind::LOOKUP_ORDER {
            if let Some(account) = document_store::load::<Account>(self.store, kind.collection(), actor_id)? {
                return Ok(Some((kind, account)));
            }
        }
        Ok(None)
    }

    fn check(&self, account: &Account, token: &str) -> Result<(), SessionRejection> {
        if !is_listed(account, token) {
            return Err(SessionRejection::NotListed);
        }
        self.signer.verify(token).map_err(|e| match e {
            TokenError::Expired => SessionRejection::Expired,
            _ => SessionRejection::BadSignature,
        })?;
        Ok(())
    }
}

/// Whether the token is still in the account's persisted session list.
pub fn is_listed(account: &Account, token: &str) -> bool {
    account.has_session(token)
}
