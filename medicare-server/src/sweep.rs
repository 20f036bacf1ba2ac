//! Periodic chores: expired-session and reset-code pruning, membership
//! housekeeping and appointment reminders.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use medicare_core::{Account, AccountKind, Appointment, AppointmentStatus};
use medicare_store::{document_store, DocumentStore, StoreError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::auth::TokenSigner;
use crate::handlers::password_reset;
use crate::mailer::Mailer;
use crate::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    /// Tokens removed across all accounts
    pub pruned: usize,
    /// Accounts written back
    pub rewritten: usize,
    pub failures: usize,
}

/// Drop every session token that no longer verifies, one collection at a time.
///
/// An account that fails to decode or write is counted and skipped; only a
/// failure to list the collection aborts the pass.
pub fn sweep_expired_sessions(
    store: &dyn DocumentStore,
    signer: &TokenSigner,
    kind: AccountKind,
) -> Result<SweepReport, StoreError> {
    let collection = kind.collection();
    let mut report = SweepReport::default();

    for (id, doc) in store.list(collection)? {
        report.scanned += 1;
        match prune_account(store, signer, collection, &id, doc) {
            Ok(0) => {}
            Ok(pruned) => {
                report.pruned += pruned;
                report.rewritten += 1;
                tracing::debug!(collection = collection, id = %id, pruned = pruned, "Pruned expired sessions");
            }
            Err(e) => {
                report.failures += 1;
                tracing::warn!(collection = collection, id = %id, "Session sweep skipped account: {}", e);
            }
        }
    }

    tracing::info!(
        collection = collection,
        scanned = report.scanned,
        pruned = report.pruned,
        rewritten = report.rewritten,
        failures = report.failures,
        "Session sweep finished"
    );
    Ok(report)
}

fn prune_account(
    store: &dyn DocumentStore,
    signer: &TokenSigner,
    collection: &str,
    id: &str,
    mut doc: Value,
) -> Result<usize, StoreError> {
    let account: Account = document_store::decode(collection, id, doc.clone())?;
    let sessions = account.credentials.sessions;

    let kept: Vec<&String> = sessions
        .iter()
        .filter(|token| signer.verify(token).is_ok())
        .collect();
    let pruned = sessions.len() - kept.len();

    if pruned > 0 {
        // Rewrite only the session list, leaving the rest of the document as stored
        doc["credentials"]["sessions"] = json!(kept);
        store.put(collection, id, &doc)?;
    }
    Ok(pruned)
}

fn parse_until(account: &Account) -> Option<NaiveDate> {
    let membership = account.membership.as_ref()?;
    match NaiveDate::parse_from_str(membership.until.trim(), "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            tracing::warn!(
                id = %account.id,
                until = %membership.until,
                "Skipping membership with unreadable end date"
            );
            None
        }
    }
}

/// Clear memberships whose end date has passed. Returns how many were cleared.
pub fn expire_memberships(
    store: &dyn DocumentStore,
    mailer: &Mailer,
    today: NaiveDate,
) -> Result<usize, StoreError> {
    let collection = AccountKind::User.collection();
    let mut expired = 0;

    for mut account in document_store::load_all::<Account>(store, collection)? {
        let Some(until) = parse_until(&account) else {
            continue;
        };
        if until >= today {
            continue;
        }

        account.membership = None;
        if let Err(e) = document_store::save(store, collection, &account.id, &account) {
            tracing::warn!(id = %account.id, "Failed to clear expired membership: {}", e);
            continue;
        }
        expired += 1;
        tracing::info!(id = %account.id, until = %until, "Membership expired");
        mailer.send(
            &account.email,
            "Membership Expiry",
            "Your Medicare Membership has expired",
        );
    }

    Ok(expired)
}

/// Mail users whose membership ends within `window_days`. Returns how many were warned.
pub fn warn_expiring_memberships(
    store: &dyn DocumentStore,
    mailer: &Mailer,
    today: NaiveDate,
    window_days: i64,
) -> Result<usize, StoreError> {
    let mut warned = 0;

    for account in document_store::load_all::<Account>(store, AccountKind::User.collection())? {
        let Some(until) = parse_until(&account) else {
            continue;
        };
        let days_left = (until - today).num_days();
        if !(0..=window_days).contains(&days_left) {
            continue;
        }

        warned += 1;
        mailer.send(
            &account.email,
            "Membership Expiry",
            format!("Your Medicare Membership will expire in {} days", days_left),
        );
    }

    Ok(warned)
}

/// Mail the owners of live appointments booked within the next 24 hours.
/// Returns how many reminders were sent.
pub fn remind_upcoming_appointments(
    store: &dyn DocumentStore,
    mailer: &Mailer,
    now: NaiveDateTime,
) -> Result<usize, StoreError> {
    let horizon = now + TimeDelta::hours(24);
    let mut reminded = 0;

    for appointment in document_store::load_all::<Appointment>(store, "appointments")? {
        if !matches!(
            appointment.status(),
            AppointmentStatus::Pending | AppointmentStatus::Approved
        ) {
            continue;
        }
        let Some(at) = appointment.scheduled_at() else {
            tracing::warn!(id = %appointment.id, "Skipping appointment with unreadable schedule");
            continue;
        };
        if at <= now || at > horizon {
            continue;
        }

        let owner = match document_store::load::<Account>(
            store,
            AccountKind::User.collection(),
            appointment.owner_id(),
        ) {
            Ok(Some(owner)) => owner,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(id = %appointment.id, "Could not load appointment owner: {}", e);
                continue;
            }
        };

        reminded += 1;
        mailer.send(
            &owner.email,
            "Appointment Reminder",
            format!(
                "You have an appointment tomorrow on {} at {}",
                appointment.appointment.date, appointment.appointment.time
            ),
        );
    }

    tracing::info!(reminded = reminded, "Appointment reminders sent");
    Ok(reminded)
}

fn every(secs: u64) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker
}

/// Start the background chores. They run until the runtime shuts down.
pub fn spawn_chores(state: Arc<AppState>) -> Vec<JoinHandle<()>> {
    let session_secs = state.config.sweep.session_interval_secs;
    let membership_secs = state.config.sweep.membership_interval_secs;
    let warning_secs = state.config.sweep.membership_warning_interval_secs;
    let warning_days = state.config.sweep.membership_warning_days;
    let reminder_secs = state.config.sweep.appointment_reminder_interval_secs;
    let mut handles = Vec::new();

    for kind in AccountKind::LOOKUP_ORDER {
        let state = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            let mut ticker = every(session_secs);
            loop {
                ticker.tick().await;
                if let Err(e) = sweep_expired_sessions(state.store.as_ref(), &state.signer, kind) {
                    tracing::error!(collection = kind.collection(), "Session sweep failed: {}", e);
                }
            }
        }));
    }

    {
        let state = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            let mut ticker = every(session_secs);
            loop {
                ticker.tick().await;
                if let Err(e) = password_reset::purge_expired(state.store.as_ref(), chrono::Utc::now()) {
                    tracing::error!("Reset code purge failed: {}", e);
                }
            }
        }));
    }

    {
        let state = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            let mut ticker = every(membership_secs);
            loop {
                ticker.tick().await;
                let today = chrono::Local::now().date_naive();
                if let Err(e) = expire_memberships(state.store.as_ref(), &state.mailer, today) {
                    tracing::error!("Membership expiry chore failed: {}", e);
                }
            }
        }));
    }

    {
        let state = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            let mut ticker = every(reminder_secs);
            loop {
                ticker.tick().await;
                let now = chrono::Local::now().naive_local();
                if let Err(e) = remind_upcoming_appointments(state.store.as_ref(), &state.mailer, now) {
                    tracing::error!("Appointment reminder chore failed: {}", e);
                }
            }
        }));
    }

    handles.push(tokio::spawn(async move {
        let mut ticker = every(warning_secs);
        loop {
            ticker.tick().await;
            let today = chrono::Local::now().date_naive();
            if let Err(e) = warn_expiring_memberships(
                state.store.as_ref(),
                &state.mailer,
                today,
                warning_days,
            ) {
                tracing::error!("Membership warning chore failed: {}", e);
            }
        }
    }));

    tracing::info!(chores = handles.len(), "Background chores started");
    handles
}
