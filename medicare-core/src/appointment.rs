//! Appointment booking: service calendars, schedule validation and the
//! status state machine.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MedicareError, Result};

/// First bookable hour of the day
pub const OPENING_HOUR: u32 = 8;
/// Last bookable hour of the day (bookings inside this hour are accepted)
pub const CLOSING_HOUR: u32 = 17;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Dental,
    Checkup,
    Circumcision,
    Vaccination,
    Prenatal,
}

impl Service {
    pub fn as_str(self) -> &'static str {
        match self {
            Service::Dental => "dental",
            Service::Checkup => "checkup",
            Service::Circumcision => "circumcision",
            Service::Vaccination => "vaccination",
            Service::Prenatal => "prenatal",
        }
    }

    /// Whether the clinic offers this service on the given weekday.
    pub fn available_on(self, day: Weekday) -> bool {
        let n = day.number_from_monday();
        match self {
            Service::Dental => day == Weekday::Tue,
            Service::Checkup => (1..=5).contains(&n),
            Service::Circumcision => day == Weekday::Thu,
            Service::Vaccination => (3..=5).contains(&n),
            Service::Prenatal => (1..=6).contains(&n),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, AppointmentStatus::Pending)
    }

    /// Checked transition. Only `pending` may move, and only to a terminal state.
    pub fn transition(self, to: AppointmentStatus) -> Result<AppointmentStatus> {
        if self.is_terminal() || !to.is_terminal() {
            return Err(MedicareError::InvalidTransition { from: self, to });
        }
        Ok(to)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientDetails {
    pub name: String,
    pub gender: String,
    pub age: u32,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub service: Service,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(rename = "rejectedReason", default)]
    pub rejected_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentOwner {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub patient: PatientDetails,
    pub appointment: Booking,
    pub user: AppointmentOwner,
    pub created: String,
}

impl Appointment {
    pub fn owner_id(&self) -> &str {
        &self.user.id
    }

    pub fn status(&self) -> AppointmentStatus {
        self.appointment.status
    }

    /// Booked date and time, or `None` when the stored strings do not parse.
    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        let date = parse_date(&self.appointment.date).ok()?;
        let time = parse_time(&self.appointment.time).ok()?;
        Some(date.and_time(time))
    }

    /// Apply a checked status change. `reason` is kept only for rejections.
    pub fn apply(&mut self, to: AppointmentStatus, reason: Option<String>) -> Result<()> {
        self.appointment.status = self.appointment.status.transition(to)?;
        if to == AppointmentStatus::Rejected {
            self.appointment.rejected_reason = reason.unwrap_or_default();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub service: Service,
    pub date: String,
    pub time: String,
}

/// Body of a booking request
#[derive(Debug, Clone, Deserialize)]
pub struct NewAppointment {
    pub patient: PatientDetails,
    pub appointment: BookingRequest,
    pub user: AppointmentOwner,
}

impl NewAppointment {
    pub fn validate_fields(&self) -> Result<()> {
        let p = &self.patient;
        if p.name.trim().is_empty() || p.gender.trim().is_empty() || p.phone.trim().is_empty() || p.age == 0
        {
            return Err(MedicareError::validation("Invalid request body"));
        }
        if self.user.id.trim().is_empty() {
            return Err(MedicareError::validation("Invalid request body"));
        }
        Ok(())
    }

    pub fn into_appointment(self, id: String, created: String) -> Appointment {
        Appointment {
            id,
            patient: self.patient,
            appointment: Booking {
                service: self.appointment.service,
                date: self.appointment.date,
                time: self.appointment.time,
                status: AppointmentStatus::Pending,
                rejected_reason: String::new(),
            },
            user: self.user,
            created,
        }
    }
}

pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| MedicareError::validation("Invalid date"))
}

pub fn parse_time(time: &str) -> Result<NaiveTime> {
    let (hours, minutes) = time
        .trim()
        .split_once(':')
        .ok_or_else(|| MedicareError::validation("Invalid time"))?;
    let hours: u32 = hours
        .parse()
        .map_err(|_| MedicareError::validation("Invalid time"))?;
    let minutes: u32 = minutes
        .parse()
        .map_err(|_| MedicareError::validation("Invalid time"))?;
    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(|| MedicareError::validation("Invalid time"))
}

/// Validate a requested slot against the service calendar, the opening
/// hours and the current local time. Returns the booked date-time.
pub fn validate_schedule(
    service: Service,
    date: &str,
    time: &str,
    now: NaiveDateTime,
) -> Result<NaiveDateTime> {
    let date = parse_date(date)?;
    let time = parse_time(time)?;

    if date < now.date() {
        return Err(MedicareError::validation("Invalid date"));
    }
    if date == now.date() && time < now.time().with_second(0).unwrap_or(now.time()) {
        return Err(MedicareError::validation("Invalid time"));
    }

    if !service.available_on(date.weekday()) {
        return Err(MedicareError::validation(format!(
            "Date is not available for this {} service.",
            service.as_str()
        )));
    }

    if time.hour() < OPENING_HOUR || time.hour() > CLOSING_HOUR {
        return Err(MedicareError::validation(
            "Time is not available for this service.",
        ));
    }

    Ok(date.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2030-01-07 is a Monday
    fn monday_morning() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 7)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_service_calendars() {
        assert!(Service::Dental.available_on(Weekday::Tue));
        assert!(!Service::Dental.available_on(Weekday::Wed));
        assert!(Service::Checkup.available_on(Weekday::Fri));
        assert!(!Service::Checkup.available_on(Weekday::Sat));
        assert!(Service::Circumcision.available_on(Weekday::Thu));
        assert!(!Service::Vaccination.available_on(Weekday::Tue));
        assert!(Service::Vaccination.available_on(Weekday::Wed));
        assert!(Service::Prenatal.available_on(Weekday::Sat));
        assert!(!Service::Prenatal.available_on(Weekday::Sun));
    }

    #[test]
    fn test_valid_schedule() {
        let slot = validate_schedule(Service::Dental, "2030-01-08", "10:15", monday_morning()).unwrap();
        assert_eq!(slot.to_string(), "2030-01-08 10:15:00");
    }

    #[test]
    fn test_wrong_day_for_service() {
        let err = validate_schedule(Service::Dental, "2030-01-09", "10:00", monday_morning())
            .unwrap_err();
        assert_eq!(err.to_string(), "Date is not available for this dental service.");
    }

    #[test]
    fn test_hour_window() {
        let now = monday_morning();
        assert!(validate_schedule(Service::Checkup, "2030-01-08", "07:59", now).is_err());
        assert!(validate_schedule(Service::Checkup, "2030-01-08", "08:00", now).is_ok());
        assert!(validate_schedule(Service::Checkup, "2030-01-08", "17:45", now).is_ok());
        let err = validate_schedule(Service::Checkup, "2030-01-08", "18:00", now).unwrap_err();
        assert_eq!(err.to_string(), "Time is not available for this service.");
    }

    #[test]
    fn test_past_dates_and_times() {
        let now = monday_morning();
        let err = validate_schedule(Service::Checkup, "2030-01-04", "10:00", now).unwrap_err();
        assert_eq!(err.to_string(), "Invalid date");
        let err = validate_schedule(Service::Checkup, "2030-01-07", "09:00", now).unwrap_err();
        assert_eq!(err.to_string(), "Invalid time");
        assert!(validate_schedule(Service::Checkup, "2030-01-07", "11:00", now).is_ok());
    }

    #[test]
    fn test_malformed_input() {
        let now = monday_morning();
        assert!(validate_schedule(Service::Checkup, "next tuesday", "10:00", now).is_err());
        assert!(validate_schedule(Service::Checkup, "2030-01-08", "1000", now).is_err());
        assert!(validate_schedule(Service::Checkup, "2030-01-08", "10:61", now).is_err());
        assert!(validate_schedule(Service::Checkup, "2030-01-08", "aa:00", now).is_err());
    }

    #[test]
    fn test_pending_moves_to_each_terminal_state() {
        for to in [
            AppointmentStatus::Approved,
            AppointmentStatus::Rejected,
            AppointmentStatus::Cancelled,
        ] {
            assert_eq!(AppointmentStatus::Pending.transition(to).unwrap(), to);
        }
        assert!(AppointmentStatus::Pending
            .transition(AppointmentStatus::Pending)
            .is_err());
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        let all = [
            AppointmentStatus::Pending,
            AppointmentStatus::Approved,
            AppointmentStatus::Rejected,
            AppointmentStatus::Cancelled,
        ];
        for from in [
            AppointmentStatus::Approved,
            AppointmentStatus::Rejected,
            AppointmentStatus::Cancelled,
        ] {
            for to in all {
                assert!(
                    from.transition(to).is_err(),
                    "{} -> {} should be rejected",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_apply_rejection_keeps_reason() {
        let request: NewAppointment = serde_json::from_value(serde_json::json!({
            "patient": { "name": "Ana", "gender": "Female", "age": 31, "phone": "0917" },
            "appointment": { "service": "checkup", "date": "2030-01-08", "time": "10:00" },
            "user": { "id": "u1" }
        }))
        .unwrap();
        request.validate_fields().unwrap();
        let mut appointment = request.into_appointment("a1".to_string(), "now".to_string());
        assert_eq!(appointment.status(), AppointmentStatus::Pending);

        appointment
            .apply(AppointmentStatus::Rejected, Some("Fully booked".to_string()))
            .unwrap();
        assert_eq!(appointment.appointment.rejected_reason, "Fully booked");

        let json = serde_json::to_value(&appointment).unwrap();
        assert_eq!(json["appointment"]["status"], "rejected");
        assert_eq!(json["appointment"]["rejectedReason"], "Fully booked");
        assert!(appointment.apply(AppointmentStatus::Approved, None).is_err());
    }
}
