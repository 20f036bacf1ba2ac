//! Realtime topic names.
//!
//! A topic is the logical page a client watches. Matching is exact string
//! equality, so every topic a handler notifies must come from these
//! constructors to line up with what clients subscribe to.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::account::AccountKind;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn appointments() -> Self {
        Self::new("appointments")
    }

    /// Appointments booked by one user
    pub fn appointments_of(user_id: &str) -> Self {
        Self(format!("appointments/{}", user_id))
    }

    /// `users`, `staffs` or `doctors`
    pub fn accounts(kind: AccountKind) -> Self {
        Self::new(kind.collection())
    }

    pub fn account(kind: AccountKind, id: &str) -> Self {
        Self(format!("{}/{}", kind.collection(), id))
    }

    pub fn patients() -> Self {
        Self::new("patients")
    }

    pub fn patient(id: &str) -> Self {
        Self(format!("patients/{}", id))
    }

    pub fn medical_record(patient_id: &str, record_id: &str) -> Self {
        Self(format!("patients/{}/medicalRecords/{}", patient_id, record_id))
    }

    pub fn supply_categories() -> Self {
        Self::new("supplyCategories")
    }

    pub fn supply_category(id: &str) -> Self {
        Self(format!("supplyCategories/{}", id))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Topic {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_shapes() {
        assert_eq!(Topic::appointments().as_str(), "appointments");
        assert_eq!(Topic::appointments_of("u1").as_str(), "appointments/u1");
        assert_eq!(Topic::accounts(AccountKind::User).as_str(), "users");
        assert_eq!(Topic::account(AccountKind::User, "u1").as_str(), "users/u1");
        assert_eq!(Topic::account(AccountKind::Doctor, "d1").as_str(), "doctors/d1");
        assert_eq!(Topic::patients().as_str(), "patients");
        assert_eq!(Topic::patient("p1").as_str(), "patients/p1");
        assert_eq!(
            Topic::medical_record("p1", "r1").as_str(),
            "patients/p1/medicalRecords/r1"
        );
        assert_eq!(Topic::supply_categories().as_str(), "supplyCategories");
        assert_eq!(Topic::supply_category("c1").as_str(), "supplyCategories/c1");
    }

    #[test]
    fn test_matching_is_exact() {
        let topic = Topic::patient("p1");
        assert!(topic == *"patients/p1");
        assert!(topic != *"Patients/p1");
        assert!(topic != *"patients/p1/");
    }
}
