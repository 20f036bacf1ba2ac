use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::account::DEFAULT_AVATAR;
use crate::error::{MedicareError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatientInfo {
    #[serde(rename = "profilePicture", skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl PatientInfo {
    /// Overlay the fields present in `patch`.
    pub fn merge(&mut self, patch: PatientInfo) {
        if patch.profile_picture.is_some() {
            self.profile_picture = patch.profile_picture;
        }
        if patch.gender.is_some() {
            self.gender = patch.gender;
        }
        if patch.birthday.is_some() {
            self.birthday = patch.birthday;
        }
        if patch.phone.is_some() {
            self.phone = patch.phone;
        }
        if patch.address.is_some() {
            self.address = patch.address;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalRecord {
    pub id: String,
    #[serde(default)]
    pub date: String,
    pub notes: String,
    pub medications: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub info: PatientInfo,
    /// Keyed by record id
    #[serde(rename = "medicalRecords", default)]
    pub medical_records: BTreeMap<String, MedicalRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMedicalRecord {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub medications: String,
}

impl NewMedicalRecord {
    pub fn into_record(self, id: String, today: &str) -> Result<MedicalRecord> {
        if self.notes.trim().is_empty() || self.medications.trim().is_empty() {
            return Err(MedicareError::validation("Invalid request body"));
        }
        Ok(MedicalRecord {
            id,
            date: self.date.unwrap_or_else(|| today.to_string()),
            notes: self.notes,
            medications: self.medications,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MedicalRecordPatch {
    pub date: Option<String>,
    pub notes: Option<String>,
    pub medications: Option<String>,
}

impl MedicalRecordPatch {
    pub fn apply(self, record: &mut MedicalRecord) -> Result<()> {
        if self.date.is_none() && self.notes.is_none() && self.medications.is_none() {
            return Err(MedicareError::validation("Invalid request body"));
        }
        if let Some(date) = self.date {
            record.date = date;
        }
        if let Some(notes) = self.notes {
            record.notes = notes;
        }
        if let Some(medications) = self.medications {
            record.medications = medications;
        }
        Ok(())
    }
}

/// Body of a patient registration
#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub info: Option<PatientInfo>,
    #[serde(rename = "medicalRecords", default)]
    pub medical_records: Vec<NewMedicalRecord>,
}

impl NewPatient {
    /// Build the stored patient. `next_id` mints ids for initial records.
    pub fn into_patient(
        self,
        id: String,
        today: &str,
        mut next_id: impl FnMut() -> String,
    ) -> Result<Patient> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() {
            return Err(MedicareError::validation("Invalid request body"));
        }

        let mut info = self.info.unwrap_or_default();
        if info.profile_picture.as_deref().is_none_or(|p| p.is_empty()) {
            info.profile_picture = Some(DEFAULT_AVATAR.to_string());
        }

        let mut medical_records = BTreeMap::new();
        for record in self.medical_records {
            let record = record.into_record(next_id(), today)?;
            medical_records.insert(record.id.clone(), record);
        }

        Ok(Patient {
            id,
            name: self.name,
            email: self.email,
            info,
            medical_records,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatientPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub info: Option<PatientInfo>,
}

impl PatientPatch {
    pub fn apply(self, patient: &mut Patient) -> Result<()> {
        if self.name.is_none() && self.email.is_none() && self.info.is_none() {
            return Err(MedicareError::validation("Invalid request body"));
        }
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(MedicareError::validation("Invalid name"));
            }
            patient.name = name;
        }
        if let Some(email) = self.email {
            if email.trim().is_empty() {
                return Err(MedicareError::validation("Invalid email"));
            }
            patient.email = email;
        }
        if let Some(info) = self.info {
            patient.info.merge(info);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_patient_defaults_picture() {
        let request: NewPatient = serde_json::from_value(json!({
            "name": "Juan",
            "email": "juan@example.com",
            "medicalRecords": [{ "notes": "fever", "medications": "paracetamol" }]
        }))
        .unwrap();

        let mut counter = 0;
        let patient = request
            .into_patient("p1".to_string(), "2030-01-01", || {
                counter += 1;
                format!("r{}", counter)
            })
            .unwrap();

        assert_eq!(patient.info.profile_picture.as_deref(), Some(DEFAULT_AVATAR));
        assert_eq!(patient.medical_records.len(), 1);
        assert_eq!(patient.medical_records["r1"].date, "2030-01-01");

        let json = serde_json::to_value(&patient).unwrap();
        assert_eq!(json["medicalRecords"]["r1"]["notes"], "fever");
    }

    #[test]
    fn test_new_patient_requires_name_and_email() {
        let request: NewPatient = serde_json::from_value(json!({ "name": "Juan" })).unwrap();
        assert!(request.into_patient("p1".to_string(), "", String::new).is_err());
    }

    #[test]
    fn test_patch_merges_info() {
        let mut patient = Patient {
            id: "p1".to_string(),
            name: "Juan".to_string(),
            email: "juan@example.com".to_string(),
            info: PatientInfo {
                phone: Some("0917".to_string()),
                ..Default::default()
            },
            medical_records: BTreeMap::new(),
        };
        let patch: PatientPatch = serde_json::from_value(json!({
            "info": { "address": "Manila" }
        }))
        .unwrap();
        patch.apply(&mut patient).unwrap();
        assert_eq!(patient.info.phone.as_deref(), Some("0917"));
        assert_eq!(patient.info.address.as_deref(), Some("Manila"));

        assert!(PatientPatch::default().apply(&mut patient).is_err());
    }

    #[test]
    fn test_record_requires_notes_and_medications() {
        let record = NewMedicalRecord {
            date: None,
            notes: "cough".to_string(),
            medications: String::new(),
        };
        assert!(record.into_record("r1".to_string(), "2030-01-01").is_err());
    }
}
