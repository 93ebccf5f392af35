//! Appointment models.

use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityId};

/// Booking state of an appointment.
///
/// The remote service stores the French labels. Labels outside the three
/// known ones (a clinic may extend the status reference list) are kept
/// verbatim so they survive an update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum AppointmentStatus {
    /// Awaiting confirmation
    #[default]
    Pending,
    /// Confirmed with the patient
    Confirmed,
    /// Cancelled
    Cancelled,
    /// Any other label from the status reference list
    Other(String),
}

impl AppointmentStatus {
    /// Wire label.
    pub fn as_str(&self) -> &str {
        match self {
            AppointmentStatus::Pending => "En attente",
            AppointmentStatus::Confirmed => "Confirmé",
            AppointmentStatus::Cancelled => "Annulé",
            AppointmentStatus::Other(label) => label,
        }
    }

    /// Whether the appointment still occupies the patient's schedule.
    pub fn is_active(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl From<String> for AppointmentStatus {
    fn from(label: String) -> Self {
        match label.as_str() {
            "En attente" | "" => AppointmentStatus::Pending,
            "Confirmé" => AppointmentStatus::Confirmed,
            "Annulé" => AppointmentStatus::Cancelled,
            _ => AppointmentStatus::Other(label),
        }
    }
}

impl From<AppointmentStatus> for String {
    fn from(status: AppointmentStatus) -> Self {
        match status {
            AppointmentStatus::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

/// Appointment fields as entered in the booking form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppointmentDetails {
    /// Soft reference to a patient; not guaranteed to resolve
    #[serde(rename = "patientId", default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<EntityId>,
    /// Calendar date, `YYYY-MM-DD`
    #[serde(default)]
    pub date: String,
    /// Time of day on the slot grid, `HH:MM`
    #[serde(rename = "heure", default)]
    pub time: String,
    /// Reason for the visit
    #[serde(rename = "motif", default)]
    pub reason: String,
    /// Booking state
    #[serde(rename = "etat", default)]
    pub status: AppointmentStatus,
    /// Free-text notes
    #[serde(default)]
    pub notes: String,
}

impl AppointmentDetails {
    /// Create a pending booking for a patient at a date and time.
    pub fn new(
        patient_id: impl Into<EntityId>,
        date: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: Some(patient_id.into()),
            date: date.into(),
            time: time.into(),
            ..Default::default()
        }
    }
}

/// An appointment record as held by the remote service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    /// Service-assigned id
    pub id: EntityId,
    /// Everything but the id
    #[serde(flatten)]
    pub details: AppointmentDetails,
}

impl Appointment {
    /// Build a full record from an id and details.
    pub fn new(id: impl Into<EntityId>, details: AppointmentDetails) -> Self {
        Self {
            id: id.into(),
            details,
        }
    }

    /// Case-insensitive substring match on reason and status.
    pub fn matches_query(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        q.is_empty()
            || format!("{} {}", self.details.reason, self.details.status.as_str())
                .to_lowercase()
                .contains(&q)
    }
}

impl Entity for Appointment {
    type Draft = AppointmentDetails;

    const COLLECTION: &'static str = "rendezvous";

    fn id(&self) -> EntityId {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_wire_record() {
        let json = r#"{
            "id": 3,
            "patientId": "12",
            "date": "2025-01-10",
            "heure": "10:30",
            "motif": "Contrôle",
            "etat": "Confirmé",
            "notes": ""
        }"#;

        let appointment: Appointment = serde_json::from_str(json).unwrap();
        assert_eq!(appointment.id, EntityId::Int(3));
        assert_eq!(appointment.details.patient_id, Some(EntityId::Int(12)));
        assert_eq!(appointment.details.time, "10:30");
        assert_eq!(appointment.details.status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn test_unknown_status_survives_round_trip() {
        let status: AppointmentStatus = serde_json::from_str(r#""Reporté""#).unwrap();
        assert_eq!(status, AppointmentStatus::Other("Reporté".into()));
        assert!(status.is_active());
        assert_eq!(serde_json::to_string(&status).unwrap(), r#""Reporté""#);
    }

    #[test]
    fn test_missing_status_is_pending() {
        let appointment: Appointment =
            serde_json::from_str(r#"{"id": 1, "date": "2025-01-10", "heure": "08:00"}"#).unwrap();
        assert_eq!(appointment.details.status, AppointmentStatus::Pending);
        assert_eq!(appointment.details.patient_id, None);
    }

    #[test]
    fn test_cancelled_is_inactive() {
        assert!(!AppointmentStatus::Cancelled.is_active());
        assert!(AppointmentStatus::Pending.is_active());
    }

    #[test]
    fn test_matches_query() {
        let mut details = AppointmentDetails::new(1, "2025-01-10", "09:00");
        details.reason = "Vaccination".into();
        let appointment = Appointment::new(1, details);

        assert!(appointment.matches_query("vacc"));
        assert!(appointment.matches_query("attente"));
        assert!(!appointment.matches_query("radio"));
    }
}
