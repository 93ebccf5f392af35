//! Patient models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityId};
use crate::calendar;

/// Patient fields as entered at the front desk.
///
/// Field names on the wire follow the remote service (`nom`, `prenom`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientDetails {
    /// Family name
    #[serde(rename = "nom", default)]
    pub family_name: String,
    /// Given name
    #[serde(rename = "prenom", default)]
    pub given_name: String,
    /// Phone number
    #[serde(rename = "telephone", default)]
    pub phone: String,
    /// Email address
    #[serde(default)]
    pub email: String,
    /// Postal address
    #[serde(rename = "adresse", default)]
    pub address: String,
    /// Blood group, usually a value from the blood group reference list
    #[serde(rename = "groupe_sanguin", default)]
    pub blood_group: String,
    /// Known allergies (free text)
    #[serde(default)]
    pub allergies: String,
    /// Date of birth, ISO form
    #[serde(rename = "date_naissance", default)]
    pub date_of_birth: String,
}

impl PatientDetails {
    /// Create details with the two required name fields.
    pub fn new(family_name: impl Into<String>, given_name: impl Into<String>) -> Self {
        Self {
            family_name: family_name.into(),
            given_name: given_name.into(),
            ..Default::default()
        }
    }
}

/// A patient record as held by the remote service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Service-assigned id
    pub id: EntityId,
    /// Everything but the id
    #[serde(flatten)]
    pub details: PatientDetails,
}

impl Patient {
    /// "Given Family", trimmed when either part is missing.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.details.given_name, self.details.family_name)
            .trim()
            .to_string()
    }

    /// Age in whole years on `reference`, `None` when the date of birth is unusable.
    pub fn age_on(&self, reference: NaiveDate) -> Option<i32> {
        calendar::calculate_age_on(self.details.date_of_birth.as_str(), &reference)
    }

    /// Case-insensitive substring match on "family given".
    pub fn matches_query(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return true;
        }
        format!("{} {}", self.details.family_name, self.details.given_name)
            .to_lowercase()
            .contains(&q)
    }
}

impl Entity for Patient {
    type Draft = PatientDetails;

    const COLLECTION: &'static str = "patients";

    fn id(&self) -> EntityId {
        self.id.clone()
    }
}
