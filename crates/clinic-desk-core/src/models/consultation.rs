//! Consultation models.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::entity::{Entity, EntityId};

/// Consultation fields as entered after a visit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConsultationDetails {
    /// Soft reference to a patient; not guaranteed to resolve
    #[serde(rename = "patientId", default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<EntityId>,
    /// Calendar date, `YYYY-MM-DD`
    #[serde(default)]
    pub date: String,
    /// Diagnostic text
    #[serde(rename = "diagnostic", default)]
    pub diagnosis: String,
    /// Treatment text
    #[serde(rename = "traitement", default)]
    pub treatment: String,
    /// Fee charged for the visit, never negative on the wire
    #[serde(
        rename = "tarif",
        default,
        deserialize_with = "lenient_amount",
        serialize_with = "clamped_amount"
    )]
    pub tariff: f64,
    /// Payment state or mode, usually a value from the payment mode list
    #[serde(rename = "paiement", default)]
    pub payment: String,
}

impl ConsultationDetails {
    /// Create details for a patient on a date.
    pub fn new(patient_id: impl Into<EntityId>, date: impl Into<String>) -> Self {
        Self {
            patient_id: Some(patient_id.into()),
            date: date.into(),
            ..Default::default()
        }
    }

    /// Tariff clamped to a finite, non-negative amount.
    pub fn normalized_tariff(&self) -> f64 {
        clamp_amount(self.tariff)
    }
}

/// A consultation record as held by the remote service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Consultation {
    /// Service-assigned id
    pub id: EntityId,
    /// Everything but the id
    #[serde(flatten)]
    pub details: ConsultationDetails,
}

impl Consultation {
    /// Case-insensitive substring match on diagnosis and treatment.
    pub fn matches_query(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        q.is_empty()
            || format!("{} {}", self.details.diagnosis, self.details.treatment)
                .to_lowercase()
                .contains(&q)
    }
}

impl Entity for Consultation {
    type Draft = ConsultationDetails;

    const COLLECTION: &'static str = "consultations";

    fn id(&self) -> EntityId {
        self.id.clone()
    }
}

fn clamp_amount(amount: f64) -> f64 {
    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    }
}

/// Forms post the tariff as typed text, so accept numbers, numeric strings,
/// blanks and nulls. Anything unparsable or negative reads as zero.
fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let amount = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().replace(',', ".").parse().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(clamp_amount(amount))
}

fn clamped_amount<S: Serializer>(amount: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(clamp_amount(*amount))
}
