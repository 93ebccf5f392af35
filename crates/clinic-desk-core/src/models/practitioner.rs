//! Practitioner models.

use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityId};

/// Practitioner fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PractitionerDetails {
    /// Family name
    #[serde(rename = "nom", default)]
    pub family_name: String,
    /// Given name
    #[serde(rename = "prenom", default)]
    pub given_name: String,
    /// Medical specialty
    #[serde(rename = "specialite", default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
}

/// A practitioner record as held by the remote service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Practitioner {
    /// Service-assigned id
    pub id: EntityId,
    /// Everything but the id
    #[serde(flatten)]
    pub details: PractitionerDetails,
}

impl Entity for Practitioner {
    type Draft = PractitionerDetails;

    const COLLECTION: &'static str = "medecins";

    fn id(&self) -> EntityId {
        self.id.clone()
    }
}
