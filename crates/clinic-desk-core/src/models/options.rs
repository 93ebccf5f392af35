//! Reference option lists used to populate choice fields.

use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityId};

/// The reference lists the front desk loads once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionListKind {
    /// Blood groups for the patient form
    BloodGroups,
    /// Reasons for booking an appointment
    AppointmentReasons,
    /// Appointment status labels
    AppointmentStatuses,
    /// Payment modes for consultations
    PaymentModes,
}

impl OptionListKind {
    /// Every list, in display order.
    pub const ALL: [OptionListKind; 4] = [
        OptionListKind::BloodGroups,
        OptionListKind::AppointmentReasons,
        OptionListKind::AppointmentStatuses,
        OptionListKind::PaymentModes,
    ];

    /// Default remote collection for this list.
    pub fn default_collection(self) -> &'static str {
        match self {
            OptionListKind::BloodGroups => "groupes_sanguins",
            OptionListKind::AppointmentReasons => "motifs_rdv",
            OptionListKind::AppointmentStatuses => "statuts_rdv",
            OptionListKind::PaymentModes => "modes_paiement",
        }
    }
}

/// A `{value, label}` choice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceOption {
    /// Service id, when the backend stores one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    /// Stored value; some lists only carry a label
    #[serde(default)]
    pub value: String,
    /// Human-readable label
    #[serde(default)]
    pub label: String,
}

impl ReferenceOption {
    /// Label, falling back to the value when the list has no labels.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.value
        } else {
            &self.label
        }
    }

    /// Value to store, falling back to the label when the list has no values.
    pub fn stored_value(&self) -> &str {
        if self.value.is_empty() {
            &self.label
        } else {
            &self.value
        }
    }
}

/// Payload for adding a choice to a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionDraft {
    /// Stored value
    pub value: String,
    /// Human-readable label
    pub label: String,
}

impl Entity for ReferenceOption {
    type Draft = OptionDraft;

    const COLLECTION: &'static str = "options";

    /// Lists without stored ids are keyed by value, or label.
    fn id(&self) -> EntityId {
        self.id
            .clone()
            .unwrap_or_else(|| EntityId::Text(self.stored_value().to_string()))
    }
}

/// Label for `value` in `options`, or the value itself when it is not listed.
pub fn label_for<'a>(options: &'a [ReferenceOption], value: &'a str) -> &'a str {
    options
        .iter()
        .find(|o| o.stored_value() == value)
        .map(ReferenceOption::display_label)
        .unwrap_or(value)
}
