//! Composition root: every store the front desk works with, built once
//! and handed to UI collaborators explicitly.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::calendar;
use crate::models::{
    Appointment, AppointmentDetails, Consultation, Entity, EntityId, OptionListKind, Patient,
    Practitioner, ReferenceOption,
};
use crate::slots;
use crate::store::{EntityStore, FetchOutcome, StoreError, Transport};

/// Display name for a patient reference that does not resolve.
pub const UNKNOWN_PATIENT: &str = "Unknown";

/// Remote collection names, one per store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionNames {
    pub patients: String,
    pub appointments: String,
    pub consultations: String,
    pub practitioners: String,
    pub blood_groups: String,
    pub appointment_reasons: String,
    pub appointment_statuses: String,
    pub payment_modes: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            patients: Patient::COLLECTION.into(),
            appointments: Appointment::COLLECTION.into(),
            consultations: Consultation::COLLECTION.into(),
            practitioners: Practitioner::COLLECTION.into(),
            blood_groups: OptionListKind::BloodGroups.default_collection().into(),
            appointment_reasons: OptionListKind::AppointmentReasons.default_collection().into(),
            appointment_statuses: OptionListKind::AppointmentStatuses.default_collection().into(),
            payment_modes: OptionListKind::PaymentModes.default_collection().into(),
        }
    }
}

impl CollectionNames {
    /// Collection backing a reference list.
    pub fn option_list(&self, kind: OptionListKind) -> &str {
        match kind {
            OptionListKind::BloodGroups => &self.blood_groups,
            OptionListKind::AppointmentReasons => &self.appointment_reasons,
            OptionListKind::AppointmentStatuses => &self.appointment_statuses,
            OptionListKind::PaymentModes => &self.payment_modes,
        }
    }
}

/// Booking failures.
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Appointment needs both a date and a time")]
    Incomplete,

    #[error("{date} is not a calendar date")]
    InvalidDate { date: String },

    #[error("{time} is not a bookable slot")]
    OffGrid { time: String },

    #[error("Slot {date} {time} is already booked")]
    SlotTaken { date: String, time: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The four reference lists, each with its own store and status.
pub struct ReferenceLists {
    blood_groups: EntityStore<ReferenceOption>,
    appointment_reasons: EntityStore<ReferenceOption>,
    appointment_statuses: EntityStore<ReferenceOption>,
    payment_modes: EntityStore<ReferenceOption>,
}

impl ReferenceLists {
    fn new(transport: &Arc<dyn Transport>, names: &CollectionNames) -> Self {
        let store = |kind: OptionListKind| EntityStore::with_collection(Arc::clone(transport), names.option_list(kind));
        Self {
            blood_groups: store(OptionListKind::BloodGroups),
            appointment_reasons: store(OptionListKind::AppointmentReasons),
            appointment_statuses: store(OptionListKind::AppointmentStatuses),
            payment_modes: store(OptionListKind::PaymentModes),
        }
    }

    /// Store for one list.
    pub fn store(&self, kind: OptionListKind) -> &EntityStore<ReferenceOption> {
        match kind {
            OptionListKind::BloodGroups => &self.blood_groups,
            OptionListKind::AppointmentReasons => &self.appointment_reasons,
            OptionListKind::AppointmentStatuses => &self.appointment_statuses,
            OptionListKind::PaymentModes => &self.payment_modes,
        }
    }

    /// Load every list not loaded yet, concurrently.
    pub async fn ensure_all_loaded(&self) -> [FetchOutcome; 4] {
        let (blood, reasons, statuses, payments) = tokio::join!(
            self.blood_groups.ensure_loaded(),
            self.appointment_reasons.ensure_loaded(),
            self.appointment_statuses.ensure_loaded(),
            self.payment_modes.ensure_loaded(),
        );
        [blood, reasons, statuses, payments]
    }
}

/// Everything a patient is linked to through soft references.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientHistory {
    pub appointments: Vec<Appointment>,
    pub consultations: Vec<Consultation>,
}

/// Headline counts for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DashboardCounts {
    pub patients: usize,
    /// Active appointments dated today or later
    pub upcoming_appointments: usize,
    pub consultations_today: usize,
}

/// Process-wide state container.
///
/// Built once at startup and shared (typically behind an `Arc`) with every
/// UI collaborator. Stores are never reached through globals.
pub struct ClinicState {
    pub patients: EntityStore<Patient>,
    pub appointments: EntityStore<Appointment>,
    pub consultations: EntityStore<Consultation>,
    /// Wired but not consumed by any front-desk flow yet
    pub practitioners: EntityStore<Practitioner>,
    pub options: ReferenceLists,
    /// Serializes booking check-then-write sequences
    booking: Mutex<()>,
}

impl ClinicState {
    /// Stores over the default collection names.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_collections(transport, &CollectionNames::default())
    }

    /// Stores over custom collection names.
    pub fn with_collections(transport: Arc<dyn Transport>, names: &CollectionNames) -> Self {
        debug!(?names, "Building clinic state");
        Self {
            patients: EntityStore::with_collection(Arc::clone(&transport), names.patients.as_str()),
            appointments: EntityStore::with_collection(Arc::clone(&transport), names.appointments.as_str()),
            consultations: EntityStore::with_collection(Arc::clone(&transport), names.consultations.as_str()),
            practitioners: EntityStore::with_collection(Arc::clone(&transport), names.practitioners.as_str()),
            options: ReferenceLists::new(&transport, names),
            booking: Mutex::new(()),
        }
    }

    /// Lazily load patients, appointments, consultations and reference lists.
    pub async fn ensure_loaded(&self) {
        let (patients, appointments, consultations, options) = tokio::join!(
            self.patients.ensure_loaded(),
            self.appointments.ensure_loaded(),
            self.consultations.ensure_loaded(),
            self.options.ensure_all_loaded(),
        );
        info!(
            ?patients,
            ?appointments,
            ?consultations,
            ?options,
            "Front-desk stores loaded"
        );
    }

    // =========================================================================
    // Booking
    // =========================================================================

    /// Book a new appointment if its slot is free in the cached appointments.
    ///
    /// Date and time are stored in canonical form (`YYYY-MM-DD`, `HH:MM`).
    /// The check runs against this client's snapshot only; the remote
    /// service does not enforce it. Bookings issued through the same state
    /// run one at a time, so each sees the previous one's result.
    pub async fn book_appointment(&self, draft: &AppointmentDetails) -> Result<Appointment, BookingError> {
        let _guard = self.booking.lock().await;
        let draft = self.checked_booking(draft, None)?;
        Ok(self.appointments.create(&draft).await?)
    }

    /// Save an edited appointment, ignoring its own current booking.
    pub async fn reschedule_appointment(&self, appointment: &Appointment) -> Result<Appointment, BookingError> {
        let _guard = self.booking.lock().await;
        let details = self.checked_booking(&appointment.details, Some(&appointment.id))?;
        let appointment = Appointment::new(appointment.id.clone(), details);
        Ok(self.appointments.update(&appointment).await?)
    }

    /// Free grid slots on `date` in the cached appointments.
    pub fn free_slots(&self, date: &str, exclude_id: Option<&EntityId>) -> Vec<String> {
        self.appointments
            .with_items(|items| slots::available_slots(items, date, slots::slot_grid(), exclude_id))
    }

    /// Canonical copy of `details` whose slot is free, or why it is not.
    fn checked_booking(
        &self,
        details: &AppointmentDetails,
        exclude_id: Option<&EntityId>,
    ) -> Result<AppointmentDetails, BookingError> {
        let (date, time) = (details.date.trim(), details.time.trim());
        if date.is_empty() || time.is_empty() {
            return Err(BookingError::Incomplete);
        }
        let date = calendar::parse_date(date)
            .map(calendar::to_iso)
            .ok_or_else(|| BookingError::InvalidDate { date: date.to_string() })?;
        let time = slots::canonical_time(time)
            .filter(|t| slots::is_on_grid(t))
            .ok_or_else(|| BookingError::OffGrid { time: time.to_string() })?;

        let taken = self
            .appointments
            .with_items(|items| slots::has_conflict(items, &date, &time, exclude_id));
        if taken {
            return Err(BookingError::SlotTaken { date, time });
        }

        let mut checked = details.clone();
        checked.date = date;
        checked.time = time;
        Ok(checked)
    }

    // =========================================================================
    // Soft references
    // =========================================================================

    /// Display name of a referenced patient, or "Unknown".
    pub fn patient_name(&self, id: Option<&EntityId>) -> String {
        id.and_then(|id| self.patients.get(id))
            .map(|p| p.display_name())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_PATIENT.to_string())
    }

    /// Cached appointments and consultations pointing at a patient.
    ///
    /// Works for deleted patients too: orphaned records still match their id.
    pub fn patient_history(&self, patient_id: &EntityId) -> PatientHistory {
        let refers = |id: &Option<EntityId>| id.as_ref() == Some(patient_id);
        PatientHistory {
            appointments: self
                .appointments
                .with_items(|items| items.iter().filter(|a| refers(&a.details.patient_id)).cloned().collect()),
            consultations: self
                .consultations
                .with_items(|items| items.iter().filter(|c| refers(&c.details.patient_id)).cloned().collect()),
        }
    }

    // =========================================================================
    // List searches
    // =========================================================================

    /// Cached patients whose name contains `query`, ignoring case.
    pub fn search_patients(&self, query: &str) -> Vec<Patient> {
        self.patients
            .with_items(|items| items.iter().filter(|p| p.matches_query(query)).cloned().collect())
    }

    /// Cached appointments whose reason or status contains `query`.
    pub fn search_appointments(&self, query: &str) -> Vec<Appointment> {
        self.appointments
            .with_items(|items| items.iter().filter(|a| a.matches_query(query)).cloned().collect())
    }

    /// Cached consultations whose diagnosis or treatment contains `query`.
    pub fn search_consultations(&self, query: &str) -> Vec<Consultation> {
        self.consultations
            .with_items(|items| items.iter().filter(|c| c.matches_query(query)).cloned().collect())
    }

    /// Dashboard counts as of `today`.
    pub fn dashboard_counts(&self, today: NaiveDate) -> DashboardCounts {
        let on_or_after_today = |date: &str| calendar::parse_date(date).is_some_and(|d| d >= today);
        DashboardCounts {
            patients: self.patients.len(),
            upcoming_appointments: self.appointments.with_items(|items| {
                items
                    .iter()
                    .filter(|a| a.details.status.is_active() && on_or_after_today(&a.details.date))
                    .count()
            }),
            consultations_today: self.consultations.with_items(|items| {
                items
                    .iter()
                    .filter(|c| calendar::parse_date(&c.details.date) == Some(today))
                    .count()
            }),
        }
    }
}
