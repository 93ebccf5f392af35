//! Clinic Desk Core Library
//!
//! Client-side record synchronization and appointment scheduling for a
//! clinic front office.
//!
//! # Architecture
//!
//! ```text
//!   UI (screens, forms)
//!          │  reads snapshots, issues fetch / create / update / delete
//!          ▼
//!   ClinicState ── patients · appointments · consultations · practitioners · options
//!          │  one EntityStore per collection
//!          ▼
//!   Transport (JSON over a collection-per-resource REST service)
//!          │
//!          ├── LocalTransport (SQLite documents, offline / tests)
//!          └── HttpTransport  (clinic-desk-http crate)
//! ```
//!
//! Slot conflict checks and age computations are pure functions over the
//! cached data and never touch the transport.
//!
//! # Modules
//!
//! - [`store`]: Generic entity store and the transport boundary
//! - [`models`]: Wire records (Patient, Appointment, Consultation, ...)
//! - [`slots`]: Half-hour booking grid and conflict detection
//! - [`calendar`]: Age and week helpers
//! - [`state`]: Composition root wiring every store
//! - [`db`]: SQLite document backend

pub mod calendar;
pub mod db;
pub mod models;
pub mod slots;
pub mod state;
pub mod store;

// Re-export commonly used types
pub use db::{Database, LocalTransport};
pub use models::{
    Appointment, AppointmentDetails, AppointmentStatus, Consultation, ConsultationDetails,
    Entity, EntityId, OptionListKind, Patient, PatientDetails, Practitioner, ReferenceOption,
};
pub use slots::Booking;
pub use state::{BookingError, ClinicState, CollectionNames, DashboardCounts, PatientHistory};
pub use store::{EntityStore, FetchOutcome, FetchStatus, StoreError, Transport, TransportError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use tokio::runtime::Runtime;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicDeskError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Slot taken: {0}")]
    SlotTaken(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for ClinicDeskError {
    fn from(e: db::DbError) -> Self {
        ClinicDeskError::DatabaseError(e.to_string())
    }
}

impl From<StoreError> for ClinicDeskError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Transport { .. } => ClinicDeskError::TransportError(e.to_string()),
            StoreError::Decode { .. } | StoreError::Encode { .. } => {
                ClinicDeskError::SerializationError(e.to_string())
            }
        }
    }
}

impl From<BookingError> for ClinicDeskError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::SlotTaken { .. } => ClinicDeskError::SlotTaken(e.to_string()),
            BookingError::Incomplete | BookingError::InvalidDate { .. } | BookingError::OffGrid { .. } => {
                ClinicDeskError::InvalidInput(e.to_string())
            }
            BookingError::Store(inner) => inner.into(),
        }
    }
}

impl From<std::io::Error> for ClinicDeskError {
    fn from(e: std::io::Error) -> Self {
        ClinicDeskError::DatabaseError(format!("Runtime setup failed: {}", e))
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicDeskError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicDeskError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Scheduling & Calendar Functions (exported to FFI)
// =========================================================================

/// Age in whole years on `reference` (today when absent).
///
/// `None` when either date is missing or unparseable.
#[uniffi::export]
pub fn compute_age(date_of_birth: String, reference: Option<String>) -> Option<i32> {
    match reference {
        Some(reference) => calendar::calculate_age_on(date_of_birth.as_str(), reference.as_str()),
        None => calendar::calculate_age(date_of_birth.as_str()),
    }
}

/// Age as display text, empty when unknown.
#[uniffi::export]
pub fn describe_age(date_of_birth: String, reference: String) -> String {
    calendar::format_age(date_of_birth.as_str(), reference.as_str())
}

/// The fixed half-hour booking grid, "08:00" through "17:30".
#[uniffi::export]
pub fn booking_slots() -> Vec<String> {
    slots::slot_grid().to_vec()
}

/// Whether `date`/`time` is held by any booking other than `exclude_id`.
#[uniffi::export]
pub fn slot_is_taken(
    bookings: Vec<FfiBooking>,
    date: String,
    time: String,
    exclude_id: Option<String>,
) -> bool {
    let exclude = exclude_id.as_deref().map(EntityId::parse);
    slots::has_conflict(&bookings, &date, &time, exclude.as_ref())
}

/// Grid slots still free on `date`.
#[uniffi::export]
pub fn free_slots(bookings: Vec<FfiBooking>, date: String, exclude_id: Option<String>) -> Vec<String> {
    let exclude = exclude_id.as_deref().map(EntityId::parse);
    slots::available_slots(&bookings, &date, slots::slot_grid(), exclude.as_ref())
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a local backend at the given path.
#[uniffi::export]
pub fn open_local_backend(path: String) -> Result<Arc<ClinicDeskCore>, ClinicDeskError> {
    ClinicDeskCore::build(Database::open(&path)?)
}

/// Create an in-memory local backend (for testing).
#[uniffi::export]
pub fn open_local_backend_in_memory() -> Result<Arc<ClinicDeskCore>, ClinicDeskError> {
    ClinicDeskCore::build(Database::open_in_memory()?)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Clinic state over a local backend, driven synchronously for FFI callers.
#[derive(uniffi::Object)]
pub struct ClinicDeskCore {
    runtime: Runtime,
    db: Arc<Mutex<Database>>,
    state: ClinicState,
}

impl ClinicDeskCore {
    fn build(db: Database) -> Result<Arc<Self>, ClinicDeskError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let transport = LocalTransport::new(db);
        let db = transport.database();
        Ok(Arc::new(Self {
            runtime,
            db,
            state: ClinicState::new(Arc::new(transport)),
        }))
    }

    /// The wrapped state, for Rust callers.
    pub fn state(&self) -> &ClinicState {
        &self.state
    }
}

#[uniffi::export]
impl ClinicDeskCore {
    /// Load a json-server style seed file into the backend.
    pub fn seed_from_json(&self, json: String) -> Result<u32, ClinicDeskError> {
        let mut db = self.db.lock()?;
        let inserted = db.seed_from_json(&json)?;
        Ok(inserted as u32)
    }

    // =========================================================================
    // Store Operations
    // =========================================================================

    /// Refetch every front-desk collection.
    pub fn refresh(&self) -> Vec<FfiStoreStatus> {
        let state = &self.state;
        self.runtime.block_on(async {
            tokio::join!(
                state.patients.fetch_all(),
                state.appointments.fetch_all(),
                state.consultations.fetch_all(),
                state.options.ensure_all_loaded(),
            )
        });
        vec![
            FfiStoreStatus::of(&state.patients),
            FfiStoreStatus::of(&state.appointments),
            FfiStoreStatus::of(&state.consultations),
        ]
    }

    /// Fetch appointments and report the store status.
    pub fn refresh_appointments(&self) -> FfiStoreStatus {
        self.runtime.block_on(self.state.appointments.fetch_all());
        FfiStoreStatus::of(&self.state.appointments)
    }

    /// Cached appointments.
    pub fn appointments(&self) -> Vec<FfiAppointment> {
        self.state
            .appointments
            .items()
            .into_iter()
            .map(Into::into)
            .collect()
    }

    /// Book an appointment after checking its slot against the cache.
    pub fn book_appointment(&self, appointment: FfiAppointmentDraft) -> Result<FfiAppointment, ClinicDeskError> {
        let draft: AppointmentDetails = appointment.into();
        let booked = self.runtime.block_on(self.state.book_appointment(&draft))?;
        Ok(booked.into())
    }

    /// Cancel an appointment by marking it cancelled.
    pub fn cancel_appointment(&self, id: String) -> Result<FfiAppointment, ClinicDeskError> {
        let id = EntityId::parse(&id);
        let mut appointment = self
            .state
            .appointments
            .get(&id)
            .ok_or_else(|| ClinicDeskError::InvalidInput(format!("No cached appointment {}", id)))?;
        appointment.details.status = AppointmentStatus::Cancelled;
        let saved = self.runtime.block_on(self.state.appointments.update(&appointment))?;
        Ok(saved.into())
    }

    /// Grid slots still free on `date` in the cached appointments.
    pub fn free_slots(&self, date: String, exclude_id: Option<String>) -> Vec<String> {
        let exclude = exclude_id.as_deref().map(EntityId::parse);
        self.state.free_slots(&date, exclude.as_ref())
    }

    /// Display name of a patient, "Unknown" when unresolved.
    pub fn patient_name(&self, patient_id: Option<String>) -> String {
        let id = patient_id.as_deref().map(EntityId::parse);
        self.state.patient_name(id.as_ref())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe booking, enough for slot checks.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBooking {
    pub id: String,
    pub date: String,
    pub time: String,
}

impl Booking for FfiBooking {
    fn booking_id(&self) -> EntityId {
        EntityId::parse(&self.id)
    }

    fn booking_date(&self) -> &str {
        &self.date
    }

    fn booking_time(&self) -> &str {
        &self.time
    }
}

/// FFI-safe appointment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointment {
    pub id: String,
    pub patient_id: Option<String>,
    pub date: String,
    pub time: String,
    pub reason: String,
    pub status: String,
    pub notes: String,
}

impl From<Appointment> for FfiAppointment {
    fn from(appointment: Appointment) -> Self {
        let details = appointment.details;
        Self {
            id: appointment.id.normalized(),
            patient_id: details.patient_id.map(|id| id.normalized()),
            date: details.date,
            time: details.time,
            reason: details.reason,
            status: details.status.as_str().to_string(),
            notes: details.notes,
        }
    }
}

/// FFI-safe appointment draft.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointmentDraft {
    pub patient_id: Option<String>,
    pub date: String,
    pub time: String,
    pub reason: String,
    pub notes: String,
}

impl From<FfiAppointmentDraft> for AppointmentDetails {
    fn from(draft: FfiAppointmentDraft) -> Self {
        AppointmentDetails {
            patient_id: draft.patient_id.as_deref().map(EntityId::parse),
            date: draft.date,
            time: draft.time,
            reason: draft.reason,
            status: AppointmentStatus::default(),
            notes: draft.notes,
        }
    }
}

/// FFI-safe store status.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStoreStatus {
    pub collection: String,
    pub status: String,
    pub error: Option<String>,
    pub count: u32,
}

impl FfiStoreStatus {
    fn of<T: Entity>(store: &EntityStore<T>) -> Self {
        let snapshot = store.snapshot();
        Self {
            collection: store.collection().to_string(),
            status: snapshot.status.as_str().to_string(),
            error: snapshot.error,
            count: snapshot.items.len() as u32,
        }
    }
}
