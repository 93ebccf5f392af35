//! Domain models for the clinic front office.

mod appointment;
mod consultation;
mod entity;
mod options;
mod patient;
mod practitioner;

pub use appointment::*;
pub use consultation::*;
pub use entity::*;
pub use options::*;
pub use patient::*;
pub use practitioner::*;
