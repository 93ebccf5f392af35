//! Appointment slot allocation.
//!
//! A workday is cut into half-hour slots from 08:00 up to (not including)
//! 18:00. A slot on a date is taken when any appointment sits on exactly that
//! date and time. Everything here is a pure function over whatever appointment
//! snapshot the caller holds: nothing is fetched, cached or mutated, so the
//! slot grid can be re-evaluated on every render, including before any data
//! has loaded.

use std::sync::OnceLock;

use chrono::{NaiveTime, Timelike};

use crate::models::{Appointment, EntityId};

/// First bookable hour.
pub const SLOT_DAY_START: u32 = 8;
/// Hour at which booking closes (exclusive).
pub const SLOT_DAY_END: u32 = 18;
/// Slot length in minutes.
pub const SLOT_MINUTES: u32 = 30;

/// Anything that occupies a slot.
pub trait Booking {
    /// Identity used to exclude a booking from its own conflict check.
    fn booking_id(&self) -> EntityId;
    /// Calendar date, `YYYY-MM-DD`.
    fn booking_date(&self) -> &str;
    /// Time of day, `HH:MM`.
    fn booking_time(&self) -> &str;
}

impl Booking for Appointment {
    fn booking_id(&self) -> EntityId {
        self.id.clone()
    }

    fn booking_date(&self) -> &str {
        &self.details.date
    }

    fn booking_time(&self) -> &str {
        &self.details.time
    }
}

impl<B: Booking> Booking for &B {
    fn booking_id(&self) -> EntityId {
        (*self).booking_id()
    }

    fn booking_date(&self) -> &str {
        (*self).booking_date()
    }

    fn booking_time(&self) -> &str {
        (*self).booking_time()
    }
}

/// The canonical slot grid: 08:00, 08:30, ..., 17:30.
pub fn slot_grid() -> &'static [String] {
    static GRID: OnceLock<Vec<String>> = OnceLock::new();
    GRID.get_or_init(|| {
        (SLOT_DAY_START * 60..SLOT_DAY_END * 60)
            .step_by(SLOT_MINUTES as usize)
            .map(|minutes| format!("{:02}:{:02}", minutes / 60, minutes % 60))
            .collect()
    })
}

/// Whether `time` is one of the grid slots.
pub fn is_on_grid(time: &str) -> bool {
    slot_grid().iter().any(|slot| slot == time)
}

/// `HH:MM` form of a clock time given as `H:MM`, `HH:MM` or `HH:MM:SS`.
///
/// Surrounding whitespace is ignored. Seconds must be zero.
pub fn canonical_time(time: &str) -> Option<String> {
    let time = time.trim();
    let parsed = NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .ok()?;
    (parsed.second() == 0).then(|| parsed.format("%H:%M").to_string())
}

/// True iff a booking other than `exclude_id` sits on exactly `date` and `time`.
///
/// A missing date or time asserts nothing and yields `false`.
pub fn has_conflict<B: Booking>(
    appointments: &[B],
    date: &str,
    time: &str,
    exclude_id: Option<&EntityId>,
) -> bool {
    if date.trim().is_empty() || time.trim().is_empty() {
        return false;
    }
    appointments.iter().any(|a| {
        let excluded = exclude_id.is_some_and(|id| a.booking_id() == *id);
        !excluded && a.booking_date() == date && a.booking_time() == time
    })
}

/// The slots in `slots` that are free on `date`, in input order.
///
/// Empty when `date` is missing.
pub fn available_slots<B, S>(
    appointments: &[B],
    date: &str,
    slots: &[S],
    exclude_id: Option<&EntityId>,
) -> Vec<String>
where
    B: Booking,
    S: AsRef<str>,
{
    if date.trim().is_empty() {
        return Vec::new();
    }
    slots
        .iter()
        .map(AsRef::as_ref)
        .filter(|slot| !has_conflict(appointments, date, slot, exclude_id))
        .map(str::to_string)
        .collect()
}

/// Bookings on `date`, in snapshot order.
pub fn appointments_on<'a, B: Booking>(appointments: &'a [B], date: &str) -> Vec<&'a B> {
    appointments
        .iter()
        .filter(|a| a.booking_date() == date)
        .collect()
}

/// The booking sitting on `date` at `time`, if any.
pub fn appointment_at<'a, B: Booking>(appointments: &'a [B], date: &str, time: &str) -> Option<&'a B> {
    appointments
        .iter()
        .find(|a| a.booking_date() == date && a.booking_time() == time)
}

/// One row of a day planning view.
#[derive(Debug, PartialEq)]
pub struct ScheduledSlot<'a, B> {
    /// Grid time
    pub time: &'static str,
    /// Booking on that slot
    pub booking: Option<&'a B>,
}

/// Every grid slot on `date` paired with the booking on it.
pub fn day_schedule<'a, B: Booking>(appointments: &'a [B], date: &str) -> Vec<ScheduledSlot<'a, B>> {
    slot_grid()
        .iter()
        .map(|time| ScheduledSlot {
            time: time.as_str(),
            booking: appointment_at(appointments, date, time),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentDetails;
    use proptest::prelude::*;

    fn appt(id: i64, date: &str, time: &str) -> Appointment {
        Appointment::new(id, AppointmentDetails::new(1, date, time))
    }

    fn sample() -> Vec<Appointment> {
        vec![appt(1, "2025-01-10", "10:30"), appt(2, "2025-01-10", "11:00")]
    }

    #[test]
    fn test_slot_grid() {
        let grid = slot_grid();
        assert_eq!(grid.len(), 20);
        assert_eq!(grid.first().map(String::as_str), Some("08:00"));
        assert_eq!(grid[1], "08:30");
        assert_eq!(grid.last().map(String::as_str), Some("17:30"));
        assert!(is_on_grid("12:00"));
        assert!(!is_on_grid("18:00"));
        assert!(!is_on_grid("09:15"));
    }

    #[test]
    fn test_canonical_time() {
        assert_eq!(canonical_time("10:30").as_deref(), Some("10:30"));
        assert_eq!(canonical_time(" 10:30 ").as_deref(), Some("10:30"));
        assert_eq!(canonical_time("10:30:00").as_deref(), Some("10:30"));
        assert_eq!(canonical_time("10:30:15"), None);
        assert_eq!(canonical_time("half past ten"), None);
        assert_eq!(canonical_time(""), None);
    }

    #[test]
    fn test_detects_conflict() {
        assert!(has_conflict(&sample(), "2025-01-10", "10:30", None));
        assert!(!has_conflict(&sample(), "2025-01-11", "10:30", None));
        assert!(!has_conflict(&sample(), "2025-01-10", "10:00", None));
    }

    #[test]
    fn test_ignores_excluded_id() {
        assert!(!has_conflict(&sample(), "2025-01-10", "10:30", Some(&EntityId::Int(1))));
        assert!(!has_conflict(&sample(), "2025-01-10", "10:30", Some(&EntityId::from("1"))));
        assert!(has_conflict(&sample(), "2025-01-10", "10:30", Some(&EntityId::Int(2))));
    }

    #[test]
    fn test_missing_coordinates_never_conflict() {
        let blank = vec![appt(9, "", "")];
        assert!(!has_conflict(&blank, "", "", None));
        assert!(!has_conflict(&sample(), "2025-01-10", "", None));
        assert!(!has_conflict(&sample(), "", "10:30", None));
    }

    #[test]
    fn test_filters_available_slots() {
        let slots = ["10:30", "11:00", "11:30"];
        assert_eq!(available_slots(&sample(), "2025-01-10", &slots, None), vec!["11:30"]);
    }

    #[test]
    fn test_edit_keeps_own_slot_available() {
        let slots = ["10:30", "11:00", "11:30"];
        let free = available_slots(&sample(), "2025-01-10", &slots, Some(&EntityId::Int(1)));
        assert_eq!(free, vec!["10:30", "11:30"]);
    }

    #[test]
    fn test_missing_date_yields_no_slots() {
        assert!(available_slots(&sample(), "", slot_grid(), None).is_empty());
    }

    #[test]
    fn test_empty_snapshot_frees_whole_grid() {
        let none: Vec<Appointment> = Vec::new();
        assert_eq!(available_slots(&none, "2025-01-10", slot_grid(), None).len(), 20);
    }

    #[test]
    fn test_day_schedule() {
        let appointments = sample();
        let day = day_schedule(&appointments, "2025-01-10");
        assert_eq!(day.len(), 20);

        let taken: Vec<_> = day.iter().filter(|row| row.booking.is_some()).map(|row| row.time).collect();
        assert_eq!(taken, vec!["10:30", "11:00"]);
        assert_eq!(appointments_on(&appointments, "2025-01-10").len(), 2);
        assert!(appointment_at(&appointments, "2025-01-10", "11:00").is_some_and(|a| a.id == EntityId::Int(2)));
    }

    fn booking_strategy() -> impl Strategy<Value = Vec<Appointment>> {
        let dates = prop::sample::select(vec!["2025-01-10", "2025-01-11"]);
        let times = prop::sample::select(slot_grid().to_vec());
        prop::collection::vec((dates, times), 0..30).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (date, time))| appt(i as i64 + 1, date, &time))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_conflict_iff_matching_booking(appointments in booking_strategy(), slot in 0usize..20) {
            let time = &slot_grid()[slot];
            let expected = appointments.iter().any(|a| a.details.date == "2025-01-10" && &a.details.time == time);
            prop_assert_eq!(has_conflict(&appointments, "2025-01-10", time, None), expected);
        }

        #[test]
        fn prop_self_exclusion(appointments in booking_strategy()) {
            for a in &appointments {
                let others = appointments
                    .iter()
                    .any(|b| b.id != a.id && b.details.date == a.details.date && b.details.time == a.details.time);
                let conflict = has_conflict(&appointments, &a.details.date, &a.details.time, Some(&a.id));
                prop_assert_eq!(conflict, others);
            }
        }

        #[test]
        fn prop_free_slots_complement_booked_times(appointments in booking_strategy()) {
            let free = available_slots(&appointments, "2025-01-10", slot_grid(), None);
            prop_assert!(free.iter().all(|s| slot_grid().contains(s)));

            let mut booked: Vec<&str> = slot_grid()
                .iter()
                .filter(|s| !free.contains(s))
                .map(String::as_str)
                .collect();
            let mut expected: Vec<&str> = appointments
                .iter()
                .filter(|a| a.details.date == "2025-01-10")
                .map(|a| a.details.time.as_str())
                .collect();
            expected.sort_unstable();
            expected.dedup();
            booked.sort_unstable();
            prop_assert_eq!(booked, expected);
        }
    }
}
