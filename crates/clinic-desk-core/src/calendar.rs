//! Calendar arithmetic: ages and planning-week navigation.
//!
//! Ages are whole elapsed years on the calendar, not durations divided by
//! 365.25: a birthday counts once the reference date's (month, day) reaches
//! the birth (month, day). Someone born on 29 February turns a year older
//! on 1 March in common years.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, Utc};

const LOCAL_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Something that denotes a calendar day.
pub trait CalendarDate {
    /// The calendar day, or `None` when the value cannot be read as one.
    fn calendar_date(&self) -> Option<NaiveDate>;
}

impl CalendarDate for str {
    fn calendar_date(&self) -> Option<NaiveDate> {
        parse_date(self)
    }
}

impl CalendarDate for String {
    fn calendar_date(&self) -> Option<NaiveDate> {
        parse_date(self)
    }
}

impl CalendarDate for NaiveDate {
    fn calendar_date(&self) -> Option<NaiveDate> {
        Some(*self)
    }
}

impl CalendarDate for NaiveDateTime {
    fn calendar_date(&self) -> Option<NaiveDate> {
        Some(self.date())
    }
}

impl CalendarDate for DateTime<Utc> {
    fn calendar_date(&self) -> Option<NaiveDate> {
        Some(self.date_naive())
    }
}

/// Parse `YYYY-MM-DD`, RFC 3339 timestamps, or local `YYYY-MM-DDTHH:MM[:SS]`.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.date_naive());
    }
    LOCAL_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

/// Whole calendar years from `born` to `reference`.
///
/// Negative when `reference` precedes `born`.
pub fn years_between(born: NaiveDate, reference: NaiveDate) -> i32 {
    let years = reference.year() - born.year();
    let birthday_pending = (reference.month(), reference.day()) < (born.month(), born.day());
    years - i32::from(birthday_pending)
}

/// Age on `reference`, `None` if the date of birth is unreadable.
pub fn calculate_age_on<D, R>(date_of_birth: &D, reference: &R) -> Option<i32>
where
    D: CalendarDate + ?Sized,
    R: CalendarDate + ?Sized,
{
    let born = date_of_birth.calendar_date()?;
    let on = reference.calendar_date()?;
    Some(years_between(born, on))
}

/// Age today (local time).
pub fn calculate_age<D: CalendarDate + ?Sized>(date_of_birth: &D) -> Option<i32> {
    calculate_age_on(date_of_birth, &today())
}

/// Age on `reference` as display text; empty when unknown.
pub fn format_age<D, R>(date_of_birth: &D, reference: &R) -> String
where
    D: CalendarDate + ?Sized,
    R: CalendarDate + ?Sized,
{
    calculate_age_on(date_of_birth, reference)
        .map(|age| age.to_string())
        .unwrap_or_default()
}

/// Today's date in local time.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// ISO `YYYY-MM-DD` form used on the wire.
pub fn to_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// The Sunday-started week containing `date`.
pub fn week_dates(date: NaiveDate) -> [NaiveDate; 7] {
    let start = date - Duration::days(i64::from(date.weekday().num_days_from_sunday()));
    std::array::from_fn(|i| start + Duration::days(i as i64))
}

/// `date` moved by `days`, `None` past chrono's representable range.
pub fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::days(days))
}
