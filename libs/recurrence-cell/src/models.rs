// libs/recurrence-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// RECURRENCE SPEC
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RepeatDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl RepeatDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatDay::Monday => "Monday",
            RepeatDay::Tuesday => "Tuesday",
            RepeatDay::Wednesday => "Wednesday",
            RepeatDay::Thursday => "Thursday",
            RepeatDay::Friday => "Friday",
            RepeatDay::Saturday => "Saturday",
            RepeatDay::Sunday => "Sunday",
        }
    }

    pub fn to_weekday(&self) -> Weekday {
        match self {
            RepeatDay::Monday => Weekday::Mon,
            RepeatDay::Tuesday => Weekday::Tue,
            RepeatDay::Wednesday => Weekday::Wed,
            RepeatDay::Thursday => Weekday::Thu,
            RepeatDay::Friday => Weekday::Fri,
            RepeatDay::Saturday => Weekday::Sat,
            RepeatDay::Sunday => Weekday::Sun,
        }
    }
}

fn default_interval() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceSpec {
    pub repeat_on: Frequency,
    #[serde(default = "default_interval")]
    pub repeat_interval: u32,
    pub repeat_till: Option<NaiveDate>,
    pub max_occurrences: Option<u32>,
    /// Weekly mode only; ignored otherwise.
    #[serde(default)]
    pub weekdays: Vec<RepeatDay>,
    pub from_date: NaiveDate,
    pub from_time: NaiveTime,
    pub to_time: NaiveTime,
    pub patient: Option<Uuid>,
    pub practitioner: Uuid,
    pub service_unit: Option<Uuid>,
    pub appointment_type: String,
    pub notes: Option<String>,
}

// ==============================================================================
// EXPANSION RESULTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDate {
    pub date: NaiveDate,
    pub from_time: NaiveTime,
    pub to_time: NaiveTime,
    /// Weekday name of the occurrence, e.g. "Monday".
    pub day: String,
    /// Slot already taken in this occurrence; the caller skips creation but
    /// keeps the entry for review.
    pub booked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionResult {
    pub total: usize,
    pub dates: Vec<CandidateDate>,
    /// Whether any date in the walk matched the practitioner schedule at all.
    pub available: bool,
}

/// Raw output of the pure date walk, before the availability annotation.
#[derive(Debug, Clone)]
pub struct Expansion {
    pub dates: Vec<CandidateDate>,
    pub schedule_matched: bool,
}

// ==============================================================================
// CALENDAR INPUTS
// ==============================================================================

/// A schedule template window for one weekday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub day: String,
    pub from_time: NaiveTime,
    pub to_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayDate {
    pub holiday_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayList {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    #[serde(default)]
    pub holidays: Vec<HolidayDate>,
}

impl HolidayList {
    /// A date is a holiday when the list's range covers it and a specific
    /// holiday row matches it.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.from_date <= date
            && date <= self.to_date
            && self.holidays.iter().any(|h| h.holiday_date == date)
    }
}

pub fn is_holiday(lists: &[HolidayList], date: NaiveDate) -> bool {
    lists.iter().any(|list| list.covers(date))
}

// ==============================================================================
// ASYNC BATCH CREATION
// ==============================================================================

#[derive(Debug, Clone)]
pub struct RecurrenceJob {
    pub job_id: Uuid,
    pub spec: RecurrenceSpec,
    pub dates: Vec<CandidateDate>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum RecurrenceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} is required")]
    Mandatory(String),

    #[error("Slots are not available")]
    NoSlotsAvailable,

    #[error("Store error: {0}")]
    Store(String),
}
