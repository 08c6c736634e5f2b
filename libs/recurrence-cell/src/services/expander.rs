use std::collections::HashMap;

use chrono::{Duration, Months, NaiveDate, NaiveTime};

use scheduling_cell::services::slots::weekday_name;

use crate::models::{
    is_holiday, CandidateDate, Expansion, Frequency, HolidayList, RecurrenceError,
    RecurrenceSpec, ScheduleWindow,
};

/// Walk the calendar date-by-date from the spec's base date and collect
/// every occurrence the recurrence rule produces.
///
/// A date qualifies when the requested `[from_time, to_time)` window
/// intersects a schedule template for its weekday and it is not a holiday.
/// Weekly mode tracks occurrence counts per selected weekday and, for
/// `repeat_interval > 1`, jumps to the next multiple-of-week boundary once
/// a full cycle of selected weekdays is exhausted. The `repeat_till` bound
/// is inclusive. `horizon_days` caps the walk so a rule that can never
/// match terminates with the partial result.
pub fn expand(
    spec: &RecurrenceSpec,
    windows: &[ScheduleWindow],
    holidays: &[HolidayList],
    today: NaiveDate,
    now_time: NaiveTime,
    horizon_days: i64,
) -> Result<Expansion, RecurrenceError> {
    validate_spec(spec)?;

    let interval = spec.repeat_interval.max(1);
    let horizon = spec.from_date + Duration::days(horizon_days);

    let selected: Vec<&'static str> = spec.weekdays.iter().map(|d| d.as_str()).collect();
    let mut per_weekday: HashMap<&'static str, u32> =
        selected.iter().map(|day| (*day, 0)).collect();
    let mut occurrences: u32 = 0;

    let mut dates: Vec<CandidateDate> = Vec::new();
    let mut schedule_matched = false;

    let mut cursor = spec.from_date;
    let mut cycle_start = cursor;
    let mut remaining_in_cycle = selected.len();

    loop {
        if cursor > horizon {
            break;
        }

        // Today can only host an occurrence whose start is still ahead.
        if cursor == today && spec.from_time <= now_time {
            cursor += Duration::days(1);
            continue;
        }

        let weekday = weekday_name(cursor);

        let window_fits = windows.iter().any(|w| {
            w.day == weekday && w.from_time < spec.to_time && spec.from_time < w.to_time
        });
        if !window_fits {
            cursor += Duration::days(1);
            if spec.repeat_till.map_or(false, |till| cursor > till) {
                break;
            }
            if all_weekdays_done(&per_weekday, spec.max_occurrences, &selected) {
                break;
            }
            continue;
        }
        schedule_matched = true;

        if is_holiday(holidays, cursor) {
            cursor += Duration::days(1);
            continue;
        }

        if spec.repeat_on == Frequency::Weekly {
            if !selected.contains(&weekday) {
                cursor += Duration::days(1);
                continue;
            }

            if let Some(max) = spec.max_occurrences {
                if per_weekday.get(weekday).copied().unwrap_or(0) >= max {
                    if all_weekdays_done(&per_weekday, spec.max_occurrences, &selected) {
                        break;
                    }
                    cursor += Duration::days(1);
                    continue;
                }
            }

            if spec.repeat_till.map_or(true, |till| cursor <= till) {
                if remaining_in_cycle == selected.len() {
                    cycle_start = cursor;
                }
                dates.push(candidate(spec, cursor, weekday));
                if let Some(count) = per_weekday.get_mut(weekday) {
                    *count += 1;
                }
                remaining_in_cycle -= 1;
            }

            if spec.repeat_till.map_or(false, |till| cursor >= till) {
                break;
            }
            if all_weekdays_done(&per_weekday, spec.max_occurrences, &selected) {
                break;
            }

            if remaining_in_cycle == 0 {
                // A full cycle of selected weekdays is exhausted; skip ahead
                // by the repeat interval in weeks.
                if interval > 1 {
                    cursor = cycle_start + Duration::days(7 * interval as i64);
                } else {
                    cursor += Duration::days(1);
                }
                remaining_in_cycle = selected.len();
            } else {
                cursor += Duration::days(1);
            }
        } else {
            if spec.repeat_till.map_or(true, |till| cursor <= till) {
                dates.push(candidate(spec, cursor, weekday));
                occurrences += 1;
            }

            if spec.repeat_till.map_or(false, |till| cursor >= till) {
                break;
            }
            if spec.max_occurrences.map_or(false, |max| occurrences >= max) {
                break;
            }

            cursor = match advance(cursor, spec.repeat_on, interval) {
                Some(next) => next,
                None => break,
            };
        }
    }

    Ok(Expansion {
        dates,
        schedule_matched,
    })
}

fn validate_spec(spec: &RecurrenceSpec) -> Result<(), RecurrenceError> {
    if spec.to_time <= spec.from_time {
        return Err(RecurrenceError::Validation(
            "to_time must be after from_time".to_string(),
        ));
    }
    if spec.repeat_till.is_none() && spec.max_occurrences.is_none() {
        return Err(RecurrenceError::Mandatory(
            "repeat_till or max_occurrences".to_string(),
        ));
    }
    if spec.repeat_on == Frequency::Weekly && spec.weekdays.is_empty() {
        return Err(RecurrenceError::Mandatory("weekdays".to_string()));
    }
    Ok(())
}

fn candidate(spec: &RecurrenceSpec, date: NaiveDate, weekday: &str) -> CandidateDate {
    CandidateDate {
        date,
        from_time: spec.from_time,
        to_time: spec.to_time,
        day: weekday.to_string(),
        booked: false,
    }
}

fn all_weekdays_done(
    per_weekday: &HashMap<&'static str, u32>,
    max_occurrences: Option<u32>,
    selected: &[&'static str],
) -> bool {
    match max_occurrences {
        Some(max) if !selected.is_empty() => per_weekday.values().all(|&count| count >= max),
        _ => false,
    }
}

fn advance(cursor: NaiveDate, frequency: Frequency, interval: u32) -> Option<NaiveDate> {
    match frequency {
        Frequency::Daily => Some(cursor + Duration::days(interval as i64)),
        Frequency::Monthly => cursor.checked_add_months(Months::new(interval)),
        Frequency::Yearly => cursor.checked_add_months(Months::new(12 * interval)),
        Frequency::Weekly => Some(cursor + Duration::days(1)),
    }
}
