use crate::error::{Result, ShiftError};
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Builds a date, clamping the day to the length of the month.
///
/// Feb 29 on a non-leap year becomes Feb 28 instead of failing.
pub fn safe_ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    if !(1..=12).contains(&month) || day == 0 {
        return Err(ShiftError::DateError(format!(
            "Invalid date components {:04}-{:02}-{:02}",
            year, month, day
        )));
    }
    let day = day.min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        ShiftError::DateError(format!(
            "Date out of range: {:04}-{:02}-{:02}",
            year, month, day
        ))
    })
}

pub fn first_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    safe_ymd(year, month, 1)
}

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    safe_ymd(year, month, days_in_month(year, month))
}

pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    // 23:59:59 is always a valid wall-clock time
    date.and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN))
}

/// Calendar quarter (1-4) a month falls into: Jan-Mar is Q1, Oct-Dec is Q4.
pub fn quarter_of_month(month: u32) -> u32 {
    (month.clamp(1, 12) - 1) / 3 + 1
}

pub fn validate_quarter(quarter: u32) -> Result<()> {
    if !(1..=4).contains(&quarter) {
        return Err(ShiftError::DateError(format!(
            "Invalid quarter {}: must be between 1 and 4",
            quarter
        )));
    }
    Ok(())
}

/// Last second of the given calendar quarter.
pub fn quarter_end(year: i32, quarter: u32) -> Result<NaiveDateTime> {
    validate_quarter(quarter)?;
    Ok(end_of_day(last_day_of_month(year, quarter * 3)?))
}

/// First second of the given calendar quarter: one second after the end of
/// the previous quarter, rolling back a year for Q1.
pub fn quarter_start(year: i32, quarter: u32) -> Result<NaiveDateTime> {
    validate_quarter(quarter)?;
    let (prev_year, prev_quarter) = if quarter == 1 {
        (year - 1, 4)
    } else {
        (year, quarter - 1)
    };
    Ok(quarter_end(prev_year, prev_quarter)? + TimeDelta::seconds(1))
}

pub fn validate_fiscal_year_offset(offset: u32) -> Result<()> {
    if offset > 11 {
        return Err(ShiftError::InvalidConfig(format!(
            "Invalid fiscal year offset {}: must be between 0 and 11 months",
            offset
        )));
    }
    Ok(())
}

/// Month in which a fiscal year ends. An offset of 0 is a calendar year.
pub fn fiscal_year_end_month(offset: u32) -> u32 {
    if offset == 0 {
        12
    } else {
        offset
    }
}

/// Fiscal years are labelled by the calendar year in which they end.
pub fn fiscal_year_end(year: i32, offset: u32) -> Result<NaiveDate> {
    last_day_of_month(year, fiscal_year_end_month(offset))
}

pub fn fiscal_year_start(year: i32, offset: u32) -> Result<NaiveDate> {
    let previous_end = fiscal_year_end(year - 1, offset)?;
    previous_end
        .checked_add_days(Days::new(1))
        .ok_or_else(|| ShiftError::DateError(format!("No fiscal year start for {}", year)))
}

/// Label of the fiscal year a date belongs to.
pub fn fiscal_year_of(date: NaiveDate, offset: u32) -> i32 {
    if date.month() <= fiscal_year_end_month(offset) {
        date.year()
    } else {
        date.year() + 1
    }
}

/// Moves a date by whole years, keeping month and day (Feb 29 clamps).
pub fn shift_years(date: NaiveDate, years: i32) -> Result<NaiveDate> {
    safe_ymd(date.year() + years, date.month(), date.day())
}

pub fn expand_two_digit_year(yy: i32) -> i32 {
    if yy < 100 {
        2000 + yy
    } else {
        yy
    }
}

pub fn day_before(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_sub_days(Days::new(1))
        .ok_or_else(|| ShiftError::DateError(format!("No day before {}", date)))
}

pub fn same_day_and_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.month() == b.month() && a.day() == b.day()
}
