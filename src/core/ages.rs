use chrono::{Datelike, NaiveDate};

/// Minimum age to hold an account
pub const MINIMUM_AGE: u8 = 18;

/// Full years between `birthdate` and `today`, saturating at 0 and 255
pub fn age_on(birthdate: NaiveDate, today: NaiveDate) -> u8 {
    let mut years = today.year() - birthdate.year();
    if (today.month(), today.day()) < (birthdate.month(), birthdate.day()) {
        years -= 1;
    }
    years.clamp(0, u8::MAX as i32) as u8
}

pub fn is_adult(birthdate: NaiveDate, today: NaiveDate) -> bool {
    birthdate <= today && age_on(birthdate, today) >= MINIMUM_AGE
}

/// Birthdate range `(earliest, latest)` for people aged `min_age..=max_age` on `today`.
///
/// Someone is at most `max_age` if born after `today - (max_age + 1) years`,
/// and at least `min_age` if born on or before `today - min_age years`.
pub fn birthdate_bounds(min_age: u8, max_age: u8, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let latest = years_before(today, min_age as i32);
    let earliest = years_before(today, max_age as i32 + 1)
        .succ_opt()
        .unwrap_or(NaiveDate::MIN);
    (earliest, latest)
}

fn years_before(date: NaiveDate, years: i32) -> NaiveDate {
    let year = date.year() - years;
    // Feb 29 falls back to Feb 28 in non-leap years
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), date.day() - 1))
        .unwrap_or(NaiveDate::MIN)
}
