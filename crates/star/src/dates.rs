//! Date dimension: one row per calendar day over a fixed range, derived from
//! the date alone. Independent of the contract data and byte-identical on
//! every regeneration.

use model::date_key;
use time::{Date, Duration, Month};

pub const DATE_DIM_START: Date = match Date::from_calendar_date(2020, Month::January, 1) {
    Ok(d) => d,
    Err(_) => panic!("invalid date dimension start"),
};
pub const DATE_DIM_END: Date = match Date::from_calendar_date(2035, Month::December, 31) {
    Ok(d) => d,
    Err(_) => panic!("invalid date dimension end"),
};

#[derive(Debug, Clone, PartialEq)]
pub struct DateRow {
    pub date_key: i32,
    pub full_date: Date,
    pub year: i32,
    pub month: u8,
    pub day_of_month: u8,
    pub quarter: u8,
    /// Monday = 1 .. Sunday = 7.
    pub day_of_week: u8,
    pub month_name: &'static str,
    pub is_weekend: bool,
}

pub fn build_date_dim() -> Vec<DateRow> {
    let mut rows = Vec::with_capacity(5_844);
    let mut d = DATE_DIM_START;
    while d <= DATE_DIM_END {
        let month = u8::from(d.month());
        // time's number_from_monday already uses the Monday-first convention
        // required here; no further remapping.
        let day_of_week = d.weekday().number_from_monday();
        rows.push(DateRow {
            date_key: date_key(d),
            full_date: d,
            year: d.year(),
            month,
            day_of_month: d.day(),
            quarter: (month - 1) / 3 + 1,
            day_of_week,
            month_name: month_name(d.month()),
            is_weekend: day_of_week >= 6,
        });
        d = d + Duration::days(1);
    }
    rows
}

fn month_name(m: Month) -> &'static str {
    match m {
        Month::January => "January",
        Month::February => "February",
        Month::March => "March",
        Month::April => "April",
        Month::May => "May",
        Month::June => "June",
        Month::July => "July",
        Month::August => "August",
        Month::September => "September",
        Month::October => "October",
        Month::November => "November",
        Month::December => "December",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn covers_the_full_fixed_range() {
        let dim = build_date_dim();
        assert_eq!(dim.len(), 5_844);
        assert_eq!(dim.first().unwrap().date_key, 20_200_101);
        assert_eq!(dim.last().unwrap().date_key, 20_351_231);
    }

    #[test]
    fn quarter_follows_the_month() {
        let dim = build_date_dim();
        for row in &dim {
            assert!((1..=4).contains(&row.quarter));
            assert_eq!(row.quarter, (row.month - 1) / 3 + 1);
        }
        let july = dim.iter().find(|r| r.month == 7).unwrap();
        assert_eq!(july.quarter, 3);
    }

    #[test]
    fn day_of_week_is_monday_first() {
        let dim = build_date_dim();
        // 2020-01-01 was a Wednesday, 2026-02-10 a Tuesday.
        let first = &dim[0];
        assert_eq!(first.day_of_week, 3);
        assert!(!first.is_weekend);

        let idx = dim
            .iter()
            .position(|r| r.full_date == date!(2026 - 02 - 10))
            .unwrap();
        assert_eq!(dim[idx].day_of_week, 2);

        // 2020-01-04 was a Saturday.
        assert_eq!(dim[3].day_of_week, 6);
        assert!(dim[3].is_weekend);
    }

    #[test]
    fn month_names_line_up() {
        let dim = build_date_dim();
        assert_eq!(dim[0].month_name, "January");
        assert_eq!(dim.last().unwrap().month_name, "December");
    }

    #[test]
    fn regeneration_is_identical() {
        assert_eq!(build_date_dim(), build_date_dim());
    }
}
