//! Timeline builder (`spec.md` §4.1).

use crate::model::Config;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Timeline {
    pub periods: u32,
    pub start_year: i32,
    pub start_month: u32,
    pub end_year: i32,
    pub end_month: u32,
    pub year: Vec<i32>,
    pub month: Vec<u32>,
    pub label: Vec<String>,
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

impl Timeline {
    /// Build from `{startYear, startMonth, endYear, endMonth}`.
    ///
    /// `periods == (endYear-startYear)*12 + (endMonth-startMonth) + 1`.
    pub fn build(config: &Config) -> Self {
        let periods = ((config.end_year - config.start_year) * 12
            + config.end_month as i32
            - config.start_month as i32
            + 1)
        .max(0) as u32;

        let mut year = Vec::with_capacity(periods as usize);
        let mut month = Vec::with_capacity(periods as usize);
        let mut label = Vec::with_capacity(periods as usize);

        let mut y = config.start_year;
        let mut m = config.start_month;
        for _ in 0..periods {
            year.push(y);
            month.push(m);
            label.push(format!("{y:04}-{m:02}"));
            m += 1;
            if m > 12 {
                m = 1;
                y += 1;
            }
        }

        Timeline {
            periods,
            start_year: config.start_year,
            start_month: config.start_month,
            end_year: config.end_year,
            end_month: config.end_month,
            year,
            month,
            label,
        }
    }

    /// Zero-based index of `(year, month)` in this timeline, if within range.
    pub fn index_of(&self, year: i32, month: u32) -> Option<usize> {
        let target = (year as i64) * 12 + month as i64;
        let base = (self.start_year as i64) * 12 + self.start_month as i64;
        let idx = target - base;
        if idx >= 0 && (idx as usize) < self.periods as usize {
            Some(idx as usize)
        } else {
            None
        }
    }

    pub fn months_key(year: i32, month: u32) -> i64 {
        year as i64 * 12 + month as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(sy: i32, sm: u32, ey: i32, em: u32) -> Config {
        Config {
            start_year: sy,
            start_month: sm,
            end_year: ey,
            end_month: em,
        }
    }

    #[test]
    fn period_count_spans_full_years() {
        let t = Timeline::build(&cfg(2024, 1, 2025, 12));
        assert_eq!(t.periods, 24);
        assert_eq!(t.year[0], 2024);
        assert_eq!(t.month[0], 1);
        assert_eq!(t.year[23], 2025);
        assert_eq!(t.month[23], 12);
    }

    #[test]
    fn single_period() {
        let t = Timeline::build(&cfg(2024, 3, 2024, 3));
        assert_eq!(t.periods, 1);
    }

    #[test]
    fn rolls_month_over_year_boundary() {
        let t = Timeline::build(&cfg(2024, 11, 2025, 2));
        assert_eq!(t.periods, 4);
        assert_eq!(t.month, vec![11, 12, 1, 2]);
        assert_eq!(t.year, vec![2024, 2024, 2025, 2025]);
    }

    #[test]
    fn leap_year_rule() {
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(2023));
        assert!(!is_leap_year(1900));
        assert!(is_leap_year(2000));
    }

    #[test]
    fn days_in_february_respects_leap_rule() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
    }
}
