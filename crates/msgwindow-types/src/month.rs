//! Calendar-month buckets over unix timestamps (UTC).
//!
//! Civil-date conversion uses the days-from-civil / civil-from-days
//! algorithms over the proleptic Gregorian calendar.

use std::fmt;

use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;

/// `(year, month)` bucket; `month` is `1..=12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthIndex {
    pub year: i32,
    pub month: u8,
}

impl MonthIndex {
    /// Month containing the unix `timestamp`.
    #[must_use]
    pub fn from_timestamp(timestamp: u32) -> Self {
        let days = i64::from(timestamp).div_euclid(SECONDS_PER_DAY);
        let (year, month, _) = civil_from_days(days);
        Self {
            year: year as i32,
            month: month as u8,
        }
    }

    /// Next month; December rolls into January of the next year.
    #[must_use]
    pub const fn successor(self) -> Self {
        if self.month >= 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Previous month; January rolls back into December of the previous year.
    #[must_use]
    pub const fn predecessor(self) -> Self {
        if self.month <= 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// First second of the month, clamped to the `u32` timestamp range.
    #[must_use]
    pub fn start_timestamp(self) -> u32 {
        let days = days_from_civil(i64::from(self.year), i64::from(self.month), 1);
        clamp_timestamp(days * SECONDS_PER_DAY)
    }

    /// Last second of the month, clamped to the `u32` timestamp range.
    #[must_use]
    pub fn end_timestamp(self) -> u32 {
        let next = self.successor();
        let days = days_from_civil(i64::from(next.year), i64::from(next.month), 1);
        clamp_timestamp(days * SECONDS_PER_DAY - 1)
    }
}

impl fmt::Display for MonthIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

fn clamp_timestamp(seconds: i64) -> u32 {
    u32::try_from(seconds.max(0)).unwrap_or(u32::MAX)
}

/// Days since 1970-01-01 for a civil date.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let shifted_month = (month + 9) % 12;
    let day_of_year = (153 * shifted_month + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}

/// Civil date `(year, month, day)` for days since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let shifted = days + 719_468;
    let era = shifted.div_euclid(146_097);
    let day_of_era = shifted - era * 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1_460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let shifted_month = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * shifted_month + 2) / 5 + 1;
    let month = if shifted_month < 10 {
        shifted_month + 3
    } else {
        shifted_month - 9
    };
    let year = year_of_era + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
