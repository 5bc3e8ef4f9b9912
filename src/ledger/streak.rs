use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastLog {
    NeverLogged,
    LoggedOn(NaiveDate),
}

impl LastLog {
    pub fn from_stored(date: Option<NaiveDate>) -> Self {
        match date {
            Some(date) => Self::LoggedOn(date),
            None => Self::NeverLogged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakUpdate {
    Unchanged,
    Set {
        current_streak: i64,
        last_logged_date: NaiveDate,
    },
}

impl StreakUpdate {
    pub fn fields(self) -> Option<(i64, NaiveDate)> {
        match self {
            Self::Unchanged => None,
            Self::Set {
                current_streak,
                last_logged_date,
            } => Some((current_streak, last_logged_date)),
        }
    }
}

/// Day-distance from the last log decides the only three transitions:
/// start at one, extend by one, or reset to one. Same-day logs leave the
/// streak fields untouched.
pub fn advance(last: LastLog, current_streak: i64, today: NaiveDate) -> StreakUpdate {
    match last {
        LastLog::NeverLogged => StreakUpdate::Set {
            current_streak: 1,
            last_logged_date: today,
        },
        LastLog::LoggedOn(date) => {
            let gap_days = (today - date).num_days();

            if gap_days <= 0 {
                // Already logged today. A backwards host clock lands here too.
                StreakUpdate::Unchanged
            } else if gap_days == 1 {
                StreakUpdate::Set {
                    current_streak: current_streak + 1,
                    last_logged_date: today,
                }
            } else {
                StreakUpdate::Set {
                    current_streak: 1,
                    last_logged_date: today,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LastLog, StreakUpdate, advance};
    use chrono::NaiveDate;

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn first_log_starts_a_streak() {
        let update = advance(LastLog::NeverLogged, 0, day("2026-02-18"));

        assert_eq!(
            update,
            StreakUpdate::Set {
                current_streak: 1,
                last_logged_date: day("2026-02-18"),
            }
        );
    }

    #[test]
    fn consecutive_day_extends_the_streak() {
        let update = advance(LastLog::LoggedOn(day("2026-02-17")), 4, day("2026-02-18"));

        assert_eq!(
            update,
            StreakUpdate::Set {
                current_streak: 5,
                last_logged_date: day("2026-02-18"),
            }
        );
    }

    #[test]
    fn same_day_log_changes_nothing() {
        let update = advance(LastLog::LoggedOn(day("2026-02-18")), 4, day("2026-02-18"));

        assert_eq!(update, StreakUpdate::Unchanged);
    }

    #[test]
    fn two_day_gap_resets_to_one() {
        let update = advance(LastLog::LoggedOn(day("2026-02-15")), 9, day("2026-02-17"));

        assert_eq!(
            update,
            StreakUpdate::Set {
                current_streak: 1,
                last_logged_date: day("2026-02-17"),
            }
        );
    }

    #[test]
    fn long_gap_also_resets_to_one() {
        let update = advance(LastLog::LoggedOn(day("2025-12-01")), 30, day("2026-02-18"));

        assert_eq!(
            update,
            StreakUpdate::Set {
                current_streak: 1,
                last_logged_date: day("2026-02-18"),
            }
        );
    }

    #[test]
    fn backwards_clock_is_treated_as_same_day() {
        let update = advance(LastLog::LoggedOn(day("2026-02-18")), 4, day("2026-02-17"));

        assert_eq!(update, StreakUpdate::Unchanged);
    }
}
