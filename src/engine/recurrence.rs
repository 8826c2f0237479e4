//! Due-date arithmetic for recurring bills.
//!
//! Everything here is a pure function of its inputs. The reference date
//! for initial due dates is always passed in by the caller.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::db::models::RecurrenceType;
use crate::error::AppError;

/// A validated recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecurrenceRule {
    OneTime,
    Monthly { day: u32 },
    Yearly { day: u32, month: u32 },
    /// Accepted for storage; has no successor dates.
    Custom,
}

impl RecurrenceRule {
    /// Build a rule from the persisted `(recurrence_type, day, month)` triple.
    /// `day`/`month` are ignored for kinds that do not use them.
    pub fn from_parts(
        kind: RecurrenceType,
        day: Option<u32>,
        month: Option<u32>,
    ) -> Result<Self, AppError> {
        match kind {
            RecurrenceType::OneTime => Ok(RecurrenceRule::OneTime),
            RecurrenceType::Custom => Ok(RecurrenceRule::Custom),
            RecurrenceType::Monthly => {
                let day = require_day(kind, day)?;
                Ok(RecurrenceRule::Monthly { day })
            }
            RecurrenceType::Yearly => {
                let day = require_day(kind, day)?;
                let month = month.ok_or_else(|| {
                    AppError::RuleValidation("yearly rule requires recurrence_month".into())
                })?;
                if !(1..=12).contains(&month) {
                    return Err(AppError::RuleValidation(format!(
                        "recurrence_month must be between 1 and 12, got {month}"
                    )));
                }
                Ok(RecurrenceRule::Yearly { day, month })
            }
        }
    }

    pub fn kind(&self) -> RecurrenceType {
        match self {
            RecurrenceRule::OneTime => RecurrenceType::OneTime,
            RecurrenceRule::Monthly { .. } => RecurrenceType::Monthly,
            RecurrenceRule::Yearly { .. } => RecurrenceType::Yearly,
            RecurrenceRule::Custom => RecurrenceType::Custom,
        }
    }

    /// Whether the generator can materialize instances for this rule.
    pub fn is_generatable(&self) -> bool {
        matches!(
            self,
            RecurrenceRule::Monthly { .. } | RecurrenceRule::Yearly { .. }
        )
    }
}

fn require_day(kind: RecurrenceType, day: Option<u32>) -> Result<u32, AppError> {
    let day = day.ok_or_else(|| {
        AppError::RuleValidation(format!("{} rule requires recurrence_day", kind.as_str()))
    })?;
    if !(1..=31).contains(&day) {
        return Err(AppError::RuleValidation(format!(
            "recurrence_day must be between 1 and 31, got {day}"
        )));
    }
    Ok(day)
}

/// What to do when the rule's day does not exist in the target month
/// (day 31 in April, day 29 of February in a non-leap year).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOverflow {
    /// Spill the surplus days into the following month:
    /// February 31st 2024 becomes March 2nd.
    #[default]
    RollOver,
    /// Use the last day of the target month.
    Clamp,
}

impl std::str::FromStr for DayOverflow {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "roll_over" | "rollover" => Ok(DayOverflow::RollOver),
            "clamp" => Ok(DayOverflow::Clamp),
            other => Err(AppError::Config(format!(
                "Invalid day_overflow '{other}'. Must be one of: roll_over, clamp"
            ))),
        }
    }
}

/// Date rule engine parameterised by the day-overflow policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRules {
    pub overflow: DayOverflow,
}

impl DateRules {
    pub fn new(overflow: DayOverflow) -> Self {
        Self { overflow }
    }

    /// First due date of a rule relative to `reference`.
    ///
    /// The occurrence in the reference month (monthly) or year (yearly) is
    /// used unless it falls strictly before `reference`, in which case the
    /// following month/year is used. Returns `None` for one-time and custom
    /// rules, whose date is supplied by the caller.
    pub fn initial_due_date(&self, rule: &RecurrenceRule, reference: NaiveDate) -> Option<NaiveDate> {
        match *rule {
            RecurrenceRule::Monthly { day } => {
                let this_month = self.date_in_month(reference.year(), reference.month(), day)?;
                if this_month < reference {
                    let next = first_of_month(reference)?.checked_add_months(Months::new(1))?;
                    self.date_in_month(next.year(), next.month(), day)
                } else {
                    Some(this_month)
                }
            }
            RecurrenceRule::Yearly { day, month } => {
                let this_year = self.date_in_month(reference.year(), month, day)?;
                if this_year < reference {
                    self.date_in_month(reference.year() + 1, month, day)
                } else {
                    Some(this_year)
                }
            }
            RecurrenceRule::OneTime | RecurrenceRule::Custom => None,
        }
    }

    /// Successor of `current` under `rule`, or `None` when the rule has none.
    ///
    /// Monthly rules use the rule's day in the month after `current`'s month;
    /// yearly rules use the rule's day and month in the year after.
    pub fn next_due_date(&self, current: NaiveDate, rule: &RecurrenceRule) -> Option<NaiveDate> {
        match *rule {
            RecurrenceRule::Monthly { day } => {
                let next = first_of_month(current)?.checked_add_months(Months::new(1))?;
                self.date_in_month(next.year(), next.month(), day)
            }
            RecurrenceRule::Yearly { day, month } => {
                self.date_in_month(current.year() + 1, month, day)
            }
            RecurrenceRule::OneTime | RecurrenceRule::Custom => None,
        }
    }

    fn date_in_month(&self, year: i32, month: u32, day: u32) -> Option<NaiveDate> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        match self.overflow {
            DayOverflow::RollOver => {
                first.checked_add_days(Days::new(u64::from(day.saturating_sub(1))))
            }
            DayOverflow::Clamp => {
                let last = days_in_month(first)?;
                NaiveDate::from_ymd_opt(year, month, day.clamp(1, last))
            }
        }
    }
}

fn first_of_month(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)
}

fn days_in_month(first: NaiveDate) -> Option<u32> {
    let next = first.checked_add_months(Months::new(1))?;
    next.pred_opt().map(|d| d.day())
}

/// [`DateRules::initial_due_date`] under the default overflow policy.
pub fn compute_initial_due_date(rule: &RecurrenceRule, reference: NaiveDate) -> Option<NaiveDate> {
    DateRules::default().initial_due_date(rule, reference)
}

/// [`DateRules::next_due_date`] under the default overflow policy.
pub fn compute_next_due_date(current: NaiveDate, rule: &RecurrenceRule) -> Option<NaiveDate> {
    DateRules::default().next_due_date(current, rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const CLAMP: DateRules = DateRules {
        overflow: DayOverflow::Clamp,
    };

    #[test]
    fn test_from_parts_requires_fields() {
        assert!(matches!(
            RecurrenceRule::from_parts(RecurrenceType::Monthly, None, None),
            Err(AppError::RuleValidation(_))
        ));
        assert!(matches!(
            RecurrenceRule::from_parts(RecurrenceType::Yearly, Some(3), None),
            Err(AppError::RuleValidation(_))
        ));
        assert!(matches!(
            RecurrenceRule::from_parts(RecurrenceType::Monthly, Some(32), None),
            Err(AppError::RuleValidation(_))
        ));
        assert!(matches!(
            RecurrenceRule::from_parts(RecurrenceType::Yearly, Some(1), Some(13)),
            Err(AppError::RuleValidation(_))
        ));
    }

    #[test]
    fn test_from_parts_ignores_unused_fields() {
        assert_eq!(
            RecurrenceRule::from_parts(RecurrenceType::OneTime, Some(99), Some(99)).unwrap(),
            RecurrenceRule::OneTime
        );
        assert_eq!(
            RecurrenceRule::from_parts(RecurrenceType::Monthly, Some(15), Some(99)).unwrap(),
            RecurrenceRule::Monthly { day: 15 }
        );
        assert_eq!(
            RecurrenceRule::from_parts(RecurrenceType::Yearly, Some(29), Some(2))
                .unwrap()
                .kind(),
            RecurrenceType::Yearly
        );
    }

    #[test]
    fn test_next_monthly_simple() {
        let rule = RecurrenceRule::Monthly { day: 15 };
        assert_eq!(compute_next_due_date(date(2024, 3, 15), &rule), Some(date(2024, 4, 15)));
        assert_eq!(compute_next_due_date(date(2024, 4, 15), &rule), Some(date(2024, 5, 15)));
    }

    #[test]
    fn test_next_monthly_crosses_year() {
        let rule = RecurrenceRule::Monthly { day: 10 };
        assert_eq!(compute_next_due_date(date(2024, 12, 10), &rule), Some(date(2025, 1, 10)));
    }

    #[test]
    fn test_next_monthly_day_31_rolls_into_march() {
        let rule = RecurrenceRule::Monthly { day: 31 };
        // 2024 is a leap year: February 31st spills two days into March
        assert_eq!(compute_next_due_date(date(2024, 1, 31), &rule), Some(date(2024, 3, 2)));
        // From the rolled date, April 31st spills into May
        assert_eq!(compute_next_due_date(date(2024, 3, 2), &rule), Some(date(2024, 5, 1)));
        assert_eq!(compute_next_due_date(date(2023, 1, 31), &rule), Some(date(2023, 3, 3)));
    }

    #[test]
    fn test_next_monthly_day_31_clamped() {
        let rule = RecurrenceRule::Monthly { day: 31 };
        assert_eq!(CLAMP.next_due_date(date(2024, 1, 31), &rule), Some(date(2024, 2, 29)));
        assert_eq!(CLAMP.next_due_date(date(2024, 2, 29), &rule), Some(date(2024, 3, 31)));
        assert_eq!(CLAMP.next_due_date(date(2024, 3, 31), &rule), Some(date(2024, 4, 30)));
    }

    #[test]
    fn test_next_yearly_leap_day() {
        let rule = RecurrenceRule::Yearly { day: 29, month: 2 };
        assert_eq!(compute_next_due_date(date(2024, 2, 29), &rule), Some(date(2025, 3, 1)));
        assert_eq!(CLAMP.next_due_date(date(2024, 2, 29), &rule), Some(date(2025, 2, 28)));
        assert_eq!(compute_next_due_date(date(2027, 3, 1), &rule), Some(date(2028, 2, 29)));
    }

    #[test]
    fn test_next_yearly_uses_rule_fields() {
        let rule = RecurrenceRule::Yearly { day: 5, month: 7 };
        assert_eq!(compute_next_due_date(date(2024, 1, 1), &rule), Some(date(2025, 7, 5)));
    }

    #[test]
    fn test_one_time_and_custom_have_no_successor() {
        for d in [date(2024, 1, 1), date(2024, 2, 29), date(1999, 12, 31)] {
            assert_eq!(compute_next_due_date(d, &RecurrenceRule::OneTime), None);
            assert_eq!(compute_next_due_date(d, &RecurrenceRule::Custom), None);
            assert_eq!(compute_initial_due_date(&RecurrenceRule::OneTime, d), None);
            assert_eq!(compute_initial_due_date(&RecurrenceRule::Custom, d), None);
        }
    }

    #[test]
    fn test_initial_monthly() {
        let rule = RecurrenceRule::Monthly { day: 20 };
        // Still ahead this month
        assert_eq!(compute_initial_due_date(&rule, date(2024, 5, 10)), Some(date(2024, 5, 20)));
        // Same day is not "before"
        assert_eq!(compute_initial_due_date(&rule, date(2024, 5, 20)), Some(date(2024, 5, 20)));
        // Already passed: next month
        assert_eq!(compute_initial_due_date(&rule, date(2024, 5, 21)), Some(date(2024, 6, 20)));
        assert_eq!(compute_initial_due_date(&rule, date(2024, 12, 25)), Some(date(2025, 1, 20)));
    }

    #[test]
    fn test_initial_monthly_overflow() {
        let rule = RecurrenceRule::Monthly { day: 31 };
        // April 31st rolls to May 1st, which is not before April 10th
        assert_eq!(compute_initial_due_date(&rule, date(2024, 4, 10)), Some(date(2024, 5, 1)));
        assert_eq!(CLAMP.initial_due_date(&rule, date(2024, 4, 10)), Some(date(2024, 4, 30)));
    }

    #[test]
    fn test_initial_yearly() {
        let rule = RecurrenceRule::Yearly { day: 1, month: 4 };
        assert_eq!(compute_initial_due_date(&rule, date(2024, 3, 1)), Some(date(2024, 4, 1)));
        assert_eq!(compute_initial_due_date(&rule, date(2024, 4, 2)), Some(date(2025, 4, 1)));
    }

    #[test]
    fn test_day_overflow_parse() {
        assert_eq!("clamp".parse::<DayOverflow>().unwrap(), DayOverflow::Clamp);
        assert_eq!("roll_over".parse::<DayOverflow>().unwrap(), DayOverflow::RollOver);
        assert!("nearest".parse::<DayOverflow>().is_err());
    }
}
