use billcycle::engine::recurrence::{
    compute_initial_due_date, compute_next_due_date, DateRules, DayOverflow, RecurrenceRule,
};
use chrono::{Datelike, Days, NaiveDate};
use proptest::prelude::*;

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0u64..36_500).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .checked_add_days(Days::new(offset))
            .unwrap()
    })
}

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

const CLAMP: DateRules = DateRules {
    overflow: DayOverflow::Clamp,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// One-time and custom rules never have a successor.
    #[test]
    fn prop_non_recurring_has_no_successor(current in date_strategy()) {
        prop_assert_eq!(compute_next_due_date(current, &RecurrenceRule::OneTime), None);
        prop_assert_eq!(compute_next_due_date(current, &RecurrenceRule::Custom), None);
        prop_assert_eq!(CLAMP.next_due_date(current, &RecurrenceRule::OneTime), None);
    }

    /// Monthly successors always move forward into the next month, or
    /// the one after when the day spills over.
    #[test]
    fn prop_monthly_next_advances(current in date_strategy(), day in 1u32..=31) {
        let rule = RecurrenceRule::Monthly { day };
        let next = compute_next_due_date(current, &rule).unwrap();
        prop_assert!(next > current);
        let step = month_index(next) - month_index(current);
        prop_assert!(step == 1 || step == 2, "stepped {} months", step);
        if step == 1 {
            prop_assert_eq!(next.day(), day);
        }
    }

    /// Clamped successors always land in the very next month.
    #[test]
    fn prop_monthly_clamped_stays_in_next_month(current in date_strategy(), day in 1u32..=31) {
        let rule = RecurrenceRule::Monthly { day };
        let next = CLAMP.next_due_date(current, &rule).unwrap();
        prop_assert_eq!(month_index(next) - month_index(current), 1);
        prop_assert!(next.day() <= day);
    }

    /// Both policies agree whenever the day exists in every month.
    #[test]
    fn prop_policies_agree_on_short_days(current in date_strategy(), day in 1u32..=28, month in 1u32..=12) {
        for rule in [RecurrenceRule::Monthly { day }, RecurrenceRule::Yearly { day, month }] {
            prop_assert_eq!(
                compute_next_due_date(current, &rule),
                CLAMP.next_due_date(current, &rule)
            );
        }
    }

    /// Yearly successors land in the following year.
    #[test]
    fn prop_yearly_next_is_next_year(current in date_strategy(), day in 1u32..=31, month in 1u32..=12) {
        let rule = RecurrenceRule::Yearly { day, month };
        let next = CLAMP.next_due_date(current, &rule).unwrap();
        prop_assert_eq!(next.year(), current.year() + 1);
        prop_assert_eq!(next.month(), month);
        prop_assert!(compute_next_due_date(current, &rule).unwrap() > current);
    }

    /// The first due date is never before the reference date.
    #[test]
    fn prop_initial_not_before_reference(reference in date_strategy(), day in 1u32..=31, month in 1u32..=12) {
        for rule in [RecurrenceRule::Monthly { day }, RecurrenceRule::Yearly { day, month }] {
            let initial = compute_initial_due_date(&rule, reference).unwrap();
            prop_assert!(initial >= reference);
            let clamped = CLAMP.initial_due_date(&rule, reference).unwrap();
            prop_assert!(clamped >= reference);
        }
    }
}
