//! Daily activity streaks
//!
//! A day counts when the user logged at least one activity that was later
//! verified. Days are UTC calendar days of the activity's `created_at`.

use std::collections::BTreeSet;

use chrono::{DateTime, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{ActivityRecord, ActivityStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Streaks {
    /// Run of consecutive days ending today or yesterday; 0 once broken
    pub current: u32,
    pub longest: u32,
}

impl Streaks {
    pub fn from_days(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> Self {
        let mut longest = 0;
        let mut run = 0;
        let mut prev: Option<NaiveDate> = None;
        for &day in days {
            run = match prev {
                Some(p) if p.checked_add_days(Days::new(1)) == Some(day) => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            prev = Some(day);
        }

        // Still alive if the last active day was today or yesterday
        let current = match prev {
            Some(last) if last <= today && (today - last).num_days() <= 1 => run,
            _ => 0,
        };
        Self { current, longest }
    }

    pub fn from_activities<'a>(
        activities: impl IntoIterator<Item = &'a ActivityRecord>,
        today: NaiveDate,
    ) -> Self {
        let days: BTreeSet<NaiveDate> = activities
            .into_iter()
            .filter(|a| a.status == ActivityStatus::Verified)
            .filter_map(|a| DateTime::from_timestamp_millis(a.created_at))
            .map(|dt| dt.date_naive())
            .collect();
        Self::from_days(&days, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_current_and_longest() {
        let days: BTreeSet<_> = [1, 2, 3, 4, 8, 9].into_iter().map(day).collect();

        assert_eq!(Streaks::from_days(&days, day(9)), Streaks { current: 2, longest: 4 });
        assert_eq!(Streaks::from_days(&days, day(10)), Streaks { current: 2, longest: 4 });
        // A missed day breaks the current run
        assert_eq!(Streaks::from_days(&days, day(11)), Streaks { current: 0, longest: 4 });
    }

    #[test]
    fn test_no_days() {
        assert_eq!(Streaks::from_days(&BTreeSet::new(), day(1)), Streaks::default());
    }

    #[test]
    fn test_only_verified_activities_count() {
        use crate::domain::ActivityDuration;

        let at = |d: u32, status| ActivityRecord {
            id: d as i64,
            user_id: 1,
            kind: "coding".to_string(),
            duration: ActivityDuration::default(),
            status,
            description: None,
            created_at: day(d).and_hms_opt(12, 0, 0).unwrap().and_utc().timestamp_millis(),
        };
        let activities = vec![
            at(1, ActivityStatus::Verified),
            at(2, ActivityStatus::Rejected),
            at(3, ActivityStatus::Verified),
            at(4, ActivityStatus::Verified),
        ];
        assert_eq!(
            Streaks::from_activities(&activities, day(4)),
            Streaks { current: 2, longest: 2 }
        );
    }
}
