use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::achievements::{Counters, Metric};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug)]
pub struct DailyChallenge {
    pub id: &'static str,
    pub description: &'static str,
    pub metric: Metric,
    /// How many more interactions than at assignment time complete the challenge.
    pub target: u32,
    pub reward: u32,
}

pub const DAILY_CHALLENGES: &[DailyChallenge] = &[
    DailyChallenge {
        id: "open-three",
        description: "Open 3 features on the map",
        metric: Metric::PopupsOpened,
        target: 3,
        reward: 15,
    },
    DailyChallenge {
        id: "two-analyses",
        description: "Run 2 spatial analyses",
        metric: Metric::AnalysesCompleted,
        target: 2,
        reward: 20,
    },
    DailyChallenge {
        id: "bookmark-one",
        description: "Bookmark a feature",
        metric: Metric::BookmarksAdded,
        target: 1,
        reward: 10,
    },
    DailyChallenge {
        id: "filter-five",
        description: "Toggle category filters 5 times",
        metric: Metric::FiltersToggled,
        target: 5,
        reward: 10,
    },
];

/// The challenge of the day. Everyone gets the same one on the same date.
pub fn challenge_for(date: NaiveDate) -> &'static DailyChallenge {
    let index = date
        .num_days_from_ce()
        .rem_euclid(DAILY_CHALLENGES.len() as i32);
    &DAILY_CHALLENGES[index as usize]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeAssignment {
    pub challenge_id: String,
    pub assigned_on: String,
    /// Counters at assignment time; progress is measured from here.
    pub baseline: Counters,
    pub completed: bool,
}

impl ChallengeAssignment {
    pub fn assign(date: NaiveDate, counters: &Counters) -> Self {
        Self {
            challenge_id: challenge_for(date).id.to_string(),
            assigned_on: date.format(DATE_FORMAT).to_string(),
            baseline: *counters,
            completed: false,
        }
    }

    pub fn is_for(&self, date: NaiveDate) -> bool {
        NaiveDate::parse_from_str(&self.assigned_on, DATE_FORMAT)
            .map(|assigned_on| assigned_on == date)
            .unwrap_or(false)
    }

    pub fn challenge(&self) -> Option<&'static DailyChallenge> {
        DAILY_CHALLENGES
            .iter()
            .find(|challenge| challenge.id == self.challenge_id)
    }

    pub fn progress(&self, counters: &Counters) -> u32 {
        match self.challenge() {
            Some(challenge) => counters
                .get(challenge.metric)
                .saturating_sub(self.baseline.get(challenge.metric)),
            None => 0,
        }
    }

    /// Mark the challenge completed if its target is reached. Returns the reward the first time.
    pub fn check_completion(&mut self, counters: &Counters) -> Option<u32> {
        if self.completed {
            return None;
        }
        let challenge = self.challenge()?;
        if self.progress(counters) >= challenge.target {
            self.completed = true;
            return Some(challenge.reward);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_challenge_rotates_daily() {
        let monday = date(2024, 7, 1);
        let tuesday = monday.succ_opt().unwrap();
        assert_ne!(challenge_for(monday).id, challenge_for(tuesday).id);
        assert_eq!(
            challenge_for(monday).id,
            challenge_for(date(2024, 7, 5)).id
        );
    }

    #[test]
    fn test_assignment_date() {
        let today = date(2024, 7, 1);
        let assignment = ChallengeAssignment::assign(today, &Counters::default());
        assert_eq!("2024-07-01", assignment.assigned_on);
        assert!(assignment.is_for(today));
        assert!(!assignment.is_for(date(2024, 7, 2)));
    }

    #[test]
    fn test_completion_is_rewarded_once() {
        let today = date(2024, 7, 1);
        let mut counters = Counters {
            popups_opened: 4,
            analyses_completed: 4,
            filters_toggled: 4,
            bookmarks_added: 4,
        };
        let mut assignment = ChallengeAssignment::assign(today, &counters);
        let challenge = assignment.challenge().unwrap();

        assert_eq!(None, assignment.check_completion(&counters));
        for _ in 0..challenge.target {
            counters.increment(challenge.metric);
        }
        assert_eq!(challenge.target, assignment.progress(&counters));
        assert_eq!(Some(challenge.reward), assignment.check_completion(&counters));
        assert_eq!(None, assignment.check_completion(&counters));
        assert!(assignment.completed);
    }
}
