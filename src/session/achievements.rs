use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    PopupsOpened,
    AnalysesCompleted,
    FiltersToggled,
    BookmarksAdded,
}

/// Interaction counters that achievements and daily challenges are evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub popups_opened: u32,
    pub analyses_completed: u32,
    pub filters_toggled: u32,
    pub bookmarks_added: u32,
}

impl Counters {
    pub fn get(&self, metric: Metric) -> u32 {
        match metric {
            Metric::PopupsOpened => self.popups_opened,
            Metric::AnalysesCompleted => self.analyses_completed,
            Metric::FiltersToggled => self.filters_toggled,
            Metric::BookmarksAdded => self.bookmarks_added,
        }
    }

    pub fn increment(&mut self, metric: Metric) {
        let counter = match metric {
            Metric::PopupsOpened => &mut self.popups_opened,
            Metric::AnalysesCompleted => &mut self.analyses_completed,
            Metric::FiltersToggled => &mut self.filters_toggled,
            Metric::BookmarksAdded => &mut self.bookmarks_added,
        };
        *counter = counter.saturating_add(1);
    }
}

#[derive(Debug)]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub reward: u32,
    pub metric: Metric,
    pub threshold: u32,
}

impl Achievement {
    pub fn is_met(&self, counters: &Counters) -> bool {
        counters.get(self.metric) >= self.threshold
    }
}

pub const ACHIEVEMENTS: &[Achievement] = &[
    Achievement {
        id: "first-look",
        title: "Opened a first feature",
        reward: 5,
        metric: Metric::PopupsOpened,
        threshold: 1,
    },
    Achievement {
        id: "explorer",
        title: "Opened 10 features",
        reward: 20,
        metric: Metric::PopupsOpened,
        threshold: 10,
    },
    Achievement {
        id: "analyst",
        title: "Completed a spatial analysis",
        reward: 10,
        metric: Metric::AnalysesCompleted,
        threshold: 1,
    },
    Achievement {
        id: "surveyor",
        title: "Completed 5 spatial analyses",
        reward: 25,
        metric: Metric::AnalysesCompleted,
        threshold: 5,
    },
    Achievement {
        id: "curator",
        title: "Bookmarked 3 features",
        reward: 15,
        metric: Metric::BookmarksAdded,
        threshold: 3,
    },
    Achievement {
        id: "filter-master",
        title: "Toggled filters 10 times",
        reward: 10,
        metric: Metric::FiltersToggled,
        threshold: 10,
    },
];

/// Unlock every achievement whose condition now holds and which is not unlocked yet. Returns the
/// newly unlocked achievements; re-evaluating an unlocked one does nothing.
pub fn unlock_achievements<'a>(
    achievements: &'a [Achievement],
    counters: &Counters,
    unlocked: &mut BTreeSet<String>,
) -> Vec<&'a Achievement> {
    let mut newly_unlocked = Vec::new();
    for achievement in achievements {
        if !unlocked.contains(achievement.id) && achievement.is_met(counters) {
            unlocked.insert(achievement.id.to_string());
            newly_unlocked.push(achievement);
        }
    }
    newly_unlocked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(achievements: &[&Achievement]) -> Vec<&'static str> {
        achievements.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_unlock_is_idempotent() {
        let mut unlocked = BTreeSet::new();
        let counters = Counters {
            analyses_completed: 1,
            ..Default::default()
        };

        let first = unlock_achievements(ACHIEVEMENTS, &counters, &mut unlocked);
        assert_eq!(vec!["analyst"], ids(&first));
        for _ in 0..3 {
            assert!(unlock_achievements(ACHIEVEMENTS, &counters, &mut unlocked).is_empty());
        }
        assert_eq!(1, unlocked.len());
    }

    #[test]
    fn test_several_unlock_together() {
        let mut unlocked = BTreeSet::new();
        let counters = Counters {
            popups_opened: 12,
            ..Default::default()
        };
        let newly_unlocked = unlock_achievements(ACHIEVEMENTS, &counters, &mut unlocked);
        assert_eq!(vec!["first-look", "explorer"], ids(&newly_unlocked));
    }

    #[test]
    fn test_previously_unlocked_ids_are_respected() {
        let mut unlocked = BTreeSet::from(["curator".to_string()]);
        let counters = Counters {
            bookmarks_added: 5,
            ..Default::default()
        };
        assert!(unlock_achievements(ACHIEVEMENTS, &counters, &mut unlocked).is_empty());
    }

    #[test]
    fn test_counters() {
        let mut counters = Counters::default();
        counters.increment(Metric::FiltersToggled);
        counters.increment(Metric::FiltersToggled);
        assert_eq!(2, counters.get(Metric::FiltersToggled));
        assert_eq!(0, counters.get(Metric::PopupsOpened));
    }
}
