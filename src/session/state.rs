use std::{collections::BTreeSet, fmt::Display};

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::feature::feature::FeatureId;

use super::{
    achievements::{unlock_achievements, Achievement, Counters, Metric, ACHIEVEMENTS},
    challenge::ChallengeAssignment,
    kv_store::KeyValueStore,
};

pub const THEME_KEY: &str = "theme";
pub const POINTS_KEY: &str = "points";
pub const ACHIEVEMENTS_KEY: &str = "achievements";
pub const BOOKMARKS_KEY: &str = "bookmarks";
pub const COUNTERS_KEY: &str = "counters";
pub const LEADERBOARD_KEY: &str = "leaderboard";
pub const CHALLENGE_KEY: &str = "dailyChallenge";
pub const AUTH_TOKEN_KEY: &str = "authToken";

pub const LEADERBOARD_SIZE: usize = 10;

const POPUP_POINTS: u32 = 1;
const ANALYSIS_POINTS: u32 = 5;
const FILTER_POINTS: u32 = 1;
const BOOKMARK_POINTS: u32 = 2;

const OSM_ATTRIBUTION: &str = "© <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn tile_url(&self) -> &'static str {
        match self {
            Theme::Light => "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
            Theme::Dark => "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png",
        }
    }

    pub fn attribution(&self) -> String {
        match self {
            Theme::Light => OSM_ATTRIBUTION.to_string(),
            Theme::Dark => format!(
                "{} & © <a href=\"https://carto.com/attributions\">CARTO</a>",
                OSM_ATTRIBUTION
            ),
        }
    }
}

impl Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub points: u32,
}

/// What a single interaction earned.
#[derive(Debug, Default)]
pub struct Progress {
    pub points_awarded: u32,
    pub unlocked: Vec<&'static Achievement>,
    pub challenge_completed: bool,
}

impl Progress {
    pub fn is_empty(&self) -> bool {
        self.points_awarded == 0 && self.unlocked.is_empty() && !self.challenge_completed
    }
}

/// Per-user state that survives restarts. Every mutation is written through to the store.
pub struct Session<S: KeyValueStore> {
    store: S,
    username: String,
    theme: Theme,
    points: u32,
    unlocked: BTreeSet<String>,
    bookmarks: Vec<FeatureId>,
    counters: Counters,
    leaderboard: Vec<LeaderboardEntry>,
    challenge: Option<ChallengeAssignment>,
}

fn read_value<S: KeyValueStore, T: DeserializeOwned + Default>(store: &S, key: &str) -> T {
    match store.get(key) {
        None => T::default(),
        Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            log::warn!("Stored value for '{}' is unreadable ({}), using default", key, err);
            T::default()
        }),
    }
}

fn encode<T: Serialize>(key: &'static str, value: &T) -> anyhow::Result<(&'static str, String)> {
    Ok((key, serde_json::to_string(value)?))
}

impl<S: KeyValueStore> Session<S> {
    pub fn load(store: S, username: &str) -> Self {
        Self {
            theme: read_value(&store, THEME_KEY),
            points: read_value(&store, POINTS_KEY),
            unlocked: read_value(&store, ACHIEVEMENTS_KEY),
            bookmarks: read_value(&store, BOOKMARKS_KEY),
            counters: read_value(&store, COUNTERS_KEY),
            leaderboard: read_value(&store, LEADERBOARD_KEY),
            challenge: read_value(&store, CHALLENGE_KEY),
            username: username.to_string(),
            store,
        }
    }

    /// Write every persisted value in a single store update.
    pub fn save(&mut self) -> anyhow::Result<()> {
        let entries = vec![
            encode(THEME_KEY, &self.theme)?,
            encode(POINTS_KEY, &self.points)?,
            encode(ACHIEVEMENTS_KEY, &self.unlocked)?,
            encode(BOOKMARKS_KEY, &self.bookmarks)?,
            encode(COUNTERS_KEY, &self.counters)?,
            encode(LEADERBOARD_KEY, &self.leaderboard)?,
            encode(CHALLENGE_KEY, &self.challenge)?,
        ];
        self.store.set_many(entries)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn unlocked(&self) -> &BTreeSet<String> {
        &self.unlocked
    }

    pub fn bookmarks(&self) -> &[FeatureId] {
        &self.bookmarks
    }

    pub fn is_bookmarked(&self, id: &str) -> bool {
        self.bookmarks.iter().any(|bookmark| bookmark == id)
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn leaderboard(&self) -> &[LeaderboardEntry] {
        &self.leaderboard
    }

    pub fn challenge(&self) -> Option<&ChallengeAssignment> {
        self.challenge.as_ref()
    }

    pub fn auth_token(&self) -> Option<String> {
        self.store.get(AUTH_TOKEN_KEY).filter(|token| !token.is_empty())
    }

    pub fn set_auth_token(&mut self, token: &str) -> anyhow::Result<()> {
        self.store.set(AUTH_TOKEN_KEY, token.to_string())
    }

    pub fn clear_auth_token(&mut self) -> anyhow::Result<()> {
        self.store.remove(AUTH_TOKEN_KEY)
    }

    pub fn toggle_theme(&mut self) -> anyhow::Result<Theme> {
        self.theme = self.theme.toggled();
        self.save()?;
        Ok(self.theme)
    }

    /// Assign today's challenge unless the stored assignment is already for today.
    pub fn refresh_daily_challenge(&mut self, today: NaiveDate) -> anyhow::Result<()> {
        let current = self
            .challenge
            .as_ref()
            .map(|assignment| assignment.is_for(today))
            .unwrap_or(false);
        if !current {
            let assignment = ChallengeAssignment::assign(today, &self.counters);
            log::info!("Daily challenge for {}: {}", assignment.assigned_on, assignment.challenge_id);
            self.challenge = Some(assignment);
            self.save()?;
        }
        Ok(())
    }

    pub fn record_popup_opened(&mut self) -> anyhow::Result<Progress> {
        self.record(Metric::PopupsOpened, POPUP_POINTS)
    }

    pub fn record_analysis_completed(&mut self) -> anyhow::Result<Progress> {
        self.record(Metric::AnalysesCompleted, ANALYSIS_POINTS)
    }

    pub fn record_filter_toggled(&mut self) -> anyhow::Result<Progress> {
        self.record(Metric::FiltersToggled, FILTER_POINTS)
    }

    /// Add `id` to the bookmarks, or remove it if already there. Only additions count as progress.
    pub fn toggle_bookmark(&mut self, id: &str) -> anyhow::Result<(bool, Progress)> {
        if let Some(position) = self.bookmarks.iter().position(|bookmark| bookmark == id) {
            self.bookmarks.remove(position);
            self.save()?;
            return Ok((false, Progress::default()));
        }
        self.bookmarks.push(id.to_string());
        let progress = self.record(Metric::BookmarksAdded, BOOKMARK_POINTS)?;
        Ok((true, progress))
    }

    fn record(&mut self, metric: Metric, points: u32) -> anyhow::Result<Progress> {
        self.counters.increment(metric);
        let mut progress = Progress {
            points_awarded: points,
            ..Default::default()
        };

        for achievement in unlock_achievements(ACHIEVEMENTS, &self.counters, &mut self.unlocked) {
            log::info!("Achievement unlocked: {}", achievement.title);
            progress.points_awarded += achievement.reward;
            progress.unlocked.push(achievement);
        }
        if let Some(assignment) = self.challenge.as_mut() {
            if let Some(reward) = assignment.check_completion(&self.counters) {
                log::info!("Daily challenge {} completed", assignment.challenge_id);
                progress.points_awarded += reward;
                progress.challenge_completed = true;
            }
        }

        self.points = self.points.saturating_add(progress.points_awarded);
        self.update_leaderboard();
        self.save()?;
        Ok(progress)
    }

    fn update_leaderboard(&mut self) {
        match self
            .leaderboard
            .iter_mut()
            .find(|entry| entry.name == self.username)
        {
            Some(entry) => entry.points = self.points,
            None => self.leaderboard.push(LeaderboardEntry {
                name: self.username.clone(),
                points: self.points,
            }),
        }
        self.leaderboard.sort_by(|a, b| b.points.cmp(&a.points));
        self.leaderboard.truncate(LEADERBOARD_SIZE);
    }
}

#[cfg(test)]
mod tests {
    use testdir::testdir;

    use crate::session::kv_store::{JsonFileStore, MemoryStore};

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    #[test]
    fn test_fresh_session_defaults() {
        let session = Session::load(MemoryStore::new(), "ada");
        assert_eq!(Theme::Light, session.theme());
        assert_eq!(0, session.points());
        assert!(session.bookmarks().is_empty());
        assert!(session.challenge().is_none());
        assert_eq!(None, session.auth_token());
    }

    #[test]
    fn test_achievement_rewarded_once() {
        let mut session = Session::load(MemoryStore::new(), "ada");
        let first = session.record_analysis_completed().unwrap();
        assert_eq!(vec!["analyst"], first.unlocked.iter().map(|a| a.id).collect::<Vec<_>>());
        assert_eq!(ANALYSIS_POINTS + 10, first.points_awarded);

        let second = session.record_analysis_completed().unwrap();
        assert!(second.unlocked.is_empty());
        assert_eq!(ANALYSIS_POINTS, second.points_awarded);
        assert_eq!(2 * ANALYSIS_POINTS + 10, session.points());
        assert_eq!(1, session.unlocked().len());
    }

    #[test]
    fn test_toggle_bookmark() {
        let mut session = Session::load(MemoryStore::new(), "ada");
        let (added, progress) = session.toggle_bookmark("17").unwrap();
        assert!(added);
        assert_eq!(BOOKMARK_POINTS, progress.points_awarded);
        assert!(session.is_bookmarked("17"));

        let (added, progress) = session.toggle_bookmark("17").unwrap();
        assert!(!added);
        assert!(progress.is_empty());
        assert!(!session.is_bookmarked("17"));
        assert_eq!(1, session.counters().bookmarks_added);
    }

    #[test]
    fn test_daily_challenge_assigned_once_per_day() {
        let mut session = Session::load(MemoryStore::new(), "ada");
        session.refresh_daily_challenge(today()).unwrap();
        let assigned = session.challenge().cloned().unwrap();
        session.record_popup_opened().unwrap();
        session.refresh_daily_challenge(today()).unwrap();
        assert_eq!(Some(&assigned), session.challenge());

        let tomorrow = today().succ_opt().unwrap();
        session.refresh_daily_challenge(tomorrow).unwrap();
        let reassigned = session.challenge().unwrap();
        assert!(reassigned.is_for(tomorrow));
        assert_eq!(1, reassigned.baseline.popups_opened);
    }

    #[test]
    fn test_leaderboard_keeps_top_entries() {
        let mut store = MemoryStore::new();
        let others: Vec<LeaderboardEntry> = (0..LEADERBOARD_SIZE as u32)
            .map(|i| LeaderboardEntry {
                name: format!("player{}", i),
                points: 100 + i,
            })
            .collect();
        store
            .set(LEADERBOARD_KEY, serde_json::to_string(&others).unwrap())
            .unwrap();

        let mut session = Session::load(store, "ada");
        session.record_popup_opened().unwrap();
        assert_eq!(LEADERBOARD_SIZE, session.leaderboard().len());
        assert!(session.leaderboard().iter().all(|entry| entry.name != "ada"));
        assert_eq!(109, session.leaderboard()[0].points);
    }

    #[test]
    fn test_corrupt_values_fall_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.set(POINTS_KEY, "lots".to_string()).unwrap();
        store.set(THEME_KEY, "\"dark\"".to_string()).unwrap();
        let session = Session::load(store, "ada");
        assert_eq!(0, session.points());
        assert_eq!(Theme::Dark, session.theme());
    }

    #[test]
    fn test_state_survives_restart() {
        let test_dir = testdir!();
        let filepath = test_dir.join("session.json");
        {
            let store = JsonFileStore::open(&filepath).unwrap();
            let mut session = Session::load(store, "ada");
            session.toggle_theme().unwrap();
            session.toggle_bookmark("42").unwrap();
            session.record_analysis_completed().unwrap();
            session.set_auth_token("secret").unwrap();
        }

        let session = Session::load(JsonFileStore::open(&filepath).unwrap(), "ada");
        assert_eq!(Theme::Dark, session.theme());
        assert_eq!(vec!["42".to_string()], session.bookmarks());
        assert!(session.unlocked().contains("analyst"));
        assert_eq!(Some("secret".to_string()), session.auth_token());
        assert_eq!(
            vec![LeaderboardEntry {
                name: "ada".to_string(),
                points: session.points()
            }],
            session.leaderboard()
        );
    }

    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        single_writes: usize,
        batches: usize,
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: String) -> anyhow::Result<()> {
            self.single_writes += 1;
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> anyhow::Result<()> {
            self.inner.remove(key)
        }

        fn set_many(&mut self, entries: Vec<(&str, String)>) -> anyhow::Result<()> {
            self.batches += 1;
            self.inner.set_many(entries)
        }
    }

    #[test]
    fn test_each_interaction_is_one_store_update() {
        let mut session = Session::load(CountingStore::default(), "ada");
        session.toggle_bookmark("42").unwrap();
        assert_eq!(1, session.store.batches);
        session.record_popup_opened().unwrap();
        assert_eq!(2, session.store.batches);
        assert_eq!(0, session.store.single_writes);
        assert_eq!(Some("[\"42\"]".to_string()), session.store.get(BOOKMARKS_KEY));
    }

    #[test]
    fn test_theme_tiles() {
        assert!(Theme::Dark.tile_url().contains("dark_all"));
        assert!(Theme::Dark.attribution().contains("CARTO"));
        assert_eq!(Theme::Light, Theme::Dark.toggled());
    }
}
