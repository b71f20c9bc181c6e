//! Users, sessions and predictions.
//!
//! All tables live in memory and are written out as a single JSON snapshot
//! after every mutation made through [`Store::commit`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth;
use crate::draft::DraftDiff;
use crate::error::AppError;
use crate::scoring::Gradebook;
use crate::types::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

/// A user's current choices for one week.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekPicks {
    pub picks: BTreeMap<String, String>,
    pub props: BTreeMap<String, String>,
}

/// A submission for one week. `None` clears a previous choice.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekSubmission {
    #[serde(default)]
    pub picks: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub props: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedPick {
    pub user: PublicUser,
    pub pick: String,
}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    sessions: BTreeMap<String, Session>,
    #[serde(default)]
    predictions: Vec<Prediction>,
    #[serde(default)]
    prop_answers: Vec<PropAnswer>,
    #[serde(default)]
    game_results: BTreeMap<String, GameResult>,
    #[serde(default)]
    prop_results: BTreeMap<String, String>,
}

pub struct Store {
    weeks: Vec<WeekSchedule>,
    games: HashMap<String, Game>,
    props: HashMap<String, PropBet>,
    pick_points: u32,
    prop_points: u32,

    /// user_id -> user
    users: DashMap<String, User>,
    /// lowercased username -> user_id
    usernames: DashMap<String, String>,
    /// token -> session
    sessions: DashMap<String, Session>,
    /// (user_id, game_id) -> prediction
    predictions: DashMap<(String, String), Prediction>,
    /// (user_id, prop_id) -> answer
    prop_answers: DashMap<(String, String), PropAnswer>,
    game_results: DashMap<String, GameResult>,
    prop_results: DashMap<String, String>,

    data_path: Option<PathBuf>,
    save_lock: Mutex<()>,
}

impl Store {
    /// Builds the store and loads any existing snapshot from `data_path`.
    /// Without a path nothing is persisted.
    pub fn open(
        weeks: Vec<WeekSchedule>,
        league: &LeagueConfig,
        data_path: Option<PathBuf>,
    ) -> Result<Self, AppError> {
        let games = weeks
            .iter()
            .flat_map(|w| w.games.iter())
            .map(|g| (g.id.clone(), g.clone()))
            .collect();
        let props = weeks
            .iter()
            .flat_map(|w| w.props.iter())
            .map(|p| (p.id.clone(), p.clone()))
            .collect();

        let store = Self {
            weeks,
            games,
            props,
            pick_points: league.pick_points,
            prop_points: league.prop_points,
            users: DashMap::new(),
            usernames: DashMap::new(),
            sessions: DashMap::new(),
            predictions: DashMap::new(),
            prop_answers: DashMap::new(),
            game_results: DashMap::new(),
            prop_results: DashMap::new(),
            data_path,
            save_lock: Mutex::new(()),
        };

        if let Some(path) = store.data_path.as_ref().filter(|p| p.exists()) {
            let data = std::fs::read_to_string(path).map_err(AppError::internal)?;
            let snapshot: Snapshot = serde_json::from_str(&data).map_err(AppError::internal)?;
            store.restore(snapshot);
            tracing::info!(
                "Loaded {} users and {} picks from {}",
                store.users.len(),
                store.predictions.len(),
                path.display()
            );
        }

        Ok(store)
    }

    fn restore(&self, snapshot: Snapshot) {
        for user in snapshot.users {
            self.usernames
                .insert(user.username.to_lowercase(), user.id.clone());
            self.users.insert(user.id.clone(), user);
        }
        for (token, session) in snapshot.sessions {
            self.sessions.insert(token, session);
        }
        for p in snapshot.predictions {
            self.predictions
                .insert((p.user_id.clone(), p.game_id.clone()), p);
        }
        for a in snapshot.prop_answers {
            self.prop_answers
                .insert((a.user_id.clone(), a.prop_id.clone()), a);
        }
        for (game_id, result) in snapshot.game_results {
            self.game_results.insert(game_id, result);
        }
        for (prop_id, answer) in snapshot.prop_results {
            self.prop_results.insert(prop_id, answer);
        }
    }

    /// Replaces every table with the contents of `snapshot`.
    fn reset(&self, snapshot: Snapshot) {
        self.users.clear();
        self.usernames.clear();
        self.sessions.clear();
        self.predictions.clear();
        self.prop_answers.clear();
        self.game_results.clear();
        self.prop_results.clear();
        self.restore(snapshot);
    }

    /// Expired sessions are left out.
    fn snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        Snapshot {
            users: self.users.iter().map(|u| u.value().clone()).collect(),
            sessions: self
                .sessions
                .iter()
                .filter(|s| s.value().expires_at > now)
                .map(|s| (s.key().clone(), s.value().clone()))
                .collect(),
            predictions: self.predictions.iter().map(|p| p.value().clone()).collect(),
            prop_answers: self.prop_answers.iter().map(|a| a.value().clone()).collect(),
            game_results: self
                .game_results
                .iter()
                .map(|r| (r.key().clone(), *r.value()))
                .collect(),
            prop_results: self
                .prop_results
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect(),
        }
    }

    /// Applies a mutation and writes the result to disk.
    ///
    /// Mutations are serialized behind the save lock. If the write fails the
    /// tables are put back the way they were and the error is returned, so
    /// memory never holds changes the snapshot file does not.
    pub async fn commit<T>(
        &self,
        now: DateTime<Utc>,
        apply: impl FnOnce(&Self) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let _guard = self.save_lock.lock().await;
        let Some(path) = &self.data_path else {
            return apply(self);
        };

        let before = self.snapshot(now);
        let value = apply(self)?;
        if let Err(err) = write_snapshot(path, &self.snapshot(now)).await {
            self.reset(before);
            tracing::warn!("Rolled back a change that could not be saved");
            return Err(err);
        }
        Ok(value)
    }

    // ─── Schedule ─────────────────────────────────────────────────

    pub fn weeks(&self) -> &[WeekSchedule] {
        &self.weeks
    }

    pub fn week(&self, week: u32) -> Option<&WeekSchedule> {
        self.weeks.iter().find(|w| w.week == week)
    }

    pub fn game(&self, game_id: &str) -> Option<&Game> {
        self.games.get(game_id)
    }

    pub fn prop(&self, prop_id: &str) -> Option<&PropBet> {
        self.props.get(prop_id)
    }

    /// The first week that still has a game to kick off, or the last week
    /// once the season is over.
    pub fn current_week(&self, now: DateTime<Utc>) -> Option<u32> {
        self.weeks
            .iter()
            .find(|w| w.games.iter().any(|g| !g.is_locked(now)))
            .or_else(|| self.weeks.last())
            .map(|w| w.week)
    }

    // ─── Accounts ─────────────────────────────────────────────────

    pub fn register(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<PublicUser, AppError> {
        auth::validate_username(username)?;
        auth::validate_password(password)?;

        let id = Uuid::new_v4().to_string();
        match self.usernames.entry(username.to_lowercase()) {
            Entry::Occupied(_) => {
                return Err(AppError::Conflict("Username already taken".to_string()));
            }
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }

        let salt = auth::new_salt();
        let user = User {
            id: id.clone(),
            username: username.to_string(),
            password_hash: auth::hash_password(&salt, password),
            salt,
            created_at: now,
        };
        let public = PublicUser::from(&user);
        self.users.insert(id, user);

        tracing::info!("Registered user {}", username);
        Ok(public)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<PublicUser, AppError> {
        let id = self
            .usernames
            .get(&username.to_lowercase())
            .map(|id| id.value().clone())
            .ok_or(AppError::InvalidCredentials)?;
        let user = self.users.get(&id).ok_or(AppError::InvalidCredentials)?;

        if !auth::verify_password(&user, password) {
            tracing::warn!("Failed login for {}", user.username);
            return Err(AppError::InvalidCredentials);
        }
        Ok(PublicUser::from(user.value()))
    }

    pub fn users(&self) -> Vec<PublicUser> {
        self.users.iter().map(|u| PublicUser::from(u.value())).collect()
    }

    /// Starts a session. Sessions that have already expired are pruned.
    pub fn create_session(&self, user_id: &str, now: DateTime<Utc>) -> String {
        self.sessions.retain(|_, s| s.expires_at > now);
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                user_id: user_id.to_string(),
                expires_at: now + Duration::days(auth::SESSION_TTL_DAYS),
            },
        );
        token
    }

    /// Resolves a session token, dropping it if it has expired.
    pub fn session_user(&self, token: &str, now: DateTime<Utc>) -> Option<PublicUser> {
        let user_id = {
            let session = self.sessions.get(token)?;
            (session.expires_at > now).then(|| session.user_id.clone())
        };
        match user_id {
            Some(id) => self.users.get(&id).map(|u| PublicUser::from(u.value())),
            None => {
                self.sessions.remove(token);
                None
            }
        }
    }

    pub fn end_session(&self, token: &str) {
        self.sessions.remove(token);
    }

    // ─── Predictions ──────────────────────────────────────────────

    pub fn predictions(&self) -> Vec<Prediction> {
        self.predictions.iter().map(|p| p.value().clone()).collect()
    }

    pub fn prop_answers(&self) -> Vec<PropAnswer> {
        self.prop_answers.iter().map(|a| a.value().clone()).collect()
    }

    pub fn week_picks(&self, user_id: &str, week: u32) -> WeekPicks {
        let mut out = WeekPicks::default();
        let Some(schedule) = self.week(week) else {
            return out;
        };

        for game in &schedule.games {
            let key = (user_id.to_string(), game.id.clone());
            if let Some(p) = self.predictions.get(&key) {
                out.picks.insert(game.id.clone(), p.pick.clone());
            }
        }
        for prop in &schedule.props {
            let key = (user_id.to_string(), prop.id.clone());
            if let Some(a) = self.prop_answers.get(&key) {
                out.props.insert(prop.id.clone(), a.answer.clone());
            }
        }
        out
    }

    /// Applies a week's submission atomically: either every change is valid
    /// and unlocked, or nothing is written.
    ///
    /// Entries that match what is already stored are accepted even when
    /// their game has kicked off, so clients may resend a full sheet.
    pub fn submit(
        &self,
        user_id: &str,
        week: u32,
        submission: &WeekSubmission,
        now: DateTime<Utc>,
    ) -> Result<WeekPicks, AppError> {
        let schedule = self
            .week(week)
            .ok_or_else(|| AppError::NotFound(format!("Week {week}")))?;

        for (game_id, pick) in &submission.picks {
            let game = schedule
                .games
                .iter()
                .find(|g| g.id == *game_id)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown game {game_id}")))?;
            if let Some(team) = pick.as_deref().filter(|t| !game.has_team(t)) {
                return Err(AppError::BadRequest(format!(
                    "{team} is not playing in {game_id}"
                )));
            }
        }
        for (prop_id, answer) in &submission.props {
            let prop = schedule
                .props
                .iter()
                .find(|p| p.id == *prop_id)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown prop {prop_id}")))?;
            if let Some(answer) = answer.as_deref().filter(|a| !prop.options.iter().any(|o| o == *a)) {
                return Err(AppError::BadRequest(format!(
                    "{answer} is not an option for {prop_id}"
                )));
            }
        }

        let current = self.week_picks(user_id, week);
        let pick_diff = DraftDiff::compute(&current.picks, &submission.picks);
        let prop_diff = DraftDiff::compute(&current.props, &submission.props);

        let mut locked_games: Vec<String> = pick_diff
            .touched()
            .filter(|id| self.game(id).is_some_and(|g| g.is_locked(now)))
            .map(str::to_string)
            .collect();
        let mut locked_props: Vec<String> = if schedule.props_locked(now) {
            prop_diff.touched().map(str::to_string).collect()
        } else {
            vec![]
        };
        if !locked_games.is_empty() || !locked_props.is_empty() {
            locked_games.sort();
            locked_props.sort();
            return Err(AppError::Locked {
                games: locked_games,
                props: locked_props,
            });
        }

        let user = user_id.to_string();
        for (game_id, pick) in pick_diff
            .added
            .iter()
            .chain(pick_diff.changed.iter().map(|c| (&c.key, &c.to)))
        {
            self.predictions.insert(
                (user.clone(), game_id.clone()),
                Prediction {
                    user_id: user.clone(),
                    game_id: game_id.clone(),
                    pick: pick.clone(),
                    submitted_at: now,
                },
            );
        }
        for game_id in &pick_diff.removed {
            self.predictions.remove(&(user.clone(), game_id.clone()));
        }

        for (prop_id, answer) in prop_diff
            .added
            .iter()
            .chain(prop_diff.changed.iter().map(|c| (&c.key, &c.to)))
        {
            self.prop_answers.insert(
                (user.clone(), prop_id.clone()),
                PropAnswer {
                    user_id: user.clone(),
                    prop_id: prop_id.clone(),
                    answer: answer.clone(),
                    submitted_at: now,
                },
            );
        }
        for prop_id in &prop_diff.removed {
            self.prop_answers.remove(&(user.clone(), prop_id.clone()));
        }

        tracing::debug!(
            "User {} saved week {}: {} pick changes, {} prop changes",
            user_id,
            week,
            pick_diff.touched().count(),
            prop_diff.touched().count()
        );

        Ok(self.week_picks(user_id, week))
    }

    /// Everyone's picks for a game, revealed only once it has locked.
    pub fn revealed_picks(
        &self,
        game_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<RevealedPick>, AppError> {
        let game = self
            .game(game_id)
            .ok_or_else(|| AppError::NotFound(format!("Game {game_id}")))?;
        if !game.is_locked(now) {
            return Err(AppError::Forbidden("Picks are hidden until kickoff"));
        }

        let mut out: Vec<RevealedPick> = self
            .predictions
            .iter()
            .filter(|p| p.game_id == game_id)
            .filter_map(|p| {
                self.users.get(&p.user_id).map(|u| RevealedPick {
                    user: PublicUser::from(u.value()),
                    pick: p.pick.clone(),
                })
            })
            .collect();
        out.sort_by(|a, b| a.user.username.to_lowercase().cmp(&b.user.username.to_lowercase()));
        Ok(out)
    }

    // ─── Grading ──────────────────────────────────────────────────

    pub fn game_result(&self, game_id: &str) -> Option<GameResult> {
        self.game_results.get(game_id).map(|r| *r)
    }

    pub fn prop_result(&self, prop_id: &str) -> Option<String> {
        self.prop_results.get(prop_id).map(|r| r.clone())
    }

    pub fn record_game_result(&self, game_id: &str, result: GameResult) -> Result<&Game, AppError> {
        let game = self
            .game(game_id)
            .ok_or_else(|| AppError::NotFound(format!("Game {game_id}")))?;
        self.game_results.insert(game_id.to_string(), result);
        tracing::info!(
            "Graded {}: {} {} - {} {}",
            game_id,
            game.home,
            result.home_score,
            game.away,
            result.away_score
        );
        Ok(game)
    }

    pub fn record_prop_result(&self, prop_id: &str, answer: &str) -> Result<(), AppError> {
        let prop = self
            .prop(prop_id)
            .ok_or_else(|| AppError::NotFound(format!("Prop {prop_id}")))?;
        if !prop.options.iter().any(|o| o == answer) {
            return Err(AppError::BadRequest(format!(
                "{answer} is not an option for {prop_id}"
            )));
        }
        self.prop_results
            .insert(prop_id.to_string(), answer.to_string());
        tracing::info!("Graded prop {}: {}", prop_id, answer);
        Ok(())
    }

    pub fn gradebook(&self) -> Gradebook {
        Gradebook {
            games: self.games.clone(),
            props: self.props.clone(),
            game_results: self
                .game_results
                .iter()
                .map(|r| (r.key().clone(), *r.value()))
                .collect(),
            prop_results: self
                .prop_results
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect(),
            pick_points: self.pick_points,
            prop_points: self.prop_points,
        }
    }
}

async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), AppError> {
    let json = serde_json::to_vec_pretty(snapshot).map_err(AppError::internal)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(AppError::internal)?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(AppError::internal)?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(AppError::internal)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::TimeZone;

    use super::*;

    pub(crate) fn kickoff(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, day, 17, 0, 0).unwrap()
    }

    pub(crate) fn league() -> LeagueConfig {
        LeagueConfig {
            league_name: "Test League".into(),
            season: 2026,
            admin_password: "hunter22".into(),
            pick_points: 1,
            prop_points: 2,
        }
    }

    pub(crate) fn schedule() -> Vec<WeekSchedule> {
        let game = |id: &str, week, home: &str, away: &str, day| Game {
            id: id.into(),
            week,
            home: home.into(),
            away: away.into(),
            kickoff: kickoff(day),
        };
        vec![
            WeekSchedule {
                week: 1,
                games: vec![game("g1", 1, "PHI", "DAL", 10), game("g2", 1, "LAC", "KC", 13)],
                props: vec![PropBet {
                    id: "p1".into(),
                    week: 1,
                    question: "Overtime this week?".into(),
                    options: vec!["yes".into(), "no".into()],
                    points: None,
                }],
            },
            WeekSchedule {
                week: 2,
                games: vec![game("g3", 2, "NYG", "WAS", 20)],
                props: vec![],
            },
        ]
    }

    pub(crate) fn store() -> Store {
        Store::open(schedule(), &league(), None).unwrap()
    }

    fn submission(picks: &[(&str, Option<&str>)], props: &[(&str, Option<&str>)]) -> WeekSubmission {
        let map = |entries: &[(&str, Option<&str>)]| {
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect()
        };
        WeekSubmission {
            picks: map(picks),
            props: map(props),
        }
    }

    #[test]
    fn usernames_are_unique_case_insensitively() {
        let store = store();
        store.register("Gronk", "spikeball", kickoff(1)).unwrap();
        let err = store.register("gronk", "spikeball", kickoff(1)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        assert!(store.login("GRONK", "spikeball").is_ok());
        assert!(matches!(
            store.login("gronk", "wrong-pass"),
            Err(AppError::InvalidCredentials)
        ));
    }

    #[test]
    fn sessions_expire() {
        let store = store();
        let user = store.register("kelce", "tightend87", kickoff(1)).unwrap();
        let token = store.create_session(&user.id, kickoff(1));

        assert_eq!(store.session_user(&token, kickoff(2)), Some(user));
        assert_eq!(store.session_user(&token, kickoff(1) + Duration::days(15)), None);
        assert_eq!(store.session_user(&token, kickoff(2)), None);
    }

    #[test]
    fn submit_upserts_and_clears() {
        let store = store();
        let user = store.register("mahomes", "showtime15", kickoff(1)).unwrap();

        let saved = store
            .submit(
                &user.id,
                1,
                &submission(&[("g1", Some("PHI")), ("g2", Some("KC"))], &[("p1", Some("no"))]),
                kickoff(1),
            )
            .unwrap();
        assert_eq!(saved.picks.len(), 2);
        assert_eq!(saved.props["p1"], "no");

        let saved = store
            .submit(
                &user.id,
                1,
                &submission(&[("g1", None), ("g2", Some("LAC"))], &[]),
                kickoff(2),
            )
            .unwrap();
        assert_eq!(saved.picks, BTreeMap::from([("g2".to_string(), "LAC".to_string())]));
        assert_eq!(saved.props["p1"], "no");
    }

    #[test]
    fn locked_games_reject_changes_but_allow_resubmission() {
        let store = store();
        let user = store.register("hurts", "brotherly1", kickoff(1)).unwrap();
        store
            .submit(&user.id, 1, &submission(&[("g1", Some("PHI"))], &[]), kickoff(1))
            .unwrap();

        // g1 kicked off on the 10th; g2 is still open.
        let after_kickoff = kickoff(11);
        let err = store
            .submit(
                &user.id,
                1,
                &submission(&[("g1", Some("DAL")), ("g2", Some("KC"))], &[("p1", Some("yes"))]),
                after_kickoff,
            )
            .unwrap_err();
        match err {
            AppError::Locked { games, props } => {
                assert_eq!(games, ["g1"]);
                assert_eq!(props, ["p1"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(store.week_picks(&user.id, 1).picks.get("g2").is_none());

        let saved = store
            .submit(
                &user.id,
                1,
                &submission(&[("g1", Some("PHI")), ("g2", Some("KC"))], &[]),
                after_kickoff,
            )
            .unwrap();
        assert_eq!(saved.picks["g2"], "KC");
    }

    #[test]
    fn submit_validates_games_and_teams() {
        let store = store();
        let user = store.register("purdy", "mrirrelevant", kickoff(1)).unwrap();

        let bad_team = store.submit(&user.id, 1, &submission(&[("g1", Some("SF"))], &[]), kickoff(1));
        assert!(matches!(bad_team, Err(AppError::BadRequest(_))));

        let other_week = store.submit(&user.id, 1, &submission(&[("g3", Some("NYG"))], &[]), kickoff(1));
        assert!(matches!(other_week, Err(AppError::BadRequest(_))));

        let bad_option = store.submit(&user.id, 1, &submission(&[], &[("p1", Some("maybe"))]), kickoff(1));
        assert!(matches!(bad_option, Err(AppError::BadRequest(_))));

        let no_week = store.submit(&user.id, 9, &WeekSubmission::default(), kickoff(1));
        assert!(matches!(no_week, Err(AppError::NotFound(_))));
    }

    #[test]
    fn picks_are_revealed_after_kickoff() {
        let store = store();
        let a = store.register("allen", "buffalo17", kickoff(1)).unwrap();
        let b = store.register("Burrow", "cincy0009", kickoff(1)).unwrap();
        store.submit(&a.id, 1, &submission(&[("g1", Some("PHI"))], &[]), kickoff(1)).unwrap();
        store.submit(&b.id, 1, &submission(&[("g1", Some("DAL"))], &[]), kickoff(1)).unwrap();

        assert!(matches!(
            store.revealed_picks("g1", kickoff(9)),
            Err(AppError::Forbidden(_))
        ));
        let revealed = store.revealed_picks("g1", kickoff(10)).unwrap();
        let rows: Vec<(&str, &str)> = revealed
            .iter()
            .map(|r| (r.user.username.as_str(), r.pick.as_str()))
            .collect();
        assert_eq!(rows, [("allen", "PHI"), ("Burrow", "DAL")]);
    }

    #[test]
    fn current_week_advances_with_kickoffs() {
        let store = store();
        assert_eq!(store.current_week(kickoff(1)), Some(1));
        assert_eq!(store.current_week(kickoff(14)), Some(2));
        assert_eq!(store.current_week(kickoff(25)), Some(2));
    }

    #[tokio::test]
    async fn snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/pickem.json");

        let store = Store::open(schedule(), &league(), Some(path.clone())).unwrap();
        let user = store
            .commit(kickoff(1), |s| s.register("lamar", "ravens888", kickoff(1)))
            .await
            .unwrap();
        store
            .commit(kickoff(1), |s| {
                s.submit(&user.id, 1, &submission(&[("g2", Some("KC"))], &[]), kickoff(1))
            })
            .await
            .unwrap();
        store
            .commit(kickoff(14), |s| {
                s.record_game_result("g2", GameResult { home_score: 10, away_score: 31 })
                    .map(|_| ())
            })
            .await
            .unwrap();

        let reopened = Store::open(schedule(), &league(), Some(path)).unwrap();
        assert!(reopened.login("Lamar", "ravens888").is_ok());
        assert_eq!(reopened.week_picks(&user.id, 1).picks["g2"], "KC");
        assert_eq!(reopened.game_result("g2").map(|r| r.away_score), Some(31));
    }

    #[tokio::test]
    async fn failed_save_rolls_back_the_change() {
        // A regular file where the data directory should be makes every save fail.
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let store = Store::open(
            schedule(),
            &league(),
            Some(blocker.path().join("pickem.json")),
        )
        .unwrap();

        let err = store
            .commit(kickoff(1), |s| s.register("herbert", "chargers10", kickoff(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(store.users().is_empty());
        assert!(matches!(
            store.login("herbert", "chargers10"),
            Err(AppError::InvalidCredentials)
        ));

        // Seed a user and a pick directly, then fail to save a change on top.
        let user = store.register("herbert", "chargers10", kickoff(1)).unwrap();
        store
            .submit(&user.id, 1, &submission(&[("g2", Some("LAC"))], &[]), kickoff(1))
            .unwrap();
        let result = store
            .commit(kickoff(2), |s| {
                s.submit(
                    &user.id,
                    1,
                    &submission(&[("g1", Some("PHI")), ("g2", Some("KC"))], &[("p1", Some("no"))]),
                    kickoff(2),
                )
            })
            .await;
        assert!(result.is_err());
        let picks = store.week_picks(&user.id, 1);
        assert_eq!(picks.picks, BTreeMap::from([("g2".to_string(), "LAC".to_string())]));
        assert!(picks.props.is_empty());

        let graded = store
            .commit(kickoff(14), |s| s.record_prop_result("p1", "yes"))
            .await;
        assert!(graded.is_err());
        assert_eq!(store.prop_result("p1"), None);
    }

    #[tokio::test]
    async fn expired_sessions_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pickem.json");
        let store = Store::open(schedule(), &league(), Some(path.clone())).unwrap();
        let user = store
            .commit(kickoff(1), |s| s.register("bosa", "passrush97", kickoff(1)))
            .await
            .unwrap();

        for _ in 0..5 {
            store
                .commit(kickoff(1), |s| Ok(s.create_session(&user.id, kickoff(1))))
                .await
                .unwrap();
        }
        assert_eq!(store.sessions.len(), 5);

        let later = kickoff(1) + Duration::days(30);
        let token = store
            .commit(later, |s| Ok(s.create_session(&user.id, later)))
            .await
            .unwrap();
        assert_eq!(store.sessions.len(), 1);
        assert!(store.sessions.contains_key(&token));

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["sessions"].as_object().map(|s| s.len()), Some(1));
    }

    #[test]
    fn prop_results_must_be_an_option() {
        let store = store();
        assert!(store.record_prop_result("p1", "yes").is_ok());
        assert!(matches!(
            store.record_prop_result("p1", "perhaps"),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            store.record_prop_result("p9", "yes"),
            Err(AppError::NotFound(_))
        ));
    }
}
