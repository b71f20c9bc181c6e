use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled matchup. Teams are identified by their abbreviation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    #[serde(default)]
    pub week: u32,
    pub home: String,
    pub away: String,
    pub kickoff: DateTime<Utc>,
}

impl Game {
    /// Picks are frozen once the game kicks off.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        now >= self.kickoff
    }

    pub fn has_team(&self, team: &str) -> bool {
        self.home == team || self.away == team
    }
}

/// A multiple-choice side question attached to a week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropBet {
    pub id: String,
    #[serde(default)]
    pub week: u32,
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub points: Option<u32>,
}

/// One week of the schedule, loaded from `schedule/week-<n>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekSchedule {
    pub week: u32,
    pub games: Vec<Game>,
    #[serde(default)]
    pub props: Vec<PropBet>,
}

impl WeekSchedule {
    /// Props freeze with the first kickoff of the week.
    pub fn props_lock_at(&self) -> Option<DateTime<Utc>> {
        self.games.iter().map(|g| g.kickoff).min()
    }

    pub fn props_locked(&self, now: DateTime<Utc>) -> bool {
        self.props_lock_at().is_some_and(|at| now >= at)
    }

    /// Nothing in the week can change any more. A week without games never
    /// locks, matching its props.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.props_locked(now) && self.games.iter().all(|g| g.is_locked(now))
    }
}

/// League settings loaded from `league.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueConfig {
    pub league_name: String,
    pub season: u32,
    pub admin_password: String,
    #[serde(default = "default_pick_points")]
    pub pick_points: u32,
    #[serde(default = "default_prop_points")]
    pub prop_points: u32,
}

fn default_pick_points() -> u32 {
    1
}

fn default_prop_points() -> u32 {
    1
}

/// Final score of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub home_score: u32,
    pub away_score: u32,
}

impl GameResult {
    /// The winning team, or `None` when the game ended tied.
    pub fn winner<'a>(&self, game: &'a Game) -> Option<&'a str> {
        match self.home_score.cmp(&self.away_score) {
            std::cmp::Ordering::Greater => Some(game.home.as_str()),
            std::cmp::Ordering::Less => Some(game.away.as_str()),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub created_at: DateTime<Utc>,
}

/// What clients get to see of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
        }
    }
}

/// A winner pick for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub user_id: String,
    pub game_id: String,
    pub pick: String,
    pub submitted_at: DateTime<Utc>,
}

/// An answer to a prop bet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropAnswer {
    pub user_id: String,
    pub prop_id: String,
    pub answer: String,
    pub submitted_at: DateTime<Utc>,
}

/// Messages pushed to clients over the live socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    GameGraded {
        game_id: String,
        winner: Option<String>,
    },
    PropGraded {
        prop_id: String,
        answer: String,
    },
    StandingsUpdated {
        leaders: Vec<crate::standings::RankedEntry>,
    },
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn game(id: &str, kickoff: DateTime<Utc>) -> Game {
        Game {
            id: id.into(),
            week: 1,
            home: "SEA".into(),
            away: "ARI".into(),
            kickoff,
        }
    }

    #[test]
    fn week_locks_after_its_last_kickoff() {
        let first = Utc.with_ymd_and_hms(2026, 9, 10, 17, 0, 0).unwrap();
        let week = WeekSchedule {
            week: 1,
            games: vec![game("early", first), game("late", first + Duration::days(3))],
            props: vec![],
        };

        assert!(!week.props_locked(first - Duration::minutes(1)));
        assert!(week.props_locked(first));
        assert!(!week.is_locked(first));
        assert!(week.is_locked(first + Duration::days(3)));
    }

    #[test]
    fn empty_week_never_locks() {
        let week = WeekSchedule {
            week: 18,
            games: vec![],
            props: vec![PropBet {
                id: "mvp".into(),
                week: 18,
                question: "Who wins MVP?".into(),
                options: vec!["Allen".into(), "Jackson".into()],
                points: None,
            }],
        };
        let now = Utc::now();

        assert_eq!(week.props_lock_at(), None);
        assert!(!week.props_locked(now));
        assert!(!week.is_locked(now));
    }
}
