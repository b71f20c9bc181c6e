use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scoring::score_users;
use crate::standings::{RankedEntry, rank_with_ties};
use crate::store::Store;
use crate::types::PublicUser;

const LEADERS_SHOWN: usize = 5;

/// Season leaderboard, or a single week's when `week` is set.
pub fn leaderboard(store: &Store, week: Option<u32>) -> Vec<RankedEntry> {
    let scores = score_users(
        &store.users(),
        &store.predictions(),
        &store.prop_answers(),
        &store.gradebook(),
        week,
    );
    rank_with_ties(scores)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub user: PublicUser,
    pub current_week: Option<u32>,
    pub season: Option<RankedEntry>,
    pub week: Option<RankedEntry>,
    /// Games in the current week that are still open and have no pick.
    pub unpicked_games: Vec<String>,
    pub unanswered_props: Vec<String>,
    pub participants: usize,
    pub leaders: Vec<RankedEntry>,
}

pub fn snapshot(store: &Store, user: PublicUser, now: DateTime<Utc>) -> DashboardSnapshot {
    let current_week = store.current_week(now);

    let season_board = leaderboard(store, None);
    let season = season_board.iter().find(|r| r.user_id == user.id).cloned();
    let week = current_week
        .and_then(|w| {
            leaderboard(store, Some(w))
                .into_iter()
                .find(|r| r.user_id == user.id)
        });

    let mut unpicked_games = Vec::new();
    let mut unanswered_props = Vec::new();
    if let Some(schedule) = current_week.and_then(|w| store.week(w)) {
        let mine = store.week_picks(&user.id, schedule.week);
        unpicked_games = schedule
            .games
            .iter()
            .filter(|g| !g.is_locked(now) && !mine.picks.contains_key(&g.id))
            .map(|g| g.id.clone())
            .collect();
        if !schedule.props_locked(now) {
            unanswered_props = schedule
                .props
                .iter()
                .filter(|p| !mine.props.contains_key(&p.id))
                .map(|p| p.id.clone())
                .collect();
        }
    }

    DashboardSnapshot {
        user,
        current_week,
        season,
        week,
        unpicked_games,
        unanswered_props,
        participants: season_board.len(),
        leaders: season_board.into_iter().take(LEADERS_SHOWN).collect(),
    }
}
