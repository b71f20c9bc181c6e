//! Grading and per-user aggregation.
//!
//! Everything here is recomputed from the flat prediction records on every
//! request; there are no stored totals to drift out of sync.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{Game, GameResult, Prediction, PropAnswer, PropBet, PublicUser};

/// Outcome of a single prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Correct,
    Incorrect,
    Pending,
}

/// Everything needed to grade predictions: the schedule plus known results.
#[derive(Debug, Default, Clone)]
pub struct Gradebook {
    pub games: HashMap<String, Game>,
    pub props: HashMap<String, PropBet>,
    pub game_results: HashMap<String, GameResult>,
    pub prop_results: HashMap<String, String>,
    pub pick_points: u32,
    pub prop_points: u32,
}

impl Gradebook {
    /// A tied game grades every pick as incorrect.
    pub fn grade_pick(&self, prediction: &Prediction) -> Grade {
        let (Some(game), Some(result)) = (
            self.games.get(&prediction.game_id),
            self.game_results.get(&prediction.game_id),
        ) else {
            return Grade::Pending;
        };

        match result.winner(game) {
            Some(winner) if winner == prediction.pick => Grade::Correct,
            _ => Grade::Incorrect,
        }
    }

    pub fn grade_prop(&self, answer: &PropAnswer) -> Grade {
        match self.prop_results.get(&answer.prop_id) {
            Some(correct) if *correct == answer.answer => Grade::Correct,
            Some(_) => Grade::Incorrect,
            None => Grade::Pending,
        }
    }

    fn prop_value(&self, prop_id: &str) -> u32 {
        self.props
            .get(prop_id)
            .and_then(|p| p.points)
            .unwrap_or(self.prop_points)
    }

    fn game_week(&self, game_id: &str) -> Option<u32> {
        self.games.get(game_id).map(|g| g.week)
    }

    fn prop_week(&self, prop_id: &str) -> Option<u32> {
        self.props.get(prop_id).map(|p| p.week)
    }
}

/// Aggregated results for one user over a season or a single week.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserScore {
    pub user_id: String,
    pub username: String,
    pub points: u32,
    pub correct: u32,
    pub graded: u32,
    pub pending: u32,
    /// Percentage of graded predictions that were correct, one decimal place.
    pub accuracy: f64,
}

impl UserScore {
    fn empty(user: &PublicUser) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
            points: 0,
            correct: 0,
            graded: 0,
            pending: 0,
            accuracy: 0.0,
        }
    }

    fn record(&mut self, grade: Grade, value: u32) {
        match grade {
            Grade::Correct => {
                self.correct += 1;
                self.graded += 1;
                self.points += value;
            }
            Grade::Incorrect => self.graded += 1,
            Grade::Pending => self.pending += 1,
        }
    }

    fn finish(&mut self) {
        self.accuracy = accuracy(self.correct, self.graded);
    }
}

pub fn accuracy(correct: u32, graded: u32) -> f64 {
    if graded == 0 {
        return 0.0;
    }
    let pct = f64::from(correct) * 100.0 / f64::from(graded);
    (pct * 10.0).round() / 10.0
}

/// Score every user, optionally restricted to a single week.
///
/// Users without any predictions still appear with zero points.
pub fn score_users(
    users: &[PublicUser],
    predictions: &[Prediction],
    answers: &[PropAnswer],
    book: &Gradebook,
    week: Option<u32>,
) -> Vec<UserScore> {
    let mut scores: HashMap<&str, UserScore> = users
        .iter()
        .map(|u| (u.id.as_str(), UserScore::empty(u)))
        .collect();

    let in_week = |w: Option<u32>| week.is_none() || w == week;

    for prediction in predictions {
        if !in_week(book.game_week(&prediction.game_id)) {
            continue;
        }
        if let Some(score) = scores.get_mut(prediction.user_id.as_str()) {
            score.record(book.grade_pick(prediction), book.pick_points);
        }
    }

    for answer in answers {
        if !in_week(book.prop_week(&answer.prop_id)) {
            continue;
        }
        if let Some(score) = scores.get_mut(answer.user_id.as_str()) {
            score.record(book.grade_prop(answer), book.prop_value(&answer.prop_id));
        }
    }

    let mut out: Vec<UserScore> = scores.into_values().collect();
    out.iter_mut().for_each(UserScore::finish);
    out.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    out
}
