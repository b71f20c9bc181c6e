use serde::{Deserialize, Serialize};

use crate::scoring::UserScore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Medal {
    Gold,
    Silver,
    Bronze,
}

/// A leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    /// Dense rank: every distinct point total is one tier.
    pub rank: u32,
    /// `rank` as shown to people, `T` prefixed when shared.
    pub display_rank: String,
    pub tied: bool,
    pub medal: Option<Medal>,
    pub user_id: String,
    pub username: String,
    pub points: u32,
    pub correct: u32,
    pub graded: u32,
    pub accuracy: f64,
}

impl RankedEntry {
    pub fn medal_label(&self) -> &'static str {
        match self.medal {
            Some(Medal::Gold) => "gold",
            Some(Medal::Silver) => "silver",
            Some(Medal::Bronze) => "bronze",
            None => "",
        }
    }
}

/// Medal for a dense rank. Nobody medals without points.
pub fn medal_tier(rank: u32, points: u32) -> Option<Medal> {
    if points == 0 {
        return None;
    }
    match rank {
        1 => Some(Medal::Gold),
        2 => Some(Medal::Silver),
        3 => Some(Medal::Bronze),
        _ => None,
    }
}

/// Orders by points descending then username (case-insensitive) and assigns
/// dense ranks, one per distinct point total.
pub fn rank_with_ties(mut scores: Vec<UserScore>) -> Vec<RankedEntry> {
    scores.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| a.username.to_lowercase().cmp(&b.username.to_lowercase()))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    let mut ranked = Vec::with_capacity(scores.len());
    let mut rank = 0;
    let mut previous: Option<u32> = None;

    for (i, score) in scores.iter().enumerate() {
        if previous != Some(score.points) {
            rank += 1;
            previous = Some(score.points);
        }

        // Sorted, so any tie partner is adjacent.
        let tied = (i > 0 && scores[i - 1].points == score.points)
            || scores.get(i + 1).is_some_and(|next| next.points == score.points);

        ranked.push(RankedEntry {
            rank,
            display_rank: if tied {
                format!("T{rank}")
            } else {
                rank.to_string()
            },
            tied,
            medal: medal_tier(rank, score.points),
            user_id: score.user_id.clone(),
            username: score.username.clone(),
            points: score.points,
            correct: score.correct,
            graded: score.graded,
            accuracy: score.accuracy,
        });
    }

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(name: &str, points: u32) -> UserScore {
        UserScore {
            user_id: format!("id-{name}"),
            username: name.to_string(),
            points,
            correct: points,
            graded: 10,
            pending: 0,
            accuracy: f64::from(points) * 10.0,
        }
    }

    #[test]
    fn dense_ranks_with_tie_prefix() {
        let ranked = rank_with_ties(vec![
            score("zed", 7),
            score("amy", 9),
            score("Bob", 9),
            score("cat", 5),
        ]);

        let rows: Vec<(&str, &str, Option<Medal>)> = ranked
            .iter()
            .map(|r| (r.username.as_str(), r.display_rank.as_str(), r.medal))
            .collect();

        assert_eq!(
            rows,
            vec![
                ("amy", "T1", Some(Medal::Gold)),
                ("Bob", "T1", Some(Medal::Gold)),
                ("zed", "2", Some(Medal::Silver)),
                ("cat", "3", Some(Medal::Bronze)),
            ]
        );
        assert!(ranked[0].tied && ranked[1].tied && !ranked[2].tied);
    }

    #[test]
    fn names_break_order_case_insensitively() {
        let ranked = rank_with_ties(vec![score("charlie", 3), score("Alpha", 3), score("bravo", 3)]);
        let names: Vec<&str> = ranked.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(names, ["Alpha", "bravo", "charlie"]);
        assert!(ranked.iter().all(|r| r.display_rank == "T1"));
    }

    #[test]
    fn zero_points_never_medal() {
        let ranked = rank_with_ties(vec![score("a", 0), score("b", 0)]);
        assert!(ranked.iter().all(|r| r.medal.is_none()));
        assert_eq!(medal_tier(4, 10), None);
        assert_eq!(medal_tier(3, 1), Some(Medal::Bronze));
    }

    #[test]
    fn empty_board() {
        assert!(rank_with_ties(Vec::new()).is_empty());
    }
}
