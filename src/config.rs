use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::types::{LeagueConfig, WeekSchedule};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Settings for the HTTP server itself, read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub data_path: PathBuf,
    pub secure_cookies: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: env_or("PORT", 3000)?,
            data_path: std::env::var("DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/pickem.json")),
            secure_cookies: env_or("SECURE_COOKIES", false)?,
        })
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { key, value }),
        Err(_) => {
            tracing::info!("{} not set, using default", key);
            Ok(default)
        }
    }
}

/// Resolves a path relative to the config directory.
fn config_path(sub: &str) -> PathBuf {
    let base = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string());
    Path::new(&base).join(sub)
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), ConfigError> {
    let text = serde_json::to_string_pretty(value).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, text).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn create_dir(path: &Path) -> Result<(), ConfigError> {
    fs::create_dir_all(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Initialize config directory with defaults if missing.
pub fn init() -> Result<(), ConfigError> {
    let base = config_path("");
    if !base.exists() {
        create_dir(&base)?;
    }

    let league_path = config_path("league.json");
    if !league_path.exists() {
        write_json(
            &league_path,
            &serde_json::json!({
                "leagueName": "Office Pick'em",
                "season": 2026,
                "adminPassword": "PASSWORD",
                "pickPoints": 1,
                "propPoints": 1
            }),
        )?;
        tracing::warn!("Created default league.json, change the admin password");
    }

    let schedule_dir = config_path("schedule");
    if !schedule_dir.exists() {
        create_dir(&schedule_dir)?;
        write_json(
            &schedule_dir.join("week-1.json"),
            &serde_json::json!({
                "week": 1,
                "games": [
                    {
                        "id": "2026-w1-dal-phi",
                        "home": "PHI",
                        "away": "DAL",
                        "kickoff": "2026-09-10T00:20:00Z"
                    },
                    {
                        "id": "2026-w1-kc-lac",
                        "home": "LAC",
                        "away": "KC",
                        "kickoff": "2026-09-13T17:00:00Z"
                    }
                ],
                "props": [
                    {
                        "id": "2026-w1-total-td",
                        "question": "Most touchdowns by a single team this week?",
                        "options": ["0-3", "4-5", "6+"]
                    }
                ]
            }),
        )?;
    }

    Ok(())
}

/// Load the league settings.
pub fn load_league_config() -> Result<LeagueConfig, ConfigError> {
    let path = config_path("league.json");
    let data = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse { path, source })
}

/// Load every week from the schedule directory, ordered by week.
pub fn load_schedule() -> Vec<WeekSchedule> {
    load_schedule_from(&config_path("schedule"))
}

pub fn load_schedule_from(dir: &Path) -> Vec<WeekSchedule> {
    if !dir.exists() {
        return vec![];
    }

    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to read schedule directory: {}", e);
            return vec![];
        }
    };

    let mut weeks = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<WeekSchedule>(&data) {
                Ok(mut week) => {
                    let number = week.week;
                    week.games.iter_mut().for_each(|g| g.week = number);
                    week.props.iter_mut().for_each(|p| p.week = number);
                    weeks.push(week);
                }
                Err(e) => tracing::error!("Failed to parse week {}: {}", path.display(), e),
            },
            Err(e) => tracing::error!("Failed to read week {}: {}", path.display(), e),
        }
    }

    weeks.sort_by_key(|w| w.week);
    weeks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_is_sorted_and_stamped_with_week() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("week-2.json"),
            r#"{"week":2,"games":[{"id":"g2","home":"NYG","away":"WAS","kickoff":"2026-09-20T17:00:00Z"}]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("week-1.json"),
            r#"{"week":1,"games":[],"props":[{"id":"p1","question":"?","options":["a","b"]}]}"#,
        )
        .unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let weeks = load_schedule_from(dir.path());
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].week, 1);
        assert_eq!(weeks[0].props[0].week, 1);
        assert_eq!(weeks[1].games[0].week, 2);
    }

    #[test]
    fn missing_schedule_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_schedule_from(&dir.path().join("nope")).is_empty());
    }
}
