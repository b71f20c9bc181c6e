use askama::Template;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, Html, IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::{self, Admin, CurrentUser};
use crate::dashboard::{self, DashboardSnapshot};
use crate::draft::DraftDiff;
use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::live;
use crate::scoring::Grade;
use crate::standings::RankedEntry;
use crate::state::AppState;
use crate::store::{RevealedPick, WeekPicks, WeekSubmission};
use crate::types::*;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/csrf", get(issue_csrf))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/weeks", get(list_weeks))
        .route("/weeks/{week}", get(week_detail))
        .route("/weeks/{week}/picks", put(submit_picks))
        .route("/weeks/{week}/draft", post(diff_draft))
        .route("/games/{game_id}/picks", get(game_picks))
        .route("/standings", get(season_standings))
        .route("/standings/week/{week}", get(week_standings))
        .route("/dashboard", get(dashboard))
        .route("/admin/games/{game_id}/result", post(grade_game))
        .route("/admin/props/{prop_id}/result", post(grade_prop));

    Router::new()
        .route("/", get(index_page))
        .route("/ws", get(live::ws_handler))
        .nest("/api", api)
        .nest_service("/static", ServeDir::new("static"))
        .layer(axum::middleware::from_fn(auth::require_csrf))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Pages ────────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    league_name: String,
    season: u32,
    current_week: Option<u32>,
    rows: Vec<RankedEntry>,
}

async fn index_page(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let page = IndexTemplate {
        league_name: state.league.league_name.clone(),
        season: state.league.season,
        current_week: state.store.current_week(Utc::now()),
        rows: dashboard::leaderboard(&state.store, None),
    };
    Ok(Html(page.render().map_err(AppError::internal)?))
}

// ─── Auth ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn issue_csrf(State(state): State<AppState>) -> impl IntoResponse {
    let token = auth::new_csrf_token();
    (
        AppendHeaders([(SET_COOKIE, auth::csrf_cookie(&token, state.secure_cookies))]),
        Json(serde_json::json!({ "csrfToken": token })),
    )
}

/// Sets the session cookie and rotates the CSRF token.
fn session_response(state: &AppState, user: PublicUser, token: &str, status: StatusCode) -> Response {
    (
        status,
        AppendHeaders([
            (SET_COOKIE, auth::session_cookie(token, state.secure_cookies)),
            (
                SET_COOKIE,
                auth::csrf_cookie(&auth::new_csrf_token(), state.secure_cookies),
            ),
        ]),
        Json(user),
    )
        .into_response()
}

async fn register(
    State(state): State<AppState>,
    ApiJson(creds): ApiJson<Credentials>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let (user, token) = state
        .store
        .commit(now, |store| {
            let user = store.register(creds.username.trim(), &creds.password, now)?;
            let token = store.create_session(&user.id, now);
            Ok((user, token))
        })
        .await?;
    Ok(session_response(&state, user, &token, StatusCode::CREATED))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(creds): ApiJson<Credentials>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let (user, token) = state
        .store
        .commit(now, |store| {
            let user = store.login(creds.username.trim(), &creds.password)?;
            let token = store.create_session(&user.id, now);
            Ok((user, token))
        })
        .await?;
    tracing::info!("User {} logged in", user.username);
    Ok(session_response(&state, user, &token, StatusCode::OK))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = auth::cookie_value(&headers, auth::SESSION_COOKIE) {
        state
            .store
            .commit(Utc::now(), |store| {
                store.end_session(token);
                Ok(())
            })
            .await?;
    }
    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(SET_COOKIE, auth::clear_session_cookie(state.secure_cookies))]),
    ))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user)
}

// ─── Weeks & picks ────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WeekSummary {
    week: u32,
    games: usize,
    props: usize,
    first_kickoff: Option<DateTime<Utc>>,
    locked: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WeekList {
    season: u32,
    current_week: Option<u32>,
    weeks: Vec<WeekSummary>,
}

async fn list_weeks(State(state): State<AppState>) -> Json<WeekList> {
    let now = Utc::now();
    let weeks = state
        .store
        .weeks()
        .iter()
        .map(|w| WeekSummary {
            week: w.week,
            games: w.games.len(),
            props: w.props.len(),
            first_kickoff: w.props_lock_at(),
            locked: w.is_locked(now),
        })
        .collect();

    Json(WeekList {
        season: state.league.season,
        current_week: state.store.current_week(now),
        weeks,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GameView {
    #[serde(flatten)]
    game: Game,
    locked: bool,
    result: Option<GameResult>,
    winner: Option<String>,
    grade: Option<Grade>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PropView {
    #[serde(flatten)]
    prop: PropBet,
    result: Option<String>,
    grade: Option<Grade>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WeekView {
    week: u32,
    props_locked: bool,
    props_lock_at: Option<DateTime<Utc>>,
    games: Vec<GameView>,
    props: Vec<PropView>,
    mine: WeekPicks,
}

async fn week_detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(week): ApiPath<u32>,
) -> Result<Json<WeekView>, AppError> {
    let now = Utc::now();
    let schedule = state
        .store
        .week(week)
        .ok_or_else(|| AppError::NotFound(format!("Week {week}")))?;
    let mine = state.store.week_picks(&user.id, week);
    let book = state.store.gradebook();

    let games = schedule
        .games
        .iter()
        .map(|game| {
            let result = state.store.game_result(&game.id);
            let grade = mine.picks.get(&game.id).map(|pick| {
                book.grade_pick(&Prediction {
                    user_id: user.id.clone(),
                    game_id: game.id.clone(),
                    pick: pick.clone(),
                    submitted_at: now,
                })
            });
            GameView {
                game: game.clone(),
                locked: game.is_locked(now),
                winner: result.and_then(|r| r.winner(game).map(str::to_string)),
                result,
                grade,
            }
        })
        .collect();

    let props = schedule
        .props
        .iter()
        .map(|prop| PropView {
            prop: prop.clone(),
            result: state.store.prop_result(&prop.id),
            grade: mine.props.get(&prop.id).map(|answer| {
                book.grade_prop(&PropAnswer {
                    user_id: user.id.clone(),
                    prop_id: prop.id.clone(),
                    answer: answer.clone(),
                    submitted_at: now,
                })
            }),
        })
        .collect();

    Ok(Json(WeekView {
        week,
        props_locked: schedule.props_locked(now),
        props_lock_at: schedule.props_lock_at(),
        games,
        props,
        mine,
    }))
}

async fn submit_picks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(week): ApiPath<u32>,
    ApiJson(submission): ApiJson<WeekSubmission>,
) -> Result<Json<WeekPicks>, AppError> {
    let now = Utc::now();
    let saved = state
        .store
        .commit(now, |store| store.submit(&user.id, week, &submission, now))
        .await?;
    Ok(Json(saved))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DraftReport {
    picks: DraftDiff,
    props: DraftDiff,
    has_unsaved_changes: bool,
}

async fn diff_draft(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(week): ApiPath<u32>,
    ApiJson(draft): ApiJson<WeekSubmission>,
) -> Result<Json<DraftReport>, AppError> {
    if state.store.week(week).is_none() {
        return Err(AppError::NotFound(format!("Week {week}")));
    }
    let submitted = state.store.week_picks(&user.id, week);
    let picks = DraftDiff::compute(&submitted.picks, &draft.picks);
    let props = DraftDiff::compute(&submitted.props, &draft.props);
    Ok(Json(DraftReport {
        has_unsaved_changes: picks.has_unsaved_changes || props.has_unsaved_changes,
        picks,
        props,
    }))
}

async fn game_picks(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(game_id): ApiPath<String>,
) -> Result<Json<Vec<RevealedPick>>, AppError> {
    Ok(Json(state.store.revealed_picks(&game_id, Utc::now())?))
}

// ─── Standings ────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Standings {
    season: u32,
    week: Option<u32>,
    entries: Vec<RankedEntry>,
}

async fn season_standings(State(state): State<AppState>) -> Json<Standings> {
    Json(Standings {
        season: state.league.season,
        week: None,
        entries: dashboard::leaderboard(&state.store, None),
    })
}

async fn week_standings(
    State(state): State<AppState>,
    ApiPath(week): ApiPath<u32>,
) -> Result<Json<Standings>, AppError> {
    if state.store.week(week).is_none() {
        return Err(AppError::NotFound(format!("Week {week}")));
    }
    Ok(Json(Standings {
        season: state.league.season,
        week: Some(week),
        entries: dashboard::leaderboard(&state.store, Some(week)),
    }))
}

async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<DashboardSnapshot> {
    Json(dashboard::snapshot(&state.store, user, Utc::now()))
}

// ─── Admin ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PropResult {
    answer: String,
}

fn publish_standings(state: &AppState) {
    let leaders = dashboard::leaderboard(&state.store, None)
        .into_iter()
        .take(10)
        .collect();
    state.live.publish(ServerMsg::StandingsUpdated { leaders });
}

async fn grade_game(
    State(state): State<AppState>,
    _admin: Admin,
    ApiPath(game_id): ApiPath<String>,
    ApiJson(result): ApiJson<GameResult>,
) -> Result<impl IntoResponse, AppError> {
    let winner = state
        .store
        .commit(Utc::now(), |store| {
            let game = store.record_game_result(&game_id, result)?;
            Ok(result.winner(game).map(str::to_string))
        })
        .await?;

    state.live.publish(ServerMsg::GameGraded {
        game_id: game_id.clone(),
        winner: winner.clone(),
    });
    publish_standings(&state);

    Ok(Json(serde_json::json!({ "gameId": game_id, "winner": winner })))
}

async fn grade_prop(
    State(state): State<AppState>,
    _admin: Admin,
    ApiPath(prop_id): ApiPath<String>,
    ApiJson(body): ApiJson<PropResult>,
) -> Result<impl IntoResponse, AppError> {
    state
        .store
        .commit(Utc::now(), |store| store.record_prop_result(&prop_id, &body.answer))
        .await?;

    state.live.publish(ServerMsg::PropGraded {
        prop_id: prop_id.clone(),
        answer: body.answer.clone(),
    });
    publish_standings(&state);

    Ok(Json(serde_json::json!({ "propId": prop_id, "answer": body.answer })))
}
