use crate::accounts::{LoginRequest, SignupRequest, UserProfile, UserRecord};
use crate::controller::{QuizController, QuizError, QuizOutcome, QuizState, RailMarker};
use crate::error::AppError;
use crate::models::{Answer, AnswerStore, Question, ResultSnapshot};
use crate::profile::ProfileSummary;
use crate::state::AppState;
use crate::storage::PersistTask;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use tracing::{info, warn};

const SESSION_COOKIE: &str = "panama_session";

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn current_user(jar: &CookieJar, state: &AppState) -> Option<(String, UserRecord)> {
    let sid = jar.get(SESSION_COOKIE)?.value().to_string();
    let user = state.sessions.get(&sid).map(|u| u.value().clone())?;
    Some((sid, user))
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub message: String,
}

pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let req_id = request_id_from_headers(&headers);
    let user = state
        .accounts
        .signup(payload)
        .await
        .map_err(|e| AppError::from_account(e, req_id))?;
    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let req_id = request_id_from_headers(&headers);
    let user = state
        .accounts
        .login(&payload)
        .await
        .map_err(|e| AppError::from_account(e, req_id))?;

    let session_id = uuid::Uuid::new_v4().to_string();
    state.sessions.insert(session_id.clone(), user.clone());
    info!(username = %user.username, "signed in");

    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    let message = format!("Welcome back, {}!", user.username);
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            user: UserProfile::from(&user),
            message,
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), AppError> {
    let req_id = request_id_from_headers(&headers);
    let sid = jar
        .get(SESSION_COOKIE)
        .map(|v| v.value().to_string())
        .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "no session", req_id))?;
    state.sessions.remove(&sid);
    Ok((jar.remove(Cookie::from(SESSION_COOKIE)), StatusCode::NO_CONTENT))
}

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Json<UserProfile>, AppError> {
    let (_, user) = current_user(&jar, &state)
        .ok_or_else(|| AppError::unauthorized(request_id_from_headers(&headers)))?;
    Ok(Json(UserProfile::from(&user)))
}

#[derive(Debug, Serialize)]
pub struct DeleteAccountResponse {
    pub removed: usize,
}

pub async fn delete_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<DeleteAccountResponse>), AppError> {
    let req_id = request_id_from_headers(&headers);
    let (sid, user) =
        current_user(&jar, &state).ok_or_else(|| AppError::unauthorized(req_id.clone()))?;
    let removed = state
        .accounts
        .delete(&user.email)
        .await
        .map_err(|e| AppError::from_account(e, req_id))?;
    state.sessions.retain(|key, u| key != &sid && u.email != user.email);
    Ok((
        jar.remove(Cookie::from(SESSION_COOKIE)),
        Json(DeleteAccountResponse { removed }),
    ))
}

#[derive(Debug, Serialize)]
pub struct OutcomeView {
    #[serde(flatten)]
    pub outcome: QuizOutcome,
    pub summary: String,
    pub verdict: &'static str,
}

impl From<QuizOutcome> for OutcomeView {
    fn from(outcome: QuizOutcome) -> Self {
        Self {
            summary: outcome.to_string(),
            verdict: outcome.verdict(),
            outcome,
        }
    }
}

/// Everything the quiz screen renders from.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub state: QuizState,
    pub index: Option<usize>,
    pub total_questions: usize,
    pub current_question: Option<Question>,
    pub answers: AnswerStore,
    pub can_advance: bool,
    pub is_last: bool,
    pub rail: Vec<RailMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeView>,
}

impl QuizView {
    fn of(quiz: &QuizController) -> Self {
        Self {
            state: quiz.state(),
            index: quiz.current_index(),
            total_questions: quiz.catalog().len(),
            current_question: quiz.current_question().cloned(),
            answers: quiz.answers().clone(),
            can_advance: quiz.can_advance(),
            is_last: quiz.is_last(),
            rail: quiz.rail(),
            outcome: quiz.outcome().map(OutcomeView::from),
        }
    }
}

/// Runs `transition` under the quiz lock, then awaits its write with the lock released.
async fn apply<F>(state: &AppState, headers: &HeaderMap, transition: F) -> Result<Json<QuizView>, AppError>
where
    F: FnOnce(&mut QuizController) -> Result<Option<PersistTask>, QuizError>,
{
    let req_id = request_id_from_headers(headers);
    let (view, task) = {
        let mut quiz = state.quiz.lock().await;
        let task = transition(&mut quiz).map_err(|e| {
            warn!(request_id = %req_id, "quiz transition refused: {}", e);
            AppError::from_quiz(e, req_id.clone())
        })?;
        (QuizView::of(&quiz), task)
    };
    if let Some(task) = task {
        task.run().await;
    }
    Ok(Json(view))
}

pub async fn quiz_view(State(state): State<AppState>) -> Json<QuizView> {
    let quiz = state.quiz.lock().await;
    Json(QuizView::of(&quiz))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogView {
    pub eligibility_threshold: i64,
    pub max_score: i64,
    pub questions: Vec<Question>,
}

pub async fn catalog(State(state): State<AppState>) -> Json<CatalogView> {
    Json(CatalogView {
        eligibility_threshold: state.catalog.eligibility_threshold(),
        max_score: state.catalog.max_score(),
        questions: state.catalog.questions().to_vec(),
    })
}

pub async fn put_answer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u32>,
    Json(answer): Json<Answer>,
) -> Result<Json<QuizView>, AppError> {
    apply(&state, &headers, |quiz| quiz.answer(id, answer).map(Some)).await
}

pub async fn next(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<QuizView>, AppError> {
    apply(&state, &headers, QuizController::next).await
}

pub async fn previous(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<QuizView>, AppError> {
    apply(&state, &headers, QuizController::previous).await
}

pub async fn go_to(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(index): Path<usize>,
) -> Result<Json<QuizView>, AppError> {
    apply(&state, &headers, |quiz| quiz.go_to(index)).await
}

pub async fn finish(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<QuizView>, AppError> {
    apply(&state, &headers, |quiz| quiz.finish().map(|(_, task)| Some(task))).await
}

pub async fn restart(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<QuizView>, AppError> {
    apply(&state, &headers, |quiz| Ok(Some(quiz.restart()))).await
}

#[derive(Debug, Serialize)]
pub struct ResultView {
    #[serde(flatten)]
    pub snapshot: ResultSnapshot,
    pub outcome: OutcomeView,
}

pub async fn result(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ResultView>, AppError> {
    let snapshot = state.persistence.load_result().await.ok_or_else(|| {
        AppError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "no finished quiz",
            request_id_from_headers(&headers),
        )
    })?;
    let outcome = QuizOutcome {
        total_score: snapshot.total_score,
        max_score: state.catalog.max_score(),
        eligible: state.catalog.is_eligible(snapshot.total_score),
    };
    Ok(Json(ResultView {
        snapshot,
        outcome: outcome.into(),
    }))
}

pub async fn profile(State(state): State<AppState>) -> Json<ProfileSummary> {
    let quiz = state.quiz.lock().await;
    Json(ProfileSummary::build(&state.catalog, quiz.answers()))
}
