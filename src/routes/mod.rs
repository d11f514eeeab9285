//! API routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::{Difficulty, Message, Topic};
use crate::core::{
    Catalogue, CheckReport, CodingError, CodingQuestion, CoursePreferences, GeneratedQuestion, InterviewSession,
    Outcome, Report, SessionSnapshot, TutorError, TutorReply, Turn, VivaError, STARTER_CODE,
};
use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model: String,
    api_key_configured: bool,
    active_sessions: usize,
    tutor_chats: usize,
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub topic: String,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    pub text: String,
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

#[derive(Debug, Deserialize)]
pub struct TutorOpenRequest {
    #[serde(default)]
    pub preferences: CoursePreferences,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub code: String,
    #[serde(default)]
    pub input: String,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub output: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub code: String,
    pub question: CodingQuestion,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default = "default_question_difficulty")]
    pub difficulty: Difficulty,
}

fn default_question_difficulty() -> Difficulty {
    Difficulty::Easy
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            difficulty: default_question_difficulty(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub starter_code: &'static str,
    pub questions: Vec<CodingQuestion>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutcomeBody {
    Replied { message: Message },
    Reported { report: Report },
    Failed {
        message: Message,
        error: String,
        kind: &'static str,
    },
}

impl From<Outcome> for OutcomeBody {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Replied(message) => OutcomeBody::Replied { message },
            Outcome::Reported(report) => OutcomeBody::Reported { report },
            Outcome::Failed { notice, error } => OutcomeBody::Failed {
                message: notice,
                kind: error.kind(),
                error: error.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub session: SessionSnapshot,
    pub outcome: OutcomeBody,
}

impl From<Turn> for TurnResponse {
    fn from(turn: Turn) -> Self {
        Self {
            session: turn.session,
            outcome: turn.outcome.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

impl From<VivaError> for ErrorResponse {
    fn from(e: VivaError) -> Self {
        Self {
            error: e.to_string(),
            kind: e.kind(),
        }
    }
}

fn status_for(e: &VivaError) -> StatusCode {
    match e {
        VivaError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        VivaError::UnknownTopic(_) => StatusCode::BAD_REQUEST,
        VivaError::Validation(_) => StatusCode::CONFLICT,
        VivaError::SessionClosed(_) => StatusCode::GONE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn map_viva_error(e: VivaError) -> ApiError {
    (status_for(&e), Json(e.into()))
}

fn map_tutor_error(e: TutorError) -> ApiError {
    let (status, kind) = match &e {
        TutorError::EmptyMessage => (StatusCode::CONFLICT, "validation"),
        TutorError::ChatNotFound(_) => (StatusCode::NOT_FOUND, "chat_not_found"),
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            kind,
        }),
    )
}

fn map_coding_error(e: CodingError) -> ApiError {
    let (status, kind) = match &e {
        CodingError::EmptyCode | CodingError::NoTestCases => (StatusCode::CONFLICT, "validation"),
        CodingError::Completion(crate::providers::CompletionError::MissingApiKey) => {
            (StatusCode::BAD_GATEWAY, "missing_api_key")
        }
        CodingError::Completion(c) if c.is_network() => (StatusCode::BAD_GATEWAY, "network"),
        CodingError::Completion(_) => (StatusCode::BAD_GATEWAY, "malformed_response"),
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            kind,
        }),
    )
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model: state.config.gemini_model.clone(),
        api_key_configured: state.config.gemini_api_key.is_some(),
        active_sessions: state.viva.session_count().await,
        tutor_chats: state.tutor.chat_count().await,
    })
}

async fn topics(State(state): State<AppState>) -> Json<Catalogue> {
    Json(state.viva.catalogue())
}

async fn history(State(state): State<AppState>) -> Json<Vec<InterviewSession>> {
    Json(state.viva.history().await)
}

async fn start(State(state): State<AppState>, Json(request): Json<StartRequest>) -> ApiResult<TurnResponse> {
    let topic: Topic = request
        .topic
        .parse()
        .map_err(|e| map_viva_error(VivaError::UnknownTopic(e)))?;

    let turn = state
        .viva
        .start(topic, request.difficulty)
        .await
        .map_err(map_viva_error)?;

    Ok(Json(turn.into()))
}

async fn snapshot(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<SessionSnapshot> {
    let snapshot = state.viva.snapshot(id).await.map_err(map_viva_error)?;
    Ok(Json(snapshot))
}

async fn restart(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<TurnResponse> {
    let turn = state.viva.restart(id).await.map_err(map_viva_error)?;
    Ok(Json(turn.into()))
}

async fn answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> ApiResult<TurnResponse> {
    let turn = state.viva.answer(id, &request.message).await.map_err(map_viva_error)?;
    Ok(Json(turn.into()))
}

async fn transcript(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TranscriptRequest>,
) -> ApiResult<SessionSnapshot> {
    let snapshot = state
        .viva
        .transcribe(id, &request.text, request.is_final)
        .await
        .map_err(map_viva_error)?;
    Ok(Json(snapshot))
}

async fn end(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<TurnResponse> {
    let turn = state.viva.end(id).await.map_err(map_viva_error)?;
    Ok(Json(turn.into()))
}

async fn close(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    state.viva.close(id).await.map_err(map_viva_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn tutor_open(State(state): State<AppState>, Json(request): Json<TutorOpenRequest>) -> Json<TutorReply> {
    Json(state.tutor.open(request.preferences).await)
}

async fn tutor_transcript(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Vec<Message>> {
    let transcript = state.tutor.transcript(id).await.map_err(map_tutor_error)?;
    Ok(Json(transcript))
}

async fn tutor_send(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> ApiResult<TutorReply> {
    let reply = state.tutor.send(id, &request.message).await.map_err(map_tutor_error)?;
    Ok(Json(reply))
}

async fn tutor_close(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    state.tutor.close(id).await.map_err(map_tutor_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn coding_questions(State(state): State<AppState>) -> Json<QuestionsResponse> {
    Json(QuestionsResponse {
        starter_code: STARTER_CODE,
        questions: state.coding.samples(),
    })
}

async fn coding_generate(
    State(state): State<AppState>,
    request: Option<Json<GenerateRequest>>,
) -> Json<GeneratedQuestion> {
    let Json(request) = request.unwrap_or_default();
    Json(state.coding.generate(request.difficulty).await)
}

async fn coding_run(State(state): State<AppState>, Json(request): Json<RunRequest>) -> ApiResult<RunResponse> {
    let output = state
        .coding
        .run(&request.code, &request.input)
        .await
        .map_err(map_coding_error)?;
    Ok(Json(RunResponse { output }))
}

async fn coding_check(State(state): State<AppState>, Json(request): Json<CheckRequest>) -> ApiResult<CheckReport> {
    let report = state
        .coding
        .check(&request.code, &request.question)
        .await
        .map_err(map_coding_error)?;
    Ok(Json(report))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/topics", get(topics))
        .route("/v1/viva", post(start))
        .route("/v1/viva/history", get(history))
        .route("/v1/viva/:id", get(snapshot).delete(close))
        .route("/v1/viva/:id/start", post(restart))
        .route("/v1/viva/:id/answer", post(answer))
        .route("/v1/viva/:id/transcript", post(transcript))
        .route("/v1/viva/:id/end", post(end))
        .route("/v1/tutor", post(tutor_open))
        .route("/v1/tutor/:id", get(tutor_transcript).delete(tutor_close))
        .route("/v1/tutor/:id/messages", post(tutor_send))
        .route("/v1/coding/questions", get(coding_questions))
        .route("/v1/coding/questions/generate", post(coding_generate))
        .route("/v1/coding/run", post(coding_run))
        .route("/v1/coding/check", post(coding_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::core::{CodingLab, SqliteHistoryStore, TutorEngine, VivaEngine};
    use crate::providers::scripted::ScriptedProvider;

    const VALID_REPORT: &str =
        r#"{"strengths":["clear","concise"],"improvements":["depth","examples"],"overallPerformance":"Good","score":70}"#;

    async fn app(provider: ScriptedProvider) -> Router {
        let provider = Arc::new(provider);
        let store = Arc::new(SqliteHistoryStore::new_in_memory().await.unwrap());
        let viva = Arc::new(VivaEngine::new(provider.clone(), store, Duration::from_secs(1)));
        let tutor = Arc::new(TutorEngine::new(provider.clone()));
        let coding = Arc::new(CodingLab::new(provider));
        let config = Config {
            host: "127.0.0.1".into(),
            port: 0,
            gemini_api_key: None,
            gemini_model: crate::config::DEFAULT_GEMINI_MODEL.into(),
            gemini_base_url: crate::config::DEFAULT_GEMINI_BASE_URL.into(),
            data_dir: "./data".into(),
            settings_path: None,
        };
        router().with_state(AppState {
            config,
            viva,
            tutor,
            coding,
        })
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_and_topics() {
        let app = app(ScriptedProvider::new()).await;

        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["api_key_configured"], false);
        assert_eq!(body["active_sessions"], 0);
        assert_eq!(body["tutor_chats"], 0);

        let (status, body) = call(&app, "GET", "/v1/topics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["topics"][0], "C++ Basics");
    }

    #[tokio::test]
    async fn test_viva_over_http() {
        let app = app(
            ScriptedProvider::new()
                .reply("What is a stack?")
                .reply("Good. Next?")
                .reply(VALID_REPORT),
        )
        .await;

        let (status, body) = call(
            &app,
            "POST",
            "/v1/viva",
            Some(json!({"topic": "Data Structures", "difficulty": "Easy"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"]["type"], "replied");
        assert_eq!(body["session"]["phase"], "in_progress");
        let id = body["session"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, "POST", &format!("/v1/viva/{id}/answer"), Some(json!({"message": "   "}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("empty"));

        let (_, body) = call(
            &app,
            "POST",
            &format!("/v1/viva/{id}/answer"),
            Some(json!({"message": "A stack is LIFO"})),
        )
        .await;
        assert_eq!(body["session"]["transcript"].as_array().unwrap().len(), 3);

        let (status, body) = call(&app, "POST", &format!("/v1/viva/{id}/end"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"]["type"], "reported");
        assert_eq!(body["outcome"]["report"]["score"], 70);
        assert_eq!(body["session"]["phase"], "ended");

        let (_, body) = call(&app, "GET", "/v1/viva/history", None).await;
        assert_eq!(body[0]["topic"], "Data Structures");
        assert_eq!(body[0]["difficulty"], "Easy");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let app = app(ScriptedProvider::new().reply("Question")).await;

        let (status, body) = call(&app, "POST", "/v1/viva", Some(json!({"topic": "Cooking"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "unknown_topic");

        let (status, _) = call(&app, "GET", &format!("/v1/viva/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = call(&app, "POST", "/v1/viva", Some(json!({"topic": "Templates"}))).await;
        assert_eq!(body["session"]["difficulty"], "Medium");
        let id = body["session"]["id"].as_str().unwrap().to_string();

        let (status, _) = call(&app, "POST", &format!("/v1/viva/{id}/end"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(&app, "DELETE", &format!("/v1/viva/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_completion_failure_is_not_an_http_error() {
        let app = app(ScriptedProvider::new().fail(crate::providers::CompletionError::MissingApiKey)).await;

        let (status, body) = call(&app, "POST", "/v1/viva", Some(json!({"topic": "Algorithms"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"]["type"], "failed");
        assert!(body["outcome"]["message"]["content"]
            .as_str()
            .unwrap()
            .starts_with("I apologize"));
        assert_eq!(body["outcome"]["kind"], "missing_api_key");
        assert_eq!(body["session"]["phase"], "not_started");
    }
    #[tokio::test]
    async fn test_ended_viva_is_released() {
        let app = app(
            ScriptedProvider::new()
                .reply("What is a stack?")
                .reply("Good. Next?")
                .reply(VALID_REPORT),
        )
        .await;

        let (_, body) = call(&app, "POST", "/v1/viva", Some(json!({"topic": "Algorithms"}))).await;
        let id = body["session"]["id"].as_str().unwrap().to_string();
        call(&app, "POST", &format!("/v1/viva/{id}/answer"), Some(json!({"message": "Answer"}))).await;
        call(&app, "POST", &format!("/v1/viva/{id}/end"), None).await;

        let (_, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(body["active_sessions"], 0);

        let (status, _) = call(&app, "GET", &format!("/v1/viva/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tutor_over_http() {
        let app = app(ScriptedProvider::new().reply("Your roadmap").reply("Pointers hold addresses.")).await;

        let (status, body) = call(
            &app,
            "POST",
            "/v1/tutor",
            Some(json!({"preferences": {"cpp_level": "Beginner", "learning_goal": "Placements"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"]["content"], "Your roadmap");
        let id = body["chat_id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/v1/tutor/{id}/messages"),
            Some(json!({"message": "What is a pointer?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transcript"].as_array().unwrap().len(), 3);

        let (status, body) = call(&app, "POST", &format!("/v1/tutor/{id}/messages"), Some(json!({"message": ""}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "validation");

        let (status, _) = call(&app, "DELETE", &format!("/v1/tutor/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "GET", &format!("/v1/tutor/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_coding_over_http() {
        let app = app(
            ScriptedProvider::new()
                .reply("8")
                .reply("PASS")
                .reply("PASS")
                .reply("PASS")
                .fail(crate::providers::CompletionError::MissingApiKey),
        )
        .await;

        let (_, body) = call(&app, "GET", "/v1/coding/questions", None).await;
        assert!(body["starter_code"].as_str().unwrap().contains("int main()"));
        let question = body["questions"][0].clone();

        let (status, body) = call(
            &app,
            "POST",
            "/v1/coding/run",
            Some(json!({"code": "int main() {}", "input": "5 3"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output"], "8");

        let (status, body) = call(
            &app,
            "POST",
            "/v1/coding/check",
            Some(json!({"code": "int main() {}", "question": question})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["all_passed"], true);

        let (status, body) = call(&app, "POST", "/v1/coding/run", Some(json!({"code": "int main() {}"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "missing_api_key");

        let (status, _) = call(&app, "POST", "/v1/coding/run", Some(json!({"code": " "}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_generate_question_without_body() {
        let app = app(ScriptedProvider::new().fail(crate::providers::CompletionError::MissingApiKey)).await;

        let (status, body) = call(&app, "POST", "/v1/coding/questions/generate", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["generated"], false);
        assert_eq!(body["question"]["title"], "Sum of Two Numbers");
    }
}
