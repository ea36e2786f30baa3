//! Tutor Channel - Streaming Guidance Endpoints
//!
//! Three SSE endpoints share one frame protocol (see
//! [`mentor_common::types::StreamFrame`]):
//! - `/v1/tutor/interact`: step-scoped tutoring conversation; after the
//!   reply, a forced-choice classification decides whether the step is
//!   complete, and the verdict is streamed as a `status` frame
//! - `/v1/tutor/explain_test_case`: a short hint about one failing test
//!   case, never revealing the answer
//! - `/v1/chat/general`: free-form chat under a single store-wide system
//!   prompt, no step verdict
//!
//! Every stream ends with exactly one `[DONE]` frame, after everything
//! else, including on error paths.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crate::handlers::ErrorBody;
use crate::judge;
use crate::llm::{LlmError, Message, StreamParams, TokenEvent, TokenStream};
use crate::AppState;
use mentor_common::store;
use mentor_common::types::{ChatRole, ChatTurn, StepStatus, StreamFrame};

const HINT_TEMPERATURE: f64 = 0.5;
const HINT_MAX_TOKENS: u32 = 120;

const HINT_ERROR_MESSAGE: &str =
    "Sorry, I encountered an error while generating the hint. Please try again.";

const STEP_CLASSIFICATION_PROMPT: &str = r#"You are an evaluation assistant analyzing exactly one AI Tutor message.
Your task: if you see an explicit confirmation phrase directed at the learner (e.g., "Excellent!", "You got it!", "That's correct!"), call log_step_status with status="completed". Otherwise call it with status="incomplete". Default to 'incomplete' on ambiguity."#;

const HINT_SYSTEM_PROMPT: &str = r#"You are a helpful AI programming tutor providing hints for interactive exercises.
A learner submitted an incorrect answer for a specific test case.
Your task is to provide a short, guided hint based on their incorrect input, the specific parameters, and the expected output for THIS case.
DO NOT reveal the final correct answer.
DO NOT explain the user's error directly.
INSTEAD: Ask a concise question that prompts the learner to re-examine the given parameters in relation to the goal (implied by the expected output format/value) and their own answer.
If possible, subtly acknowledge their answer or potential thought process that might have led to it (e.g., 'You provided [user_input], maybe you were thinking about X?').
Keep the hint focused ONLY on the provided test case details. Be encouraging and supportive.
Example Goal: Guide the user to find the correct indices [0, 2] for nums=[4, 11, 2, 15], target=6, when they submitted [0, 1].
Example Hint: 'Okay, you suggested indices `[0, 1]`. Looking at `nums = [4, 11, 2, 15]`, what numbers are at those specific indices, and do they add up to the target `6`?'"#;

#[derive(Debug, Deserialize)]
pub struct InteractRequest {
    pub session_id: String,
    pub problem_id: String,
    pub step_id: String,
    pub chat_history: Vec<ChatTurn>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralChatRequest {
    pub session_id: String,
    pub chat_history: Vec<ChatTurn>,
}

#[derive(Debug, Deserialize)]
pub struct ExplainTestCaseRequest {
    pub problem_id: String,
    pub step_id: String,
    pub given_parameters: serde_json::Value,
    pub user_input: serde_json::Value,
    pub expected_output: serde_json::Value,
}

fn bad_request(message: impl Into<String>) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

fn ai_unavailable() -> axum::response::Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorBody {
            error: "Server configuration issue. AI backend not configured.".to_string(),
        }),
    )
        .into_response()
}

fn history_ends_with_user(history: &[ChatTurn]) -> bool {
    history.last().map_or(true, |turn| turn.role == ChatRole::User)
}

fn validate_interact(body: &InteractRequest) -> Result<(), &'static str> {
    if body.session_id.trim().is_empty() {
        return Err("session_id must be non-empty");
    }
    if body.problem_id.trim().is_empty() {
        return Err("problem_id must be non-empty");
    }
    if body.step_id.trim().is_empty() {
        return Err("step_id must be non-empty");
    }
    if !history_ends_with_user(&body.chat_history) {
        return Err("chat_history must end with a user message");
    }
    Ok(())
}

fn history_messages(system_prompt: &str, history: &[ChatTurn]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(system_prompt));
    for turn in history {
        messages.push(match turn.role {
            ChatRole::User => Message::user(turn.content.clone()),
            ChatRole::Assistant => Message::assistant(turn.content.clone()),
        });
    }
    messages
}

fn classification_messages(tutor_reply: &str) -> Vec<Message> {
    vec![
        Message::system(STEP_CLASSIFICATION_PROMPT),
        Message::user(format!("Here is the full tutor reply:\n\n{tutor_reply}")),
    ]
}

/// Assemble the tutor interaction stream: content frames while the reply
/// runs, then the step verdict from `classify` over the accumulated
/// reply, then the terminal frame. `classify` also runs on a partial
/// reply after a mid-stream error.
fn tutor_frames<F, Fut>(
    stream_result: Result<TokenStream, LlmError>,
    classify: F,
) -> impl Stream<Item = StreamFrame> + Send
where
    F: FnOnce(String) -> Fut + Send + 'static,
    Fut: Future<Output = StepStatus> + Send,
{
    async_stream::stream! {
        let token_stream = match stream_result {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Tutor stream could not be started");
                yield StreamFrame::Error(format!("Error streaming reply: {e}"));
                yield StreamFrame::Done;
                return;
            }
        };

        let mut tutor_reply = String::new();
        futures::pin_mut!(token_stream);

        while let Some(event) = token_stream.next().await {
            match event {
                Ok(TokenEvent::Content(delta)) => {
                    tutor_reply.push_str(&delta);
                    yield StreamFrame::Content(delta);
                }
                Ok(TokenEvent::Done) => break,
                Err(e) => {
                    warn!(error = %e, "Tutor stream failed mid-reply");
                    yield StreamFrame::Error(format!("Error streaming reply: {e}"));
                    break;
                }
            }
        }

        // The verdict is part of the same stream so the client never has
        // to poll; it goes out before the terminal frame.
        yield StreamFrame::Status(classify(tutor_reply).await);
        yield StreamFrame::Done;
    }
}

/// Relay a token stream as content frames. On failure, emit one error
/// frame (plus `apology` as an in-band content frame, when given) and
/// still terminate with the single `[DONE]`.
fn relay_frames(
    stream_result: Result<TokenStream, LlmError>,
    error_prefix: &'static str,
    apology: Option<&'static str>,
) -> impl Stream<Item = StreamFrame> + Send {
    async_stream::stream! {
        let token_stream = match stream_result {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "{error_prefix}");
                yield StreamFrame::Error(format!("{error_prefix}: {e}"));
                if let Some(apology) = apology {
                    yield StreamFrame::Content(apology.to_string());
                }
                yield StreamFrame::Done;
                return;
            }
        };

        futures::pin_mut!(token_stream);

        while let Some(event) = token_stream.next().await {
            match event {
                Ok(TokenEvent::Content(delta)) => {
                    yield StreamFrame::Content(delta);
                }
                Ok(TokenEvent::Done) => break,
                Err(e) => {
                    warn!(error = %e, "{error_prefix}");
                    yield StreamFrame::Error(format!("{error_prefix}: {e}"));
                    if let Some(apology) = apology {
                        yield StreamFrame::Content(apology.to_string());
                    }
                    break;
                }
            }
        }

        yield StreamFrame::Done;
    }
}

fn sse_response(
    frames: impl Stream<Item = StreamFrame> + Send + 'static,
) -> axum::response::Response {
    let events = frames.map(|frame| Ok::<_, Infallible>(Event::default().data(frame.to_sse_data())));
    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}

/// POST /v1/tutor/interact - Stream a tutor reply, then the step verdict
pub async fn interact(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<InteractRequest>,
) -> axum::response::Response {
    if !state.llm.has_api_key() {
        return ai_unavailable();
    }

    if let Err(message) = validate_interact(&payload) {
        return bad_request(message);
    }

    let mut conn = state.redis.clone();
    let step_prompt =
        match store::get_step_prompt(&mut conn, &payload.problem_id, &payload.step_id).await {
            Ok(Some(prompt)) => prompt,
            Ok(None) => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(ErrorBody {
                        error: format!(
                            "System prompt not found for problem_id={}, step_id={}",
                            payload.problem_id, payload.step_id
                        ),
                    }),
                )
                    .into_response();
            }
            Err(e) => {
                warn!(problem_id = %payload.problem_id, step_id = %payload.step_id, error = %e, "Failed to fetch step prompt");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: "Failed to load tutoring context".to_string(),
                    }),
                )
                    .into_response();
            }
        };

    info!(
        session_id = %payload.session_id,
        problem_id = %payload.problem_id,
        step_id = %payload.step_id,
        turns = payload.chat_history.len(),
        "Tutor interaction"
    );

    let messages = history_messages(&step_prompt, &payload.chat_history);
    let stream_result = state.llm.chat_stream(messages, StreamParams::default()).await;

    let llm = state.llm.clone();
    let classify = move |reply: String| async move {
        judge::classify_step_status(&llm, classification_messages(&reply)).await
    };

    sse_response(tutor_frames(stream_result, classify))
}

/// POST /v1/chat/general - Stream a reply under the store-wide prompt
pub async fn general_chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GeneralChatRequest>,
) -> axum::response::Response {
    if !state.llm.has_api_key() {
        return ai_unavailable();
    }

    if payload.session_id.trim().is_empty() {
        return bad_request("Missing required fields: session_id, chat_history.");
    }
    if !history_ends_with_user(&payload.chat_history) {
        return bad_request("Chat history must end with a user message.");
    }

    let mut conn = state.redis.clone();
    let system_prompt = match store::get_general_prompt(&mut conn).await {
        Ok(Some(prompt)) => prompt,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    error: "General chat system prompt not found.".to_string(),
                }),
            )
                .into_response();
        }
        Err(e) => {
            warn!(error = %e, "Failed to fetch general chat prompt");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "Failed to load chat context".to_string(),
                }),
            )
                .into_response();
        }
    };

    info!(
        session_id = %payload.session_id,
        turns = payload.chat_history.len(),
        "General chat"
    );

    let messages = history_messages(&system_prompt, &payload.chat_history);
    let stream_result = state.llm.chat_stream(messages, StreamParams::default()).await;

    sse_response(relay_frames(stream_result, "Stream processing error", None))
}

fn hint_user_prompt(request: &ExplainTestCaseRequest) -> String {
    format!(
        "Problem Context: Learner is working on '{}', step '{}'.\n\n\
         Specific Test Case Details:\n\
         - Given Parameters: {}\n\
         - Expected Output Hint (Goal/Format): {}\n\
         - Learner's Incorrect Input: {}\n\n\
         Task: Generate a short, guided hint for the learner based on their incorrect input. \
         The hint MUST be a question that helps them identify their mistake for this specific \
         test case by reconsidering the 'Given Parameters' and the goal implied by the \
         'Expected Output Hint'. Do not reveal the final answer.",
        request.problem_id,
        request.step_id,
        request.given_parameters,
        request.expected_output,
        request.user_input,
    )
}

/// POST /v1/tutor/explain_test_case - Stream a hint for one failing test
pub async fn explain_test_case(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> axum::response::Response {
    if !state.llm.has_api_key() {
        return ai_unavailable();
    }

    // Report every absent field at once rather than failing on the first.
    const REQUIRED_FIELDS: [&str; 5] = [
        "problem_id",
        "step_id",
        "given_parameters",
        "user_input",
        "expected_output",
    ];
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| payload.get(field).is_none())
        .collect();
    if !missing.is_empty() {
        return bad_request(format!("Missing required fields: {}", missing.join(", ")));
    }

    let request: ExplainTestCaseRequest = match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(e) => return bad_request(format!("Invalid request body: {e}")),
    };

    info!(
        problem_id = %request.problem_id,
        step_id = %request.step_id,
        "Explaining test case"
    );

    let messages = vec![
        Message::system(HINT_SYSTEM_PROMPT),
        Message::user(hint_user_prompt(&request)),
    ];
    let params = StreamParams {
        temperature: Some(HINT_TEMPERATURE),
        max_tokens: Some(HINT_MAX_TOKENS),
    };

    let stream_result = state.llm.chat_stream(messages, params).await;
    sse_response(relay_frames(
        stream_result,
        "Error streaming explanation",
        Some(HINT_ERROR_MESSAGE),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn interact_request(history: Vec<ChatTurn>) -> InteractRequest {
        InteractRequest {
            session_id: "s1".to_string(),
            problem_id: "two-sum".to_string(),
            step_id: "step-1".to_string(),
            chat_history: history,
        }
    }

    fn turn(role: ChatRole, content: &str) -> ChatTurn {
        ChatTurn {
            role,
            content: content.to_string(),
        }
    }

    fn tokens(events: Vec<Result<TokenEvent, LlmError>>) -> TokenStream {
        Box::pin(stream::iter(events))
    }

    fn assert_single_trailing_done(frames: &[StreamFrame]) {
        let done_count = frames
            .iter()
            .filter(|f| matches!(f, StreamFrame::Done))
            .count();
        assert_eq!(done_count, 1);
        assert_eq!(frames.last(), Some(&StreamFrame::Done));
    }

    #[test]
    fn empty_history_is_valid() {
        assert!(validate_interact(&interact_request(vec![])).is_ok());
    }

    #[test]
    fn history_must_end_with_user_turn() {
        let ok = interact_request(vec![
            turn(ChatRole::Assistant, "Hello!"),
            turn(ChatRole::User, "I'm stuck"),
        ]);
        assert!(validate_interact(&ok).is_ok());

        let bad = interact_request(vec![turn(ChatRole::Assistant, "Hello!")]);
        assert_eq!(
            validate_interact(&bad),
            Err("chat_history must end with a user message")
        );
    }

    #[test]
    fn blank_identifiers_are_rejected() {
        let mut request = interact_request(vec![]);
        request.step_id = "   ".to_string();
        assert_eq!(validate_interact(&request), Err("step_id must be non-empty"));
    }

    #[test]
    fn history_messages_prepend_system_prompt() {
        let messages = history_messages(
            "You are a tutor.",
            &[
                turn(ChatRole::User, "hi"),
                turn(ChatRole::Assistant, "hello"),
                turn(ChatRole::User, "help"),
            ],
        );

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3].content, "help");
    }

    #[tokio::test]
    async fn tutor_stream_orders_content_status_done() {
        let stream = tutor_frames(
            Ok(tokens(vec![
                Ok(TokenEvent::Content("Great ".to_string())),
                Ok(TokenEvent::Content("job!".to_string())),
                Ok(TokenEvent::Done),
            ])),
            |reply| async move {
                assert_eq!(reply, "Great job!");
                StepStatus::Completed
            },
        );
        let frames: Vec<StreamFrame> = stream.collect().await;

        assert_eq!(
            frames,
            vec![
                StreamFrame::Content("Great ".to_string()),
                StreamFrame::Content("job!".to_string()),
                StreamFrame::Status(StepStatus::Completed),
                StreamFrame::Done,
            ]
        );
        assert_single_trailing_done(&frames);
    }

    #[tokio::test]
    async fn tutor_stream_failure_still_ends_with_done() {
        let stream = tutor_frames(
            Err(LlmError::RequestFailed("connection reset".to_string())),
            |_reply| async move { StepStatus::Completed },
        );
        let frames: Vec<StreamFrame> = stream.collect().await;

        assert!(matches!(frames[0], StreamFrame::Error(_)));
        assert_single_trailing_done(&frames);
    }

    #[tokio::test]
    async fn tutor_stream_classifies_partial_reply_after_mid_stream_error() {
        let stream = tutor_frames(
            Ok(tokens(vec![
                Ok(TokenEvent::Content("par".to_string())),
                Err(LlmError::RequestFailed("reset".to_string())),
            ])),
            |reply| async move {
                assert_eq!(reply, "par");
                StepStatus::Incomplete
            },
        );
        let frames: Vec<StreamFrame> = stream.collect().await;

        assert_eq!(frames[0], StreamFrame::Content("par".to_string()));
        assert!(matches!(frames[1], StreamFrame::Error(_)));
        assert_eq!(frames[2], StreamFrame::Status(StepStatus::Incomplete));
        assert_single_trailing_done(&frames);
    }

    #[tokio::test]
    async fn hint_stream_apologizes_in_band_and_terminates() {
        let stream = relay_frames(
            Ok(tokens(vec![
                Ok(TokenEvent::Content("Hmm".to_string())),
                Err(LlmError::RequestFailed("reset".to_string())),
            ])),
            "Error streaming explanation",
            Some(HINT_ERROR_MESSAGE),
        );
        let frames: Vec<StreamFrame> = stream.collect().await;

        assert_eq!(frames[0], StreamFrame::Content("Hmm".to_string()));
        assert!(matches!(frames[1], StreamFrame::Error(_)));
        assert_eq!(frames[2], StreamFrame::Content(HINT_ERROR_MESSAGE.to_string()));
        assert_single_trailing_done(&frames);
    }

    #[tokio::test]
    async fn general_chat_stream_has_no_status_frame() {
        let stream = relay_frames(
            Ok(tokens(vec![
                Ok(TokenEvent::Content("Hi!".to_string())),
                Ok(TokenEvent::Done),
            ])),
            "Stream processing error",
            None,
        );
        let frames: Vec<StreamFrame> = stream.collect().await;

        assert_eq!(
            frames,
            vec![
                StreamFrame::Content("Hi!".to_string()),
                StreamFrame::Done,
            ]
        );
        assert_single_trailing_done(&frames);
    }

    #[test]
    fn hint_prompt_embeds_test_case_details() {
        let request = ExplainTestCaseRequest {
            problem_id: "two-sum".to_string(),
            step_id: "step-2".to_string(),
            given_parameters: serde_json::json!({"nums": [4, 11, 2, 15], "target": 6}),
            user_input: serde_json::json!([0, 1]),
            expected_output: serde_json::json!([0, 2]),
        };

        let prompt = hint_user_prompt(&request);
        assert!(prompt.contains("'two-sum', step 'step-2'"));
        assert!(prompt.contains("[4,11,2,15]"));
        assert!(prompt.contains("Learner's Incorrect Input: [0,1]"));
        assert!(prompt.contains("Do not reveal the final answer."));
    }
}
