// HTTP route handlers for the Mentor API

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::judge::{self, CodeJudgement};
use crate::pipeline;
use crate::AppState;
use mentor_common::store;
use mentor_common::types::{EvaluateRequest, EvaluateResponse, OverallStatus};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Evaluation response for the paths where test cases never loaded.
fn fetch_error_response(problem_id: &str, message: String) -> EvaluateResponse {
    EvaluateResponse {
        problem_id: problem_id.to_string(),
        overall_status: OverallStatus::ErrorFetchingTestCases,
        message,
        test_case_results: vec![],
        hidden_tests_total_count: 0,
        hidden_tests_passed_count: 0,
        tutor_feedback: None,
        incorrect_lines: None,
        approach_feedback: None,
        is_correct_approach: None,
    }
}

/// POST /v1/execute/code/run - Evaluate a code submission
pub async fn evaluate_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EvaluateRequest>,
) -> axum::response::Response {
    if payload.problem_id.is_empty() || payload.language.is_empty() || payload.code.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required fields: problem_id, language, code",
        )
        .into_response();
    }

    let mut conn = state.redis.clone();

    let test_cases = match store::get_test_cases(&mut conn, &payload.problem_id).await {
        Ok(Some(test_cases)) => test_cases,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(fetch_error_response(
                    &payload.problem_id,
                    format!("Test cases not found for problem_id: {}", payload.problem_id),
                )),
            )
                .into_response();
        }
        Err(e) => {
            error!(problem_id = %payload.problem_id, error = %e, "Failed to fetch test cases");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(fetch_error_response(
                    &payload.problem_id,
                    format!("Error processing test cases: {}", e),
                )),
            )
                .into_response();
        }
    };

    if test_cases.is_empty() {
        let response = EvaluateResponse {
            overall_status: OverallStatus::NoTestCasesFound,
            message: OverallStatus::NoTestCasesFound.message().to_string(),
            ..fetch_error_response(&payload.problem_id, String::new())
        };
        return Json(response).into_response();
    }

    let request_id = Uuid::new_v4();
    info!(
        request_id = %request_id,
        problem_id = %payload.problem_id,
        language = %payload.language,
        test_cases = test_cases.len(),
        "Evaluating submission"
    );

    let response =
        pipeline::evaluate_submission(&state.piston, &state.llm, &mut conn, &payload, test_cases)
            .await;

    info!(
        request_id = %request_id,
        problem_id = %payload.problem_id,
        overall_status = ?response.overall_status,
        "Evaluation finished"
    );

    Json(response).into_response()
}

#[derive(Debug, Deserialize)]
pub struct TutorEvaluateRequest {
    pub session_id: String,
    pub problem_id: String,
    pub step_id: String,
    pub code: String,
    pub problem_description: String,
}

#[derive(Debug, Serialize)]
pub struct TutorEvaluateResponse {
    pub result: &'static str,
    pub message: String,
    pub incorrect_lines: Vec<u32>,
}

fn tutor_evaluate_response(judgement: Option<CodeJudgement>) -> (StatusCode, TutorEvaluateResponse) {
    match judgement {
        Some(CodeJudgement::Correct { message }) => (
            StatusCode::OK,
            TutorEvaluateResponse {
                result: "correct",
                message,
                incorrect_lines: vec![],
            },
        ),
        Some(CodeJudgement::Incorrect {
            message,
            incorrect_lines,
        }) => (
            StatusCode::OK,
            TutorEvaluateResponse {
                result: "incorrect",
                message,
                incorrect_lines,
            },
        ),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            TutorEvaluateResponse {
                result: "error",
                message: "Evaluation failed. Please try again.".to_string(),
                incorrect_lines: vec![],
            },
        ),
    }
}

/// POST /v1/tutor/evaluate - Judge a step submission without running it
pub async fn tutor_evaluate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TutorEvaluateRequest>,
) -> axum::response::Response {
    if payload.session_id.trim().is_empty()
        || payload.problem_id.trim().is_empty()
        || payload.step_id.trim().is_empty()
        || payload.code.trim().is_empty()
        || payload.problem_description.trim().is_empty()
    {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required fields: session_id, problem_id, step_id, code, problem_description",
        )
        .into_response();
    }

    if !state.llm.has_api_key() {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Server configuration issue. AI backend not configured.",
        )
        .into_response();
    }

    info!(
        session_id = %payload.session_id,
        problem_id = %payload.problem_id,
        step_id = %payload.step_id,
        "Evaluating step submission"
    );

    let judgement =
        judge::evaluate_code(&state.llm, &payload.problem_description, &payload.code).await;
    let (status, body) = tutor_evaluate_response(judgement);
    (status, Json(body)).into_response()
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tutor_evaluate_maps_judgements_to_wire_shape() {
        let (status, body) = tutor_evaluate_response(Some(CodeJudgement::Correct {
            message: "Looks good.".to_string(),
        }));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.result, "correct");
        assert!(body.incorrect_lines.is_empty());

        let (status, body) = tutor_evaluate_response(Some(CodeJudgement::Incorrect {
            message: "Off-by-one in the loop bound.".to_string(),
            incorrect_lines: vec![3],
        }));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.result, "incorrect");
        assert_eq!(body.incorrect_lines, vec![3]);

        let (status, body) = tutor_evaluate_response(None);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.result, "error");
        assert!(body.incorrect_lines.is_empty());
    }

    #[test]
    fn fetch_error_body_shape() {
        let response = fetch_error_response("two-sum", "Test cases not found".to_string());
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["overall_status"], "error_fetching_test_cases");
        assert_eq!(json["test_case_results"].as_array().unwrap().len(), 0);
        assert!(json.get("tutor_feedback").is_none());
    }
}
