//! Evaluation Pipeline - One Submission, One Verdict
//!
//! **Core Responsibility:**
//! Drive one submission through the full sequence: driver synthesis,
//! sandbox execution, output comparison, status aggregation, then the
//! optional AI judgement passes, and assemble the response body.
//!
//! **Critical Properties:**
//! - Test cases run strictly in order; a confirmed compile error stops
//!   the remaining ones
//! - Hidden test cases contribute only aggregate counts to the response
//! - Both AI passes are best-effort: any failure there degrades to a
//!   response without feedback, never to an error status

use redis::aio::ConnectionManager;
use serde_json::Value;
use tracing::{info, warn};

use crate::driver::{self, DriverError};
use crate::evaluator::Aggregator;
use crate::judge::{self, ApproachJudgement, CodeJudgement};
use crate::llm::LlmClient;
use crate::parser;
use crate::piston::{self, Sandbox, SandboxResponse, SandboxVerdict};
use mentor_common::compare::deep_equal;
use mentor_common::store;
use mentor_common::types::{
    EvaluateRequest, EvaluateResponse, OverallStatus, TestCase, TestCaseResult, TestCaseStatus,
};

const DEFAULT_PROBLEM_DESCRIPTION: &str = "Solve the programming problem.";

/// Everything one sandbox execution contributes to a test-case result.
#[derive(Debug, Clone, PartialEq)]
struct ExecutionOutcome {
    status: TestCaseStatus,
    actual_output: Option<Value>,
    user_stdout: Option<String>,
    piston_stdout: String,
    piston_stderr: String,
    error_message: Option<String>,
}

/// Judge one sandbox response against the expected output. Pure function;
/// the comparison only runs when the execution completed cleanly.
fn judge_execution(response: &SandboxResponse, expected: &Value) -> ExecutionOutcome {
    match piston::classify(response) {
        SandboxVerdict::CompileError { stderr } => ExecutionOutcome {
            status: TestCaseStatus::CompileError,
            actual_output: None,
            user_stdout: None,
            piston_stdout: response.run.stdout.clone(),
            piston_stderr: stderr,
            error_message: None,
        },
        SandboxVerdict::TimedOut => ExecutionOutcome {
            status: TestCaseStatus::Timeout,
            actual_output: None,
            user_stdout: None,
            piston_stdout: response.run.stdout.clone(),
            piston_stderr: response.run.stderr.clone(),
            error_message: Some("Execution timed out.".to_string()),
        },
        SandboxVerdict::RuntimeError { stderr } => ExecutionOutcome {
            status: TestCaseStatus::Error,
            actual_output: None,
            user_stdout: None,
            piston_stdout: response.run.stdout.clone(),
            piston_stderr: stderr,
            error_message: None,
        },
        SandboxVerdict::Completed => {
            let output = parser::parse_driver_output(&response.run.stdout);
            let status = if deep_equal(&output.return_value, expected) {
                TestCaseStatus::Pass
            } else {
                TestCaseStatus::Fail
            };
            ExecutionOutcome {
                status,
                actual_output: Some(output.return_value),
                user_stdout: Some(output.user_stdout),
                piston_stdout: response.run.stdout.clone(),
                piston_stderr: response.run.stderr.clone(),
                error_message: None,
            }
        }
    }
}

/// Build the response entry for a visible test case.
///
/// Inputs and the expected output are always echoed back; the actual
/// output and captured user output only exist for `pass`/`fail`.
fn visible_result(tc: &TestCase, outcome: ExecutionOutcome) -> TestCaseResult {
    TestCaseResult {
        test_case_id: tc.id.clone(),
        status: outcome.status,
        input_args: Some(tc.args.clone()),
        input_arg_names: tc.arg_names.clone(),
        actual_output: outcome.actual_output,
        expected_output: Some(tc.expected_output.clone()),
        user_stdout: outcome.user_stdout,
        piston_stdout: Some(outcome.piston_stdout),
        piston_stderr: Some(outcome.piston_stderr),
        error_message: outcome.error_message,
    }
}

/// Entry for a visible test case whose driver could not be synthesized.
/// The sandbox was never contacted, so no outputs exist.
fn unrunnable_result(tc: &TestCase, error: &DriverError) -> TestCaseResult {
    TestCaseResult {
        test_case_id: tc.id.clone(),
        status: TestCaseStatus::Error,
        input_args: None,
        input_arg_names: None,
        actual_output: None,
        expected_output: Some(tc.expected_output.clone()),
        user_stdout: None,
        piston_stdout: None,
        piston_stderr: None,
        error_message: Some(error.to_string()),
    }
}

/// Run the full evaluation pipeline for one submission.
///
/// The caller has already fetched and validated the test cases; this
/// function never returns an error because every failure mode maps to a
/// status inside the response.
pub async fn evaluate_submission(
    sandbox: &impl Sandbox,
    llm: &LlmClient,
    redis: &mut ConnectionManager,
    request: &EvaluateRequest,
    test_cases: Vec<TestCase>,
) -> EvaluateResponse {
    let aggregator = run_tests(sandbox, request, &test_cases).await;
    finish(llm, redis, request, aggregator).await
}

/// The execution half of the pipeline: one sandbox call per test case,
/// strictly in order, stopping at the first confirmed compile error.
async fn run_tests(
    sandbox: &impl Sandbox,
    request: &EvaluateRequest,
    test_cases: &[TestCase],
) -> Aggregator {
    let mut aggregator = Aggregator::new();

    for tc in test_cases {
        let source = match driver::synthesize(
            &request.language,
            &request.code,
            &tc.function_name,
            &tc.args,
        ) {
            Ok(source) => source,
            Err(error) => {
                warn!(
                    test_case = %tc.id,
                    language = %request.language,
                    "Driver synthesis failed: {error}"
                );
                if tc.is_hidden {
                    aggregator.record_hidden_unrunnable();
                } else {
                    aggregator.record_visible_unrunnable(unrunnable_result(tc, &error));
                }
                continue;
            }
        };

        let version = piston::resolve_version(
            &request.language,
            tc.language_version.as_deref(),
            request.language_version.as_deref(),
        );
        let file_name = piston::resolve_file_name(&request.language, tc.main_file_name.as_deref());
        let stdin = tc.stdin.clone().unwrap_or_default();
        let cmd_args = tc.cmd_args.clone().unwrap_or_default();

        let outcome = match sandbox
            .execute(&request.language, &version, &file_name, &source, &stdin, &cmd_args)
            .await
        {
            Ok(response) => judge_execution(&response, &tc.expected_output),
            Err(error) => {
                warn!(test_case = %tc.id, "Sandbox execution failed: {error}");
                ExecutionOutcome {
                    status: TestCaseStatus::Error,
                    actual_output: None,
                    user_stdout: None,
                    piston_stdout: String::new(),
                    piston_stderr: format!("Worker error: {error}"),
                    error_message: None,
                }
            }
        };

        if tc.is_hidden {
            aggregator.record_hidden(outcome.status);
        } else {
            aggregator.record_visible(visible_result(tc, outcome));
        }

        if aggregator.should_short_circuit() {
            info!(problem_id = %request.problem_id, "Compile error, skipping remaining test cases");
            break;
        }
    }

    aggregator
}

/// The judgement half of the pipeline: approach validation, then tutor
/// feedback, then response assembly.
async fn finish(
    llm: &LlmClient,
    redis: &mut ConnectionManager,
    request: &EvaluateRequest,
    aggregator: Aggregator,
) -> EvaluateResponse {
    let mut overall = aggregator.overall();

    let mut approach_feedback: Option<String> = None;
    let mut is_correct_approach: Option<bool> = None;

    // Approach validation runs whenever the code at least executed
    // cleanly, even if some tests failed; test outcomes are part of the
    // model's context.
    if !aggregator.has_compilation_error()
        && !aggregator.has_runtime_error()
        && llm.has_api_key()
    {
        let approach_prompt = match store::get_approach_prompt(redis, &request.problem_id).await {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(problem_id = %request.problem_id, error = %e, "Failed to fetch approach prompt");
                None
            }
        };

        if let Some(prompt) = approach_prompt {
            let summary = format!(
                "Visible tests: {}/{} passed. Hidden tests: {}/{} passed.",
                aggregator.visible_passed_count(),
                aggregator.visible_total_count(),
                aggregator.hidden_tests_passed(),
                aggregator.hidden_tests_total(),
            );

            info!(problem_id = %request.problem_id, "Validating solution approach");
            match judge::evaluate_approach(llm, &prompt, &request.code, &summary).await {
                Some(ApproachJudgement::Correct { message }) => {
                    approach_feedback = Some(message);
                    is_correct_approach = Some(true);
                }
                Some(ApproachJudgement::Wrong { message }) => {
                    approach_feedback = Some(message);
                    is_correct_approach = Some(false);
                    overall = OverallStatus::WrongApproach;
                }
                None => {}
            }
        }
    }

    let mut tutor_feedback: Option<String> = None;
    let mut incorrect_lines: Option<Vec<u32>> = None;

    if matches!(overall, OverallStatus::SomeFailed | OverallStatus::WrongApproach)
        && llm.has_api_key()
    {
        // A wrong-approach verdict already carries its own explanation;
        // reuse it instead of asking the model twice.
        if overall == OverallStatus::WrongApproach && approach_feedback.is_some() {
            tutor_feedback = approach_feedback.clone();
        } else {
            let description = match store::get_description(redis, &request.problem_id).await {
                Ok(Some(description)) => description,
                Ok(None) => DEFAULT_PROBLEM_DESCRIPTION.to_string(),
                Err(e) => {
                    warn!(problem_id = %request.problem_id, error = %e, "Failed to fetch problem description");
                    DEFAULT_PROBLEM_DESCRIPTION.to_string()
                }
            };

            match judge::evaluate_code(llm, &description, &request.code).await {
                Some(CodeJudgement::Correct { message }) => {
                    tutor_feedback = Some(message);
                }
                Some(CodeJudgement::Incorrect {
                    message,
                    incorrect_lines: lines,
                }) => {
                    tutor_feedback = Some(message);
                    if !lines.is_empty() {
                        incorrect_lines = Some(lines);
                    }
                }
                None => {}
            }
        }
    }

    let hidden_tests_total_count = aggregator.hidden_tests_total();
    let hidden_tests_passed_count = aggregator.hidden_tests_passed();

    EvaluateResponse {
        problem_id: request.problem_id.clone(),
        overall_status: overall,
        message: overall.message().to_string(),
        test_case_results: aggregator.into_visible_results(),
        hidden_tests_total_count,
        hidden_tests_passed_count,
        tutor_feedback: tutor_feedback.filter(|f| !f.is_empty()),
        incorrect_lines,
        approach_feedback: approach_feedback.filter(|f| !f.is_empty()),
        is_correct_approach,
    }
}
