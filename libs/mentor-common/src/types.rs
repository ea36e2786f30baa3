use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_function_name() -> String {
    "solution".to_string()
}

/// A single test case as stored in the problem store.
/// Immutable for the lifetime of a request; hidden cases never leave the
/// service except as aggregate counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    #[serde(default = "default_function_name")]
    pub function_name: String,
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg_names: Option<Vec<String>>,
    pub expected_output: Value,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd_args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_file_name: Option<String>,
}

/// Outcome of one test case execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCaseStatus {
    Pass,
    Fail,
    Error,
    CompileError,
    Timeout,
}

/// Per-test-case entry in the evaluation response. Only visible test cases
/// are ever serialized into a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub test_case_id: String,
    pub status: TestCaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_args: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_arg_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piston_stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piston_stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Aggregate verdict for a whole submission.
///
/// Exactly one value per response. Execution outcomes follow strict
/// precedence: `compilation_error` > `runtime_error` > `some_failed` >
/// `all_passed`. A wrong-approach verdict then replaces `some_failed` or
/// `all_passed` with `wrong_approach`; it never displaces a compile or
/// runtime error. The fetch-error variants and `no_test_cases_found` are
/// terminal before any of this applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    AllPassed,
    SomeFailed,
    CompilationError,
    RuntimeError,
    ErrorFetchingTestCases,
    ErrorExecutingTests,
    NoTestCasesFound,
    WrongApproach,
}

impl OverallStatus {
    /// Canonical human message shown alongside the status.
    pub fn message(&self) -> &'static str {
        match self {
            OverallStatus::AllPassed => {
                "Congratulations! Your solution passed all test cases."
            }
            OverallStatus::SomeFailed => "Your solution did not pass all test cases.",
            OverallStatus::CompilationError => "Your code failed to compile.",
            OverallStatus::RuntimeError => {
                "Your code encountered an error during execution on one or more test cases."
            }
            OverallStatus::ErrorFetchingTestCases => {
                "Test cases could not be loaded for this problem."
            }
            OverallStatus::ErrorExecutingTests => {
                "An internal error occurred while executing the tests."
            }
            OverallStatus::NoTestCasesFound => "No test cases found for this problem.",
            OverallStatus::WrongApproach => {
                "Your solution passed the tests but doesn't use the expected approach."
            }
        }
    }
}

/// Request body for the evaluation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub problem_id: String,
    pub language: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_version: Option<String>,
}

/// Response root for the evaluation endpoint. Constructed once per request,
/// never mutated after being sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub problem_id: String,
    pub overall_status: OverallStatus,
    pub message: String,
    pub test_case_results: Vec<TestCaseResult>,
    pub hidden_tests_total_count: u32,
    pub hidden_tests_passed_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tutor_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incorrect_lines: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approach_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct_approach: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of tutoring conversation, as sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Step-completion verdict produced by the post-stream classification call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Incomplete,
}

/// One frame of a tutor/hint event stream.
///
/// `Done` terminates every stream, success or failure, and is always the
/// last frame emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Content(String),
    Status(StepStatus),
    Error(String),
    Done,
}

impl StreamFrame {
    /// Wire encoding of the frame payload (the `data:` field of one SSE
    /// event). The done marker is the literal `[DONE]`, not JSON, so the
    /// consumer's read loop can terminate on a bare string compare.
    pub fn to_sse_data(&self) -> String {
        match self {
            StreamFrame::Content(chunk) => {
                serde_json::json!({ "content": chunk }).to_string()
            }
            StreamFrame::Status(status) => {
                serde_json::json!({ "status": status }).to_string()
            }
            StreamFrame::Error(message) => {
                serde_json::json!({ "error": message }).to_string()
            }
            StreamFrame::Done => "[DONE]".to_string(),
        }
    }
}
