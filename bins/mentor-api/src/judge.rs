//! AI Judgement - Forced-Choice Model Calls
//!
//! Two judgement passes over a submission, both expressed as closed
//! choices the model must pick from by calling a tool:
//! - qualitative code evaluation (`code_correct` / `code_incorrect`)
//! - approach validation (`correct_approach` / `wrong_approach`)
//!
//! Plus the tutor's step-status classification (`log_step_status`).
//!
//! A model reply is only accepted if it is a well-formed call to one of
//! the expected tools; anything else is treated as "no judgement" and the
//! pipeline degrades to no feedback rather than surfacing an error to the
//! learner.

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::llm::{LlmClient, Message, ToolDefinition, ToolInvocation};
use mentor_common::types::StepStatus;

const CODE_CORRECT_TOOL: &str = "code_correct";
const CODE_INCORRECT_TOOL: &str = "code_incorrect";
const CORRECT_APPROACH_TOOL: &str = "correct_approach";
const WRONG_APPROACH_TOOL: &str = "wrong_approach";
const LOG_STEP_STATUS_TOOL: &str = "log_step_status";

const CODE_EVALUATION_SYSTEM_PROMPT: &str = r#"You are a hint assistant for coding exercises.
You MUST evaluate the provided student code against the Problem Description.
Lines of code are numbered for your reference. Ensure your evaluation considers correct syntax and problem-specific logic.

Your response MUST be a call to one of the following two functions:
1. If the code correctly and fully solves the problem, you MUST call the `code_correct` function.
2. If the code is incorrect, incomplete, or contains errors, you MUST call the `code_incorrect` function.

When calling `code_incorrect`, provide:
    a. A concise description of the main error.
    b. A leading question to guide the user toward the solution.
    c. Set `incorrect_lines` to an array of the 1-based faulty line numbers. If the error is conceptual or not tied to specific lines, use an empty array [].

Address the user directly using "you". Keep all feedback concise.
Failure to call one of these two functions is not an option."#;

/// The model's verdict on a code submission.
#[derive(Debug, Clone, PartialEq)]
pub enum CodeJudgement {
    Correct {
        message: String,
    },
    Incorrect {
        message: String,
        incorrect_lines: Vec<u32>,
    },
}

/// The model's verdict on whether the submission uses the expected
/// approach.
#[derive(Debug, Clone, PartialEq)]
pub enum ApproachJudgement {
    Correct { message: String },
    Wrong { message: String },
}

fn code_evaluation_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: CODE_CORRECT_TOOL.to_string(),
            description: "Call this when the learner's code fully solves the problem.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string", "description": "A short praise message." }
                },
                "required": ["message"]
            }),
        },
        ToolDefinition {
            name: CODE_INCORRECT_TOOL.to_string(),
            description: "Call this when the code is incorrect or incomplete.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string", "description": "Feedback with error, question, and tip." },
                    "incorrect_lines": {
                        "type": "array",
                        "items": { "type": "integer" },
                        "description": "List of 1-based faulty line numbers."
                    }
                },
                "required": ["message", "incorrect_lines"]
            }),
        },
    ]
}

fn approach_validation_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: CORRECT_APPROACH_TOOL.to_string(),
            description:
                "Call this when the code implements the correct approach for the problem step."
                    .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string", "description": "A short message confirming the approach is correct." }
                },
                "required": ["message"]
            }),
        },
        ToolDefinition {
            name: WRONG_APPROACH_TOOL.to_string(),
            description:
                "Call this when the code implements a different approach than what's expected for this step."
                    .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string", "description": "Feedback explaining why the approach is incorrect for this step and what approach was expected." }
                },
                "required": ["message"]
            }),
        },
    ]
}

fn step_status_tools() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        name: LOG_STEP_STATUS_TOOL.to_string(),
        description: "Record whether the learner has completed the current step.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ["completed", "incomplete"],
                    "description": "Whether the step's goal has been met."
                }
            },
            "required": ["status"]
        }),
    }]
}

#[derive(Debug, Deserialize)]
struct MessageArgs {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IncorrectArgs {
    message: String,
    #[serde(default)]
    incorrect_lines: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StepStatusArgs {
    status: StepStatus,
}

/// Keep only values that are genuine 1-based line numbers. Models
/// occasionally emit floats, zeros, or strings here.
fn sanitize_line_numbers(raw: Vec<serde_json::Value>) -> Vec<u32> {
    raw.into_iter()
        .filter_map(|v| v.as_u64())
        .filter(|&n| n >= 1 && n <= u32::MAX as u64)
        .map(|n| n as u32)
        .collect()
}

/// Interpret a tool invocation as a code judgement. `None` means the
/// model violated the protocol.
fn parse_code_judgement(invocation: &ToolInvocation) -> Option<CodeJudgement> {
    match invocation.name.as_str() {
        CODE_CORRECT_TOOL => {
            let args: MessageArgs = serde_json::from_str(&invocation.arguments).ok()?;
            Some(CodeJudgement::Correct {
                message: args.message,
            })
        }
        CODE_INCORRECT_TOOL => {
            let args: IncorrectArgs = serde_json::from_str(&invocation.arguments).ok()?;
            Some(CodeJudgement::Incorrect {
                message: args.message,
                incorrect_lines: sanitize_line_numbers(args.incorrect_lines),
            })
        }
        _ => None,
    }
}

fn parse_approach_judgement(invocation: &ToolInvocation) -> Option<ApproachJudgement> {
    let args: MessageArgs = serde_json::from_str(&invocation.arguments).ok()?;
    match invocation.name.as_str() {
        CORRECT_APPROACH_TOOL => Some(ApproachJudgement::Correct {
            message: args.message,
        }),
        WRONG_APPROACH_TOOL => Some(ApproachJudgement::Wrong {
            message: args.message,
        }),
        _ => None,
    }
}

fn parse_step_status(invocation: &ToolInvocation) -> Option<StepStatus> {
    if invocation.name != LOG_STEP_STATUS_TOOL {
        return None;
    }
    let args: StepStatusArgs = serde_json::from_str(&invocation.arguments).ok()?;
    Some(args.status)
}

/// Ask the model for qualitative feedback on a failing submission.
///
/// Every failure mode degrades to `None`: the evaluation response simply
/// carries no tutor feedback.
pub async fn evaluate_code(
    llm: &LlmClient,
    problem_description: &str,
    code: &str,
) -> Option<CodeJudgement> {
    let messages = vec![
        Message::system(CODE_EVALUATION_SYSTEM_PROMPT),
        Message::user(format!(
            "Problem Description\n{problem_description}\n\nCode Submission:\n```\n{code}\n```"
        )),
    ];

    let invocation = match llm
        .complete_with_tools(messages, code_evaluation_tools(), None)
        .await
    {
        Ok(Some(invocation)) => invocation,
        Ok(None) => {
            warn!("Code evaluation returned no tool call");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "Code evaluation request failed");
            return None;
        }
    };

    let judgement = parse_code_judgement(&invocation);
    if judgement.is_none() {
        warn!(tool = %invocation.name, "Code evaluation returned an unexpected tool call");
    }
    judgement
}

/// Ask the model whether the submission uses the expected approach.
///
/// `None` means the check could not be performed; the caller treats that
/// as "approach accepted".
pub async fn evaluate_approach(
    llm: &LlmClient,
    approach_prompt: &str,
    code: &str,
    test_outcome_summary: &str,
) -> Option<ApproachJudgement> {
    let messages = vec![
        Message::system(approach_prompt),
        Message::user(format!(
            "{test_outcome_summary}\n\nCode Submission:\n```\n{code}\n```"
        )),
    ];

    let invocation = match llm
        .complete_with_tools(messages, approach_validation_tools(), None)
        .await
    {
        Ok(Some(invocation)) => invocation,
        Ok(None) => {
            warn!("Approach validation returned no tool call");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "Approach validation request failed");
            return None;
        }
    };

    let judgement = parse_approach_judgement(&invocation);
    if judgement.is_none() {
        warn!(tool = %invocation.name, "Approach validation returned an unexpected tool call");
    }
    judgement
}

/// Classify whether the learner completed the current step, given the
/// full tutor conversation. The call forces `log_step_status`, so a
/// missing or malformed reply defaults to `Incomplete`.
pub async fn classify_step_status(llm: &LlmClient, messages: Vec<Message>) -> StepStatus {
    let invocation = match llm
        .complete_with_tools(messages, step_status_tools(), Some(LOG_STEP_STATUS_TOOL))
        .await
    {
        Ok(Some(invocation)) => invocation,
        Ok(None) => {
            warn!("Step classification returned no tool call");
            return StepStatus::Incomplete;
        }
        Err(e) => {
            warn!(error = %e, "Step classification request failed");
            return StepStatus::Incomplete;
        }
    };

    parse_step_status(&invocation).unwrap_or_else(|| {
        warn!(tool = %invocation.name, "Step classification returned an unexpected tool call");
        StepStatus::Incomplete
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(name: &str, arguments: &str) -> ToolInvocation {
        ToolInvocation {
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn correct_judgement_parses() {
        let parsed = parse_code_judgement(&invocation(
            "code_correct",
            r#"{"message":"Nice work!"}"#,
        ));
        assert_eq!(
            parsed,
            Some(CodeJudgement::Correct {
                message: "Nice work!".to_string()
            })
        );
    }

    #[test]
    fn incorrect_judgement_keeps_valid_lines_only() {
        let parsed = parse_code_judgement(&invocation(
            "code_incorrect",
            r#"{"message":"Off by one.","incorrect_lines":[3, 0, 2.5, "7", -1, 12]}"#,
        ));
        assert_eq!(
            parsed,
            Some(CodeJudgement::Incorrect {
                message: "Off by one.".to_string(),
                incorrect_lines: vec![3, 12],
            })
        );
    }

    #[test]
    fn missing_incorrect_lines_defaults_to_empty() {
        let parsed = parse_code_judgement(&invocation(
            "code_incorrect",
            r#"{"message":"Conceptual issue."}"#,
        ));
        assert_eq!(
            parsed,
            Some(CodeJudgement::Incorrect {
                message: "Conceptual issue.".to_string(),
                incorrect_lines: vec![],
            })
        );
    }

    #[test]
    fn unknown_tool_is_rejected() {
        assert_eq!(
            parse_code_judgement(&invocation("write_poem", r#"{"message":"hi"}"#)),
            None
        );
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        assert_eq!(
            parse_code_judgement(&invocation("code_correct", "not json")),
            None
        );
        assert_eq!(
            parse_code_judgement(&invocation("code_correct", r#"{"note":"wrong field"}"#)),
            None
        );
    }

    #[test]
    fn approach_judgements_parse() {
        assert_eq!(
            parse_approach_judgement(&invocation(
                "correct_approach",
                r#"{"message":"Two pointers, as expected."}"#
            )),
            Some(ApproachJudgement::Correct {
                message: "Two pointers, as expected.".to_string()
            })
        );
        assert_eq!(
            parse_approach_judgement(&invocation(
                "wrong_approach",
                r#"{"message":"Expected a hash map."}"#
            )),
            Some(ApproachJudgement::Wrong {
                message: "Expected a hash map.".to_string()
            })
        );
        assert_eq!(
            parse_approach_judgement(&invocation("code_correct", r#"{"message":"x"}"#)),
            None
        );
    }

    #[test]
    fn step_status_parses_and_defaults() {
        assert_eq!(
            parse_step_status(&invocation("log_step_status", r#"{"status":"completed"}"#)),
            Some(StepStatus::Completed)
        );
        assert_eq!(
            parse_step_status(&invocation("log_step_status", r#"{"status":"incomplete"}"#)),
            Some(StepStatus::Incomplete)
        );
        assert_eq!(
            parse_step_status(&invocation("log_step_status", r#"{"status":"maybe"}"#)),
            None
        );
        assert_eq!(
            parse_step_status(&invocation("other_tool", r#"{"status":"completed"}"#)),
            None
        );
    }
}
