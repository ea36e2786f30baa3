use crate::types::TestCase;
use redis::{AsyncCommands, RedisResult};

/// Problem store key semantics - defines only key layout, not runtime logic.
/// Keeps the API and the seeding CLI from drifting, and makes every key
/// deterministic for a given problem.
///
/// The evaluation pipeline only ever reads these keys; writes happen through
/// the seeding CLI.

pub const TESTS_PREFIX: &str = "mentor:tests";
pub const DESCRIPTION_PREFIX: &str = "mentor:description";
pub const APPROACH_PROMPT_PREFIX: &str = "mentor:prompt:approach";
pub const STEP_PROMPT_PREFIX: &str = "mentor:prompt:step";

/// Single key holding the problem-independent general-chat system prompt.
pub const GENERAL_PROMPT_KEY: &str = "mentor:prompt:general";

/// Key holding the JSON array of test cases for a problem
pub fn tests_key(problem_id: &str) -> String {
    format!("{}:{}", TESTS_PREFIX, problem_id)
}

/// Key holding the problem description text
pub fn description_key(problem_id: &str) -> String {
    format!("{}:{}", DESCRIPTION_PREFIX, problem_id)
}

/// Key holding the approach rubric for a problem, if one is registered
pub fn approach_prompt_key(problem_id: &str) -> String {
    format!("{}:{}", APPROACH_PROMPT_PREFIX, problem_id)
}

/// Key holding the tutor system prompt for a problem step
pub fn step_prompt_key(problem_id: &str, step_id: &str) -> String {
    format!("{}:{}:{}", STEP_PROMPT_PREFIX, problem_id, step_id)
}

fn type_error(kind: &'static str, e: impl ToString) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, kind, e.to_string()))
}

/// Fetch the test cases for a problem. `Ok(None)` means the problem has no
/// entry in the store at all; a present but malformed entry is an error.
pub async fn get_test_cases(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: &str,
) -> RedisResult<Option<Vec<TestCase>>> {
    let payload: Option<String> = conn.get(tests_key(problem_id)).await?;

    match payload {
        Some(data) => {
            let cases: Vec<TestCase> = serde_json::from_str(&data)
                .map_err(|e| type_error("test case deserialization error", e))?;
            Ok(Some(cases))
        }
        None => Ok(None),
    }
}

/// Fetch the problem description, if present.
pub async fn get_description(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: &str,
) -> RedisResult<Option<String>> {
    conn.get(description_key(problem_id)).await
}

/// Fetch the approach rubric for a problem. Absence means approach
/// validation is skipped for this problem.
pub async fn get_approach_prompt(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: &str,
) -> RedisResult<Option<String>> {
    conn.get(approach_prompt_key(problem_id)).await
}

/// Fetch the tutor system prompt for a problem step.
pub async fn get_step_prompt(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: &str,
    step_id: &str,
) -> RedisResult<Option<String>> {
    conn.get(step_prompt_key(problem_id, step_id)).await
}

/// Fetch the general-chat system prompt. Not scoped to a problem.
pub async fn get_general_prompt(
    conn: &mut redis::aio::ConnectionManager,
) -> RedisResult<Option<String>> {
    conn.get(GENERAL_PROMPT_KEY).await
}

/// Store test cases for a problem (seeding CLI only).
pub async fn put_test_cases(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: &str,
    cases: &[TestCase],
) -> RedisResult<()> {
    let payload = serde_json::to_string(cases)
        .map_err(|e| type_error("test case serialization error", e))?;
    conn.set(tests_key(problem_id), payload).await
}

/// Store the description for a problem (seeding CLI only).
pub async fn put_description(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: &str,
    description: &str,
) -> RedisResult<()> {
    conn.set(description_key(problem_id), description).await
}

/// Store the approach rubric for a problem (seeding CLI only).
pub async fn put_approach_prompt(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: &str,
    prompt: &str,
) -> RedisResult<()> {
    conn.set(approach_prompt_key(problem_id), prompt).await
}

/// Store the general-chat system prompt (seeding CLI only).
pub async fn put_general_prompt(
    conn: &mut redis::aio::ConnectionManager,
    prompt: &str,
) -> RedisResult<()> {
    conn.set(GENERAL_PROMPT_KEY, prompt).await
}

/// Store the tutor system prompt for a problem step (seeding CLI only).
pub async fn put_step_prompt(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: &str,
    step_id: &str,
    prompt: &str,
) -> RedisResult<()> {
    conn.set(step_prompt_key(problem_id, step_id), prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_naming() {
        assert_eq!(tests_key("two-sum"), "mentor:tests:two-sum");
        assert_eq!(description_key("two-sum"), "mentor:description:two-sum");
        assert_eq!(
            approach_prompt_key("two-sum"),
            "mentor:prompt:approach:two-sum"
        );
        assert_eq!(
            step_prompt_key("two-sum", "step-3"),
            "mentor:prompt:step:two-sum:step-3"
        );
    }

    #[test]
    fn test_keys_deterministic() {
        assert_eq!(tests_key("p1"), tests_key("p1"));
        assert_ne!(tests_key("p1"), tests_key("p2"));
    }
}
