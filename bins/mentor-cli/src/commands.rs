// CLI commands for seeding the problem store and submitting solutions
use anyhow::{bail, Context, Result};
use redis::aio::ConnectionManager;
use std::fs;

use mentor_common::store;
use mentor_common::types::{EvaluateRequest, EvaluateResponse, TestCase};

async fn connect(redis_url: &str) -> Result<ConnectionManager> {
    let client = redis::Client::open(redis_url).context("Invalid Redis URL")?;
    ConnectionManager::new(client)
        .await
        .with_context(|| format!("Failed to connect to Redis at {redis_url}"))
}

fn read_file(path: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))
}

pub async fn seed_tests(redis_url: &str, problem_id: &str, file: &str) -> Result<()> {
    let payload = read_file(file)?;
    let cases: Vec<TestCase> =
        serde_json::from_str(&payload).context("Test case file is not a valid JSON array")?;
    if cases.is_empty() {
        bail!("Test case file contains no test cases");
    }

    let hidden = cases.iter().filter(|tc| tc.is_hidden).count();

    let mut conn = connect(redis_url).await?;
    store::put_test_cases(&mut conn, problem_id, &cases).await?;

    println!(
        "Seeded {} test cases for '{}' ({} hidden)",
        cases.len(),
        problem_id,
        hidden
    );
    Ok(())
}

pub async fn seed_description(redis_url: &str, problem_id: &str, file: &str) -> Result<()> {
    let description = read_file(file)?;
    let mut conn = connect(redis_url).await?;
    store::put_description(&mut conn, problem_id, &description).await?;

    println!("Seeded description for '{problem_id}'");
    Ok(())
}

pub async fn seed_approach(redis_url: &str, problem_id: &str, file: &str) -> Result<()> {
    let prompt = read_file(file)?;
    let mut conn = connect(redis_url).await?;
    store::put_approach_prompt(&mut conn, problem_id, &prompt).await?;

    println!("Seeded approach rubric for '{problem_id}'");
    Ok(())
}

pub async fn seed_step(redis_url: &str, problem_id: &str, step_id: &str, file: &str) -> Result<()> {
    let prompt = read_file(file)?;
    let mut conn = connect(redis_url).await?;
    store::put_step_prompt(&mut conn, problem_id, step_id, &prompt).await?;

    println!("Seeded tutor prompt for '{problem_id}' step '{step_id}'");
    Ok(())
}

pub async fn seed_general(redis_url: &str, file: &str) -> Result<()> {
    let prompt = read_file(file)?;
    let mut conn = connect(redis_url).await?;
    store::put_general_prompt(&mut conn, &prompt).await?;

    println!("Seeded general chat prompt");
    Ok(())
}

pub async fn submit(api_url: &str, problem_id: &str, language: &str, file: &str) -> Result<()> {
    let code = read_file(file)?;

    let request = EvaluateRequest {
        problem_id: problem_id.to_string(),
        language: language.to_string(),
        code,
        language_version: None,
    };

    let url = format!("{api_url}/v1/execute/code/run");
    let response = reqwest::Client::new()
        .post(&url)
        .json(&request)
        .send()
        .await
        .with_context(|| format!("Failed to reach {url}"))?;

    let status = response.status();
    let body = response.text().await.context("Failed to read response")?;

    let Ok(verdict) = serde_json::from_str::<EvaluateResponse>(&body) else {
        bail!("Unexpected response ({status}): {body}");
    };

    println!("Status:  {:?}", verdict.overall_status);
    println!("Message: {}", verdict.message);

    for result in &verdict.test_case_results {
        println!("  test {}: {:?}", result.test_case_id, result.status);
        if let Some(message) = &result.error_message {
            println!("    {message}");
        }
    }

    if verdict.hidden_tests_total_count > 0 {
        println!(
            "Hidden tests: {}/{} passed",
            verdict.hidden_tests_passed_count, verdict.hidden_tests_total_count
        );
    }

    if let Some(feedback) = &verdict.tutor_feedback {
        println!("\nTutor feedback:\n{feedback}");
    }
    if let Some(lines) = &verdict.incorrect_lines {
        println!(
            "Check lines: {}",
            lines
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    Ok(())
}
