/// Sandbox Execution Client - Remote Compile-and-Run
///
/// **Core Responsibility:**
/// Send one synthesized driver per test case to a Piston-compatible
/// execution service and classify the raw response.
///
/// **Critical Properties:**
/// - Knows nothing about test semantics or scoring
/// - One request per test case, strictly in order, never concurrent
/// - Fixed compile/run budgets per call; no retries
/// - Transport failures are per-test-case failures, not global ones
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_RUN_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_COMPILE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum PistonError {
    #[error("sandbox request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("sandbox returned malformed response: {0}")]
    Malformed(String),
}

/// Resolve the runtime version for a language.
/// Precedence: test-case override > request override > per-language default > "latest".
pub fn resolve_version(
    language: &str,
    test_case_override: Option<&str>,
    request_override: Option<&str>,
) -> String {
    if let Some(version) = test_case_override {
        return version.to_string();
    }
    if let Some(version) = request_override {
        return version.to_string();
    }
    match language.to_lowercase().as_str() {
        "python" => "3.10.0",
        "javascript" => "18.15.0",
        "java" => "15.0.2",
        "cpp" => "10.2.0",
        "csharp" => "6.12.0",
        _ => "latest",
    }
    .to_string()
}

/// Resolve the main file name the sandbox should write the driver to.
pub fn resolve_file_name(language: &str, test_case_override: Option<&str>) -> String {
    if let Some(name) = test_case_override {
        return name.to_string();
    }
    match language.to_lowercase().as_str() {
        "python" => "main.py".to_string(),
        "javascript" => "index.js".to_string(),
        "java" => "Main.java".to_string(),
        "csharp" => "program.cs".to_string(),
        "cpp" => "main.cpp".to_string(),
        other => {
            let stem: String = other.chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
            if stem.is_empty() {
                "source.txt".to_string()
            } else {
                format!("source.{}", stem)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct PistonFile {
    name: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct PistonRequest {
    language: String,
    version: String,
    files: Vec<PistonFile>,
    stdin: String,
    args: Vec<String>,
    run_timeout: u64,
    compile_timeout: u64,
}

/// Output of one stage (compile or run) of a sandbox execution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub signal: Option<String>,
}

/// Raw response from the sandbox service.
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxResponse {
    pub run: StageOutput,
    #[serde(default)]
    pub compile: Option<StageOutput>,
}

/// Classified result of one sandbox execution.
#[derive(Debug, Clone, PartialEq)]
pub enum SandboxVerdict {
    /// The compile stage failed. Identical for every test case of a
    /// submission, so the caller short-circuits the remaining ones.
    CompileError { stderr: String },
    /// The run stage wrote to stderr or exited non-zero.
    RuntimeError { stderr: String },
    /// The run stage was killed by the run-timeout budget.
    TimedOut,
    /// Clean exit; stdout carries the framed driver output.
    Completed,
}

/// Classify a sandbox response. Pure function over the raw stage outputs;
/// comparison is bypassed entirely for everything but `Completed`.
pub fn classify(response: &SandboxResponse) -> SandboxVerdict {
    if let Some(compile) = &response.compile {
        let compile_failed = !compile.stderr.is_empty() || compile.code.unwrap_or(0) != 0;
        if compile_failed {
            return SandboxVerdict::CompileError {
                stderr: compile.stderr.clone(),
            };
        }
    }

    if response.run.signal.as_deref() == Some("SIGKILL") {
        return SandboxVerdict::TimedOut;
    }

    if !response.run.stderr.is_empty() {
        return SandboxVerdict::RuntimeError {
            stderr: response.run.stderr.clone(),
        };
    }

    let exit_code = response.run.code.unwrap_or(0);
    if exit_code != 0 {
        return SandboxVerdict::RuntimeError {
            stderr: format!("Exited with code {}", exit_code),
        };
    }

    SandboxVerdict::Completed
}

/// The execution interface the pipeline drives. One implementation talks
/// to the real service; tests script responses through it.
pub trait Sandbox {
    fn execute(
        &self,
        language: &str,
        version: &str,
        file_name: &str,
        source: &str,
        stdin: &str,
        args: &[String],
    ) -> impl std::future::Future<Output = Result<SandboxResponse, PistonError>> + Send;
}

/// HTTP client for the remote execution service.
#[derive(Clone)]
pub struct PistonClient {
    http: reqwest::Client,
    base_url: String,
}

impl PistonClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            // Budget above compile + run timeouts so the service, not the
            // transport, decides timeouts in the normal case.
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.into(),
        }
    }
}

impl Sandbox for PistonClient {
    /// Submit one driver for compilation and execution.
    async fn execute(
        &self,
        language: &str,
        version: &str,
        file_name: &str,
        source: &str,
        stdin: &str,
        args: &[String],
    ) -> Result<SandboxResponse, PistonError> {
        let request = PistonRequest {
            language: language.to_string(),
            version: version.to_string(),
            files: vec![PistonFile {
                name: file_name.to_string(),
                content: source.to_string(),
            }],
            stdin: stdin.to_string(),
            args: args.to_vec(),
            run_timeout: DEFAULT_RUN_TIMEOUT_MS,
            compile_timeout: DEFAULT_COMPILE_TIMEOUT_MS,
        };

        let url = format!("{}/execute", self.base_url);
        let response = self.http.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PistonError::Malformed(format!(
                "status {}: {}",
                status, body
            )));
        }

        response
            .json::<SandboxResponse>()
            .await
            .map_err(|e| PistonError::Malformed(e.to_string()))
    }
}
