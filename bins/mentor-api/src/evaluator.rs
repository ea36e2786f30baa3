/// Status Aggregator - Reducing Per-Test Outcomes Into One Verdict
///
/// **Core Responsibility:**
/// Fold every attempted test case into exactly one overall status.
///
/// **Critical Properties:**
/// - Knows nothing about the sandbox or the drivers
/// - Pure state machine: outcomes in, one status out
/// - The overall status is computed here and nowhere else; the only later
///   change allowed is the approach-validation override applied by the
///   pipeline
///
/// **Precedence (highest first):**
/// `compilation_error` > `runtime_error` > `some_failed` > `all_passed`.
/// The pipeline's override then replaces a `some_failed` or `all_passed`
/// result with `wrong_approach`; compile and runtime errors are never
/// overridden. An empty test-case set is the separate terminal
/// `no_test_cases_found`, never `all_passed`.
use mentor_common::types::{OverallStatus, TestCaseResult, TestCaseStatus};

/// Accumulates outcomes over one submission.
///
/// Hidden test cases contribute counts and feed the same precedence rule;
/// their inputs and outputs are never recorded.
#[derive(Debug, Default)]
pub struct Aggregator {
    visible_results: Vec<TestCaseResult>,
    hidden_tests_total: u32,
    hidden_tests_passed: u32,
    has_compilation_error: bool,
    has_runtime_error: bool,
    any_test_failed: bool,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a visible test case.
    pub fn record_visible(&mut self, result: TestCaseResult) {
        self.note_status(result.status);
        self.visible_results.push(result);
    }

    /// Record the outcome of a hidden test case. Only the status is kept.
    pub fn record_hidden(&mut self, status: TestCaseStatus) {
        self.note_status(status);
        self.hidden_tests_total += 1;
        if status == TestCaseStatus::Pass {
            self.hidden_tests_passed += 1;
        }
    }

    /// Record a visible test case whose driver could not be synthesized.
    /// A logical failure, but not a runtime error: nothing was executed,
    /// so it must not block the approach check or outrank `some_failed`.
    pub fn record_visible_unrunnable(&mut self, result: TestCaseResult) {
        self.any_test_failed = true;
        self.visible_results.push(result);
    }

    /// Hidden counterpart of [`record_visible_unrunnable`].
    ///
    /// [`record_visible_unrunnable`]: Aggregator::record_visible_unrunnable
    pub fn record_hidden_unrunnable(&mut self) {
        self.any_test_failed = true;
        self.hidden_tests_total += 1;
    }

    fn note_status(&mut self, status: TestCaseStatus) {
        match status {
            TestCaseStatus::Pass => {}
            TestCaseStatus::Fail => self.any_test_failed = true,
            TestCaseStatus::Error | TestCaseStatus::Timeout => {
                self.any_test_failed = true;
                self.has_runtime_error = true;
            }
            TestCaseStatus::CompileError => {
                self.any_test_failed = true;
                self.has_compilation_error = true;
            }
        }
    }

    /// A confirmed compile error is identical for every test case of a
    /// submission; no further test cases should be attempted.
    pub fn should_short_circuit(&self) -> bool {
        self.has_compilation_error
    }

    pub fn has_compilation_error(&self) -> bool {
        self.has_compilation_error
    }

    pub fn has_runtime_error(&self) -> bool {
        self.has_runtime_error
    }

    pub fn visible_passed_count(&self) -> usize {
        self.visible_results
            .iter()
            .filter(|r| r.status == TestCaseStatus::Pass)
            .count()
    }

    pub fn visible_total_count(&self) -> usize {
        self.visible_results.len()
    }

    pub fn hidden_tests_total(&self) -> u32 {
        self.hidden_tests_total
    }

    pub fn hidden_tests_passed(&self) -> u32 {
        self.hidden_tests_passed
    }

    /// Compute the overall status under the fixed precedence.
    pub fn overall(&self) -> OverallStatus {
        if self.has_compilation_error {
            OverallStatus::CompilationError
        } else if self.has_runtime_error {
            OverallStatus::RuntimeError
        } else if self.any_test_failed {
            OverallStatus::SomeFailed
        } else {
            OverallStatus::AllPassed
        }
    }

    /// Consume the aggregator, yielding the visible results for the
    /// response body.
    pub fn into_visible_results(self) -> Vec<TestCaseResult> {
        self.visible_results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn visible(id: &str, status: TestCaseStatus) -> TestCaseResult {
        TestCaseResult {
            test_case_id: id.to_string(),
            status,
            input_args: Some(vec![json!(1)]),
            input_arg_names: None,
            actual_output: None,
            expected_output: Some(json!(2)),
            user_stdout: None,
            piston_stdout: None,
            piston_stderr: None,
            error_message: None,
        }
    }

    #[test]
    fn all_passed() {
        let mut agg = Aggregator::new();
        agg.record_visible(visible("1", TestCaseStatus::Pass));
        agg.record_visible(visible("2", TestCaseStatus::Pass));

        assert_eq!(agg.overall(), OverallStatus::AllPassed);
        assert!(!agg.should_short_circuit());
    }

    #[test]
    fn any_failure_reports_some_failed() {
        let mut agg = Aggregator::new();
        agg.record_visible(visible("1", TestCaseStatus::Pass));
        agg.record_visible(visible("2", TestCaseStatus::Fail));

        assert_eq!(agg.overall(), OverallStatus::SomeFailed);
    }

    #[test]
    fn runtime_error_outranks_failures_and_passes() {
        let mut agg = Aggregator::new();
        agg.record_visible(visible("1", TestCaseStatus::Pass));
        agg.record_visible(visible("2", TestCaseStatus::Error));
        agg.record_visible(visible("3", TestCaseStatus::Fail));

        assert_eq!(agg.overall(), OverallStatus::RuntimeError);
    }

    #[test]
    fn compile_error_outranks_everything_and_short_circuits() {
        let mut agg = Aggregator::new();
        agg.record_visible(visible("1", TestCaseStatus::CompileError));

        assert_eq!(agg.overall(), OverallStatus::CompilationError);
        assert!(agg.should_short_circuit());
    }

    #[test]
    fn timeout_counts_as_runtime_error() {
        let mut agg = Aggregator::new();
        agg.record_visible(visible("1", TestCaseStatus::Timeout));

        assert_eq!(agg.overall(), OverallStatus::RuntimeError);
    }

    #[test]
    fn hidden_error_forces_runtime_error_overall() {
        let mut agg = Aggregator::new();
        agg.record_visible(visible("1", TestCaseStatus::Pass));
        agg.record_hidden(TestCaseStatus::Error);

        assert_eq!(agg.overall(), OverallStatus::RuntimeError);
        assert_eq!(agg.hidden_tests_total(), 1);
        assert_eq!(agg.hidden_tests_passed(), 0);
    }

    #[test]
    fn hidden_counts_accumulate_independently() {
        let mut agg = Aggregator::new();
        agg.record_hidden(TestCaseStatus::Pass);
        agg.record_hidden(TestCaseStatus::Pass);
        agg.record_hidden(TestCaseStatus::Fail);

        assert_eq!(agg.hidden_tests_total(), 3);
        assert_eq!(agg.hidden_tests_passed(), 2);
        assert_eq!(agg.overall(), OverallStatus::SomeFailed);
    }

    #[test]
    fn hidden_results_never_appear_in_visible_list() {
        let mut agg = Aggregator::new();
        agg.record_hidden(TestCaseStatus::Fail);
        agg.record_visible(visible("1", TestCaseStatus::Pass));

        let results = agg.into_visible_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].test_case_id, "1");
    }

    #[test]
    fn unrunnable_tests_fail_without_a_runtime_error() {
        let mut agg = Aggregator::new();
        agg.record_visible_unrunnable(visible("1", TestCaseStatus::Error));
        agg.record_hidden_unrunnable();

        assert_eq!(agg.overall(), OverallStatus::SomeFailed);
        assert!(!agg.has_runtime_error());
        assert_eq!(agg.hidden_tests_total(), 1);
        assert_eq!(agg.hidden_tests_passed(), 0);
    }

    #[test]
    fn visible_pass_counts() {
        let mut agg = Aggregator::new();
        agg.record_visible(visible("1", TestCaseStatus::Pass));
        agg.record_visible(visible("2", TestCaseStatus::Fail));
        agg.record_visible(visible("3", TestCaseStatus::Pass));

        assert_eq!(agg.visible_passed_count(), 2);
        assert_eq!(agg.visible_total_count(), 3);
    }
}
