/// Driver Synthesizer - Wrapping User Code Into an Executable Harness
///
/// **Core Responsibility:**
/// Turn raw user source into a complete program that calls the entry
/// function with concrete arguments and reports the result.
///
/// **Critical Properties:**
/// - User code is embedded unmodified
/// - The function's return value and the user's own print/console output
///   travel in one framed stdout payload (see below)
/// - Exceptions inside user code go to stderr with a non-zero exit, so a
///   crash is distinguishable from a wrong answer
///
/// **Output framing:**
/// The harness emits, as the last thing on stdout,
/// `\x1E<payload-byte-len>\n<payload>` where payload is the JSON object
/// `{"return_value": ..., "user_stdout": "..."}`. The ASCII record
/// separator plus the length prefix keeps the frame parseable even when
/// user output spans lines or itself contains the marker byte.
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Language \"{0}\" driver not implemented.")]
    Unsupported(String),
    #[error("failed to serialize arguments: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Synthesize a driver program for the given language.
///
/// Fails closed: languages without a harness variant return
/// `DriverError::Unsupported` so the pipeline can report an explicit
/// "driver not implemented" outcome instead of empty output.
pub fn synthesize(
    language: &str,
    user_code: &str,
    function_name: &str,
    args: &[Value],
) -> Result<String, DriverError> {
    match language.to_lowercase().as_str() {
        "python" => python_driver(user_code, function_name, args),
        "javascript" => javascript_driver(user_code, function_name, args),
        other => Err(DriverError::Unsupported(other.to_string())),
    }
}

fn python_driver(
    user_code: &str,
    function_name: &str,
    args: &[Value],
) -> Result<String, DriverError> {
    // Double-encoding produces a quoted, escaped string literal that is
    // valid Python source; json.loads turns it back into native values, so
    // true/false/null never leak into Python syntax.
    let args_json = serde_json::to_string(args)?;
    let args_literal = serde_json::to_string(&args_json)?;

    Ok(format!(
        r#"import sys
import json
import io

{user_code}

_original_stdout = sys.stdout
_capture = io.StringIO()

try:
    sys.stdout = _capture
    _args = json.loads({args_literal})
    _result = {function_name}(*_args)
    sys.stdout = _original_stdout
    _payload = json.dumps({{"return_value": _result, "user_stdout": _capture.getvalue()}})
    sys.stdout.write("\x1e" + str(len(_payload.encode("utf-8"))) + "\n" + _payload)
except Exception as _e:
    sys.stdout = _original_stdout
    print(str(_e), file=sys.stderr)
    sys.exit(1)
finally:
    sys.stdout = _original_stdout
"#
    ))
}

fn javascript_driver(
    user_code: &str,
    function_name: &str,
    args: &[Value],
) -> Result<String, DriverError> {
    // JSON is a subset of JavaScript expression syntax; the argument array
    // can be spliced in directly.
    let args_json = serde_json::to_string(args)?;

    Ok(format!(
        r#"{user_code}

const _originalLog = console.log;
let _userLogs = [];

try {{
    console.log = function (...args) {{
        _userLogs.push(args.map((a) => (typeof a === "object" ? JSON.stringify(a) : String(a))).join(" "));
    }};
    const _args = {args_json};
    const _result = {function_name}(..._args);
    console.log = _originalLog;
    const _payload = JSON.stringify({{
        return_value: _result === undefined ? null : _result,
        user_stdout: _userLogs.join("\n"),
    }});
    process.stdout.write("\x1e" + Buffer.byteLength(_payload, "utf8") + "\n" + _payload);
}} catch (e) {{
    console.log = _originalLog;
    console.error(e && e.toString ? e.toString() : String(e));
    process.exit(1);
}} finally {{
    console.log = _originalLog;
}}
"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn python_driver_embeds_user_code_and_call() {
        let source = synthesize(
            "python",
            "def solution(nums, target):\n    return [0, 1]",
            "solution",
            &[json!([2, 7, 11, 15]), json!(9)],
        )
        .unwrap();

        assert!(source.contains("def solution(nums, target):"));
        assert!(source.contains("_result = solution(*_args)"));
        assert!(source.contains(r#"json.loads("[[2,7,11,15],9]")"#));
        assert!(source.contains("\\x1e"));
    }

    #[test]
    fn python_driver_escapes_string_arguments() {
        let source = synthesize("python", "def f(s): return s", "f", &[json!("a \"b\" c")]).unwrap();

        // The inner quotes survive two rounds of JSON escaping.
        assert!(source.contains(r#"json.loads("[\"a \\\"b\\\" c\"]")"#));
    }

    #[test]
    fn javascript_driver_splices_args_inline() {
        let source = synthesize(
            "javascript",
            "function solution(a, b) { return a + b; }",
            "solution",
            &[json!(2), json!(3)],
        )
        .unwrap();

        assert!(source.contains("function solution(a, b)"));
        assert!(source.contains("const _args = [2,3];"));
        assert!(source.contains("solution(..._args)"));
    }

    #[test]
    fn language_is_matched_case_insensitively() {
        assert!(synthesize("Python", "def solution(): pass", "solution", &[]).is_ok());
        assert!(synthesize("JavaScript", "function solution() {}", "solution", &[]).is_ok());
    }

    #[test]
    fn unsupported_language_fails_closed() {
        let err = synthesize("cobol", "DISPLAY 'HI'.", "solution", &[]).unwrap_err();
        match err {
            DriverError::Unsupported(lang) => assert_eq!(lang, "cobol"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn custom_entry_function_name() {
        let source =
            synthesize("python", "def two_sum(n, t): return []", "two_sum", &[json!([1])]).unwrap();
        assert!(source.contains("two_sum(*_args)"));
    }
}
