/// Output Parser - Demultiplexing Framed Driver Output
///
/// Counterpart of the harness framing in `driver.rs`: locate the last
/// `\x1E<len>\n<payload>` frame on the sandbox stdout and split it into the
/// function's return value and the captured user output.
///
/// Anything before the frame is stray program output and stays in the raw
/// sandbox stdout. On any malformation the whole trimmed stdout is treated
/// as a raw-string return value; that almost certainly mismatches a
/// structured expected output, which is the intent - a garbled frame
/// reports `fail`, it never crashes the pipeline.
use serde::Deserialize;
use serde_json::Value;

/// ASCII record separator; not producible by ordinary print output.
pub const FRAME_MARKER: u8 = 0x1E;

/// The split driver output.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverOutput {
    pub return_value: Value,
    pub user_stdout: String,
}

#[derive(Debug, Deserialize)]
struct FramePayload {
    return_value: Value,
    #[serde(default)]
    user_stdout: String,
}

/// Parse the sandbox stdout into return value and user output.
pub fn parse_driver_output(stdout: &str) -> DriverOutput {
    match extract_frame(stdout.as_bytes()) {
        Some(payload) => DriverOutput {
            return_value: payload.return_value,
            user_stdout: payload.user_stdout,
        },
        None => {
            // No usable frame: fall back to the whole output as the return
            // value, structured if it happens to parse, raw string if not.
            let trimmed = stdout.trim();
            let return_value = serde_json::from_str(trimmed)
                .unwrap_or_else(|_| Value::String(trimmed.to_string()));
            DriverOutput {
                return_value,
                user_stdout: String::new(),
            }
        }
    }
}

/// Locate and decode the last length-prefixed frame, if any.
///
/// The length prefix is validated against the remaining bytes; a marker
/// byte that user output smuggled in fails the length check and is
/// ignored.
fn extract_frame(bytes: &[u8]) -> Option<FramePayload> {
    let marker_pos = bytes.iter().rposition(|&b| b == FRAME_MARKER)?;
    let rest = &bytes[marker_pos + 1..];

    let newline_pos = rest.iter().position(|&b| b == b'\n')?;
    let len: usize = std::str::from_utf8(&rest[..newline_pos]).ok()?.parse().ok()?;

    let payload_start = newline_pos + 1;
    let payload_end = payload_start.checked_add(len)?;
    if payload_end > rest.len() {
        return None;
    }

    // Only trailing whitespace may follow the payload.
    if rest[payload_end..].iter().any(|b| !b.is_ascii_whitespace()) {
        return None;
    }

    serde_json::from_slice(&rest[payload_start..payload_end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(payload: &str) -> String {
        format!("\x1e{}\n{}", payload.len(), payload)
    }

    #[test]
    fn parses_well_formed_frame() {
        let stdout = frame(r#"{"return_value":[0,1],"user_stdout":"debug\n"}"#);
        let output = parse_driver_output(&stdout);

        assert_eq!(output.return_value, json!([0, 1]));
        assert_eq!(output.user_stdout, "debug\n");
    }

    #[test]
    fn stray_output_before_frame_is_ignored() {
        let stdout = format!(
            "warning: something\n{}",
            frame(r#"{"return_value":42,"user_stdout":""}"#)
        );
        let output = parse_driver_output(&stdout);

        assert_eq!(output.return_value, json!(42));
    }

    #[test]
    fn user_output_containing_marker_does_not_confuse_parsing() {
        // A marker byte inside the serialized user_stdout is escaped by
        // JSON, but a raw one printed before the frame must not match.
        let stdout = format!(
            "junk \x1e not a frame\n{}",
            frame(r#"{"return_value":"ok","user_stdout":""}"#)
        );
        let output = parse_driver_output(&stdout);

        assert_eq!(output.return_value, json!("ok"));
    }

    #[test]
    fn multiline_return_payload() {
        let stdout = frame(r#"{"return_value":"line1\nline2","user_stdout":"a\nb"}"#);
        let output = parse_driver_output(&stdout);

        assert_eq!(output.return_value, json!("line1\nline2"));
        assert_eq!(output.user_stdout, "a\nb");
    }

    #[test]
    fn missing_frame_falls_back_to_json_parse() {
        let output = parse_driver_output("[1, 2, 3]\n");
        assert_eq!(output.return_value, json!([1, 2, 3]));
        assert_eq!(output.user_stdout, "");
    }

    #[test]
    fn missing_frame_falls_back_to_raw_string() {
        let output = parse_driver_output("not json at all\n");
        assert_eq!(output.return_value, json!("not json at all"));
    }

    #[test]
    fn truncated_frame_falls_back() {
        // Length prefix claims more bytes than remain.
        let output = parse_driver_output("\x1e500\n{\"return_value\":1}");
        assert_eq!(output.return_value, json!("\x1e500\n{\"return_value\":1}"));
    }

    #[test]
    fn trailing_newline_after_frame_is_tolerated() {
        let stdout = format!("{}\n", frame(r#"{"return_value":null,"user_stdout":""}"#));
        let output = parse_driver_output(&stdout);
        assert_eq!(output.return_value, Value::Null);
    }

    #[test]
    fn empty_stdout_is_empty_string_value() {
        let output = parse_driver_output("");
        assert_eq!(output.return_value, json!(""));
    }
}
