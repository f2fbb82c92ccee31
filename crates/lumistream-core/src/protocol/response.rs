//! Response classification
//!
//! Parses each line of controller output into one of a fixed set of
//! categories. The check order mirrors the firmware's output conventions:
//! idle markers first, then `;` telemetry, then line-scoped responses, bare
//! errors, and resend requests. Telemetry dispatch is an ordered list of
//! (prefix, parser) pairs over a closed set of formats.

/// Parsed view of one line of controller output
///
/// Transient; consumed immediately by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Line acknowledged: `N<line>: OK`
    Ack {
        /// Acknowledged line number
        line: u64,
    },
    /// Line-scoped error: `N<line>: E<code>: <msg>`
    LineError {
        /// Line the error refers to
        line: u64,
        /// Firmware error code
        code: u16,
        /// Human-readable message
        message: String,
    },
    /// Error with no line context: `E<code>: <msg>`
    BareError {
        /// Firmware error code
        code: u16,
        /// Human-readable message
        message: String,
    },
    /// Resend request: `RS <line>`
    Resend {
        /// First line the controller wants replayed
        line: u64,
    },
    /// A `;` telemetry/log line
    Telemetry(Telemetry),
    /// Controller reports no pending work
    Idle,
    /// Anything else; logged and ignored
    Unrecognized {
        /// The raw line as received
        raw: String,
    },
}

/// Known telemetry sub-formats emitted behind the `;` prefix
#[derive(Debug, Clone, PartialEq)]
pub enum Telemetry {
    /// `;LOO:` loop rate report: frames per second and queue occupancy
    LoopRate {
        /// Reported frames per second, if present
        fps: Option<f32>,
        /// Command queue occupancy as (occupied, capacity), if present
        queue: Option<(u32, u32)>,
    },
    /// `;TIM:` loop timing report: named phase durations in microseconds
    LoopTiming {
        /// (phase name, microseconds) pairs in reported order
        phases: Vec<(String, u64)>,
    },
    /// `;GET:` counters from the firmware's fetch stage
    GetCounters {
        /// (counter name, value) pairs in reported order
        fields: Vec<(String, u64)>,
    },
    /// `;PRO:` counters from the firmware's processing stage
    ProcessCounters {
        /// (counter name, value) pairs in reported order
        fields: Vec<(String, u64)>,
    },
    /// `;SET:` echo of a setting change, kept opaque
    SetEcho {
        /// Echoed text after the prefix
        raw: String,
    },
    /// Any other `;` line; swallowed
    Other {
        /// The raw line as received
        raw: String,
    },
}

/// Classify one line of controller output
pub fn classify(line: &str) -> Response {
    let line = line.trim_end_matches(['\r', '\n']);

    if line.starts_with("IDLE") {
        return Response::Idle;
    }
    if let Some(rest) = line.strip_prefix(';') {
        return Response::Telemetry(parse_telemetry(rest, line));
    }
    if let Some(rest) = line.strip_prefix('N') {
        return parse_line_scoped(rest, line);
    }
    if let Some(rest) = line.strip_prefix('E') {
        if let Some((code, message)) = parse_error_body(rest) {
            return Response::BareError { code, message };
        }
    }
    if let Some(rest) = line.strip_prefix("RS") {
        if let Ok(num) = rest.trim().parse::<u64>() {
            return Response::Resend { line: num };
        }
    }
    Response::Unrecognized {
        raw: line.to_string(),
    }
}

/// Parse the body after a leading `N`
fn parse_line_scoped(rest: &str, raw: &str) -> Response {
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let Ok(line) = rest[..digits_end].parse::<u64>() else {
        return Response::Unrecognized {
            raw: raw.to_string(),
        };
    };
    let Some(tail) = rest[digits_end..].strip_prefix(':') else {
        return Response::Unrecognized {
            raw: raw.to_string(),
        };
    };
    let tail = tail.trim_start();
    if tail.starts_with("OK") {
        return Response::Ack { line };
    }
    if let Some(err_body) = tail.strip_prefix('E') {
        if let Some((code, message)) = parse_error_body(err_body) {
            return Response::LineError {
                line,
                code,
                message,
            };
        }
    }
    Response::Unrecognized {
        raw: raw.to_string(),
    }
}

/// Parse `<code>: <msg>` after a leading `E`
fn parse_error_body(rest: &str) -> Option<(u16, String)> {
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let code = rest[..digits_end].parse::<u16>().ok()?;
    let message = rest[digits_end..]
        .strip_prefix(':')
        .map(|m| m.trim().to_string())
        .unwrap_or_default();
    Some((code, message))
}

/// Telemetry dispatch: first matching prefix wins
fn parse_telemetry(rest: &str, raw: &str) -> Telemetry {
    if let Some(body) = rest.strip_prefix("LOO:") {
        return parse_loop_rate(body);
    }
    if let Some(body) = rest.strip_prefix("TIM:") {
        return Telemetry::LoopTiming {
            phases: parse_micros_pairs(body),
        };
    }
    if let Some(body) = rest.strip_prefix("GET:") {
        return Telemetry::GetCounters {
            fields: parse_counter_pairs(body),
        };
    }
    if let Some(body) = rest.strip_prefix("PRO:") {
        return Telemetry::ProcessCounters {
            fields: parse_counter_pairs(body),
        };
    }
    if let Some(body) = rest.strip_prefix("SET:") {
        return Telemetry::SetEcho {
            raw: body.trim().to_string(),
        };
    }
    Telemetry::Other {
        raw: raw.to_string(),
    }
}

/// Parse a `;LOO:` body such as `FPS: 31.2 QUEUE: 3/8`
fn parse_loop_rate(body: &str) -> Telemetry {
    let mut fps = None;
    let mut queue = None;
    let mut tokens = body.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        match token {
            "FPS:" => {
                fps = tokens.peek().and_then(|v| v.parse::<f32>().ok());
            }
            "QUEUE:" => {
                queue = tokens.peek().and_then(|v| {
                    let (occ, max) = v.split_once('/')?;
                    Some((occ.parse().ok()?, max.parse().ok()?))
                });
            }
            _ => {}
        }
    }
    Telemetry::LoopRate { fps, queue }
}

/// Parse `NAME: <n>us` pairs from a `;TIM:` body
fn parse_micros_pairs(body: &str) -> Vec<(String, u64)> {
    let mut phases = Vec::new();
    let mut tokens = body.split_whitespace();
    while let Some(token) = tokens.next() {
        if let Some(name) = token.strip_suffix(':') {
            if let Some(value) = tokens.next() {
                if let Ok(us) = value.trim_end_matches("us").parse::<u64>() {
                    phases.push((name.to_string(), us));
                }
            }
        }
    }
    phases
}

/// Parse `NAME: <n>` pairs from a counter body
fn parse_counter_pairs(body: &str) -> Vec<(String, u64)> {
    let mut fields = Vec::new();
    let mut tokens = body.split_whitespace();
    while let Some(token) = tokens.next() {
        if let Some(name) = token.strip_suffix(':') {
            if let Some(value) = tokens.next() {
                if let Ok(n) = value.parse::<u64>() {
                    fields.push((name.to_string(), n));
                }
            }
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_idle() {
        assert_eq!(classify("IDLE"), Response::Idle);
        assert_eq!(classify("IDLE 0\r\n"), Response::Idle);
    }

    #[test]
    fn test_ack() {
        assert_eq!(classify("N13: OK"), Response::Ack { line: 13 });
        assert_eq!(classify("N0: OK\n"), Response::Ack { line: 0 });
    }

    #[test]
    fn test_line_error() {
        assert_eq!(
            classify("N7: E12: panel index out of range"),
            Response::LineError {
                line: 7,
                code: 12,
                message: "panel index out of range".to_string(),
            }
        );
    }

    #[test]
    fn test_bare_error() {
        assert_eq!(
            classify("E21: checksum mismatch"),
            Response::BareError {
                code: 21,
                message: "checksum mismatch".to_string(),
            }
        );
    }

    #[test]
    fn test_resend() {
        assert_eq!(classify("RS 42"), Response::Resend { line: 42 });
    }

    #[test]
    fn test_loop_rate_telemetry() {
        assert_eq!(
            classify(";LOO: FPS: 31.5 QUEUE: 3/8"),
            Response::Telemetry(Telemetry::LoopRate {
                fps: Some(31.5),
                queue: Some((3, 8)),
            })
        );
    }

    #[test]
    fn test_loop_timing_telemetry() {
        assert_eq!(
            classify(";TIM: GET: 120us PROC: 80us SHOW: 441us"),
            Response::Telemetry(Telemetry::LoopTiming {
                phases: vec![
                    ("GET".to_string(), 120),
                    ("PROC".to_string(), 80),
                    ("SHOW".to_string(), 441),
                ],
            })
        );
    }

    #[test]
    fn test_stage_counters() {
        assert_eq!(
            classify(";GET: CMDS: 120 BYTES: 4096"),
            Response::Telemetry(Telemetry::GetCounters {
                fields: vec![("CMDS".to_string(), 120), ("BYTES".to_string(), 4096)],
            })
        );
        assert_eq!(
            classify(";PRO: CMDS: 118 ERRS: 0"),
            Response::Telemetry(Telemetry::ProcessCounters {
                fields: vec![("CMDS".to_string(), 118), ("ERRS".to_string(), 0)],
            })
        );
    }

    #[test]
    fn test_set_echo() {
        assert_eq!(
            classify(";SET: brightness 128"),
            Response::Telemetry(Telemetry::SetEcho {
                raw: "brightness 128".to_string(),
            })
        );
    }

    #[test]
    fn test_unknown_telemetry_swallowed() {
        assert_eq!(
            classify(";DBG: something else"),
            Response::Telemetry(Telemetry::Other {
                raw: ";DBG: something else".to_string(),
            })
        );
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(
            classify("hello world"),
            Response::Unrecognized {
                raw: "hello world".to_string(),
            }
        );
        // N-prefixed but not ack or error shaped
        assert_eq!(
            classify("N5: MAYBE"),
            Response::Unrecognized {
                raw: "N5: MAYBE".to_string(),
            }
        );
        // malformed resend
        assert_eq!(
            classify("RS soon"),
            Response::Unrecognized {
                raw: "RS soon".to_string(),
            }
        );
    }
}
