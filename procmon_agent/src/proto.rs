//! Request frame decoding.
//!
//! A frame is whatever one read returned. It is not parsed as JSON; two keys
//! are looked up independently by substring scan:
//!
//! ```text
//! operation := "request_type" WS* ':' WS* '"' LABEL '"'
//! target    := "PID" WS* ':' WS* ['+' | '-'] DIGIT+
//! ```
//!
//! Only the first occurrence of each key is considered. Anything between,
//! around or inside other fields is ignored, so reordered or extra fields are
//! fine and malformed nesting goes unnoticed.

pub const MSG_GET_PROCESSES: &str = "GetProcesses";
pub const MSG_GET_SIMPLE_DETAILS: &str = "GetSimpleProcessDetails";
pub const MSG_GET_DETAILED_DETAILS: &str = "GetDetailedProcessDetails";
pub const MSG_SUSPEND_PROCESS: &str = "SuspendProcess";

const OPERATION_KEY: &[u8] = b"\"request_type\"";
const TARGET_KEY: &[u8] = b"\"PID\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListProcesses,
    SimpleDetails,
    DetailedDetails,
    Suspend,
    Unknown,
}

impl Operation {
    pub fn from_label(label: &[u8]) -> Self {
        match label {
            l if l == MSG_GET_PROCESSES.as_bytes() => Operation::ListProcesses,
            l if l == MSG_GET_SIMPLE_DETAILS.as_bytes() => Operation::SimpleDetails,
            l if l == MSG_GET_DETAILED_DETAILS.as_bytes() => Operation::DetailedDetails,
            l if l == MSG_SUSPEND_PROCESS.as_bytes() => Operation::Suspend,
            _ => Operation::Unknown,
        }
    }

    /// Wire label echoed back in the `request_type` field of a response.
    pub fn label(self) -> Option<&'static str> {
        match self {
            Operation::ListProcesses => Some(MSG_GET_PROCESSES),
            Operation::SimpleDetails => Some(MSG_GET_SIMPLE_DETAILS),
            Operation::DetailedDetails => Some(MSG_GET_DETAILED_DETAILS),
            Operation::Suspend => Some(MSG_SUSPEND_PROCESS),
            Operation::Unknown => None,
        }
    }

    pub fn needs_target(self) -> bool {
        !matches!(self, Operation::ListProcesses | Operation::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub operation: Operation,
    pub target: Option<u32>,
}

pub fn decode_request(frame: &[u8]) -> Request {
    let operation = value_after_key(frame, OPERATION_KEY)
        .and_then(quoted)
        .map(Operation::from_label)
        .unwrap_or(Operation::Unknown);
    let target = value_after_key(frame, TARGET_KEY).and_then(integer);
    Request { operation, target }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// Bytes following `key`, its colon and surrounding whitespace.
fn value_after_key<'a>(frame: &'a [u8], key: &[u8]) -> Option<&'a [u8]> {
    let rest = &frame[find(frame, key)? + key.len()..];
    let rest = rest.trim_ascii_start();
    let rest = rest.strip_prefix(b":")?;
    Some(rest.trim_ascii_start())
}

fn quoted(value: &[u8]) -> Option<&[u8]> {
    let body = value.strip_prefix(b"\"")?;
    let end = body.iter().position(|&b| b == b'"')?;
    Some(&body[..end])
}

// Negative and out-of-range ids are treated as no target at all.
fn integer(value: &[u8]) -> Option<u32> {
    let (negative, digits) = match value.first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let len = digits.iter().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 || negative {
        return None;
    }
    std::str::from_utf8(&digits[..len]).ok()?.parse().ok()
}
