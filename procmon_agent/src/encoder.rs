//! Bounded response encoding.
//!
//! Responses are JSON-shaped text written into a buffer of fixed capacity.
//! Every field and array element is committed whole or not at all, and the
//! bytes needed to close every open object/array are reserved up front, so a
//! response that runs out of room is shorter but always balanced.
//!
//! Values go through `serde_json` with [`WireFormatter`]: strings escape only
//! `"`, `\` and newline, every other byte is copied through, and floats are
//! written with two decimals.

use std::io;

use serde::Serialize;
use serde_json::ser::{CharEscape, Formatter, Serializer};
use tracing::debug;

/// A fully encoded reply, never longer than the encoder capacity it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response(String);

impl Response {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Compact JSON with the agent's narrow escaping and fixed two-decimal floats.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireFormatter;

impl Formatter for WireFormatter {
    fn write_f32<W: ?Sized + io::Write>(&mut self, writer: &mut W, value: f32) -> io::Result<()> {
        self.write_f64(writer, f64::from(value))
    }

    fn write_f64<W: ?Sized + io::Write>(&mut self, writer: &mut W, value: f64) -> io::Result<()> {
        write!(writer, "{value:.2}")
    }

    fn write_char_escape<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        char_escape: CharEscape,
    ) -> io::Result<()> {
        let raw: &[u8] = match char_escape {
            CharEscape::Quote => b"\\\"",
            CharEscape::ReverseSolidus => b"\\\\",
            CharEscape::LineFeed => b"\\n",
            CharEscape::Solidus => b"/",
            CharEscape::Backspace => b"\x08",
            CharEscape::FormFeed => b"\x0c",
            CharEscape::CarriageReturn => b"\r",
            CharEscape::Tab => b"\t",
            CharEscape::AsciiControl(byte) => return writer.write_all(&[byte]),
        };
        writer.write_all(raw)
    }
}

/// Serialize `value` onto `out` in wire format.
pub fn render<T: Serialize + ?Sized>(out: &mut Vec<u8>, value: &T) -> serde_json::Result<()> {
    let mut ser = Serializer::with_formatter(out, WireFormatter);
    value.serialize(&mut ser)
}

fn write_member<T: Serialize + ?Sized>(
    out: &mut Vec<u8>,
    key: Option<&str>,
    value: Option<&T>,
) -> serde_json::Result<()> {
    if let Some(key) = key {
        render(out, key)?;
        out.push(b':');
    }
    if let Some(value) = value {
        render(out, value)?;
    }
    Ok(())
}

struct Scope {
    closer: u8,
    empty: bool,
    // An array stops accepting elements after the first one that did not fit.
    clipped: bool,
}

pub struct ResponseEncoder {
    out: Vec<u8>,
    capacity: usize,
    scopes: Vec<Scope>,
    truncated: bool,
    scratch: Vec<u8>,
}

impl ResponseEncoder {
    /// Starts the top-level object. `capacity` must leave room for at least `{}`.
    pub fn new(capacity: usize) -> Self {
        let mut enc = Self {
            out: Vec::with_capacity(capacity.min(64 * 1024)),
            capacity,
            scopes: Vec::new(),
            truncated: false,
            scratch: Vec::new(),
        };
        if capacity >= 2 {
            enc.out.push(b'{');
            enc.scopes.push(Scope {
                closer: b'}',
                empty: true,
                clipped: false,
            });
        } else {
            enc.truncated = true;
        }
        enc
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once anything was dropped for lack of room.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn reserved(&self) -> usize {
        // skipped arrays owe nothing
        self.scopes.iter().filter(|s| s.closer != 0).count()
    }

    fn fits(&self, extra: usize, new_closers: usize) -> bool {
        self.out.len() + extra + self.reserved() + new_closers <= self.capacity
    }

    // Serialize `"key":` and/or `value` into scratch.
    fn stage<T: Serialize + ?Sized>(&mut self, key: Option<&str>, value: Option<&T>) -> bool {
        self.scratch.clear();
        if let Err(e) = write_member(&mut self.scratch, key, value) {
            debug!("value skipped: {e}");
            self.truncated = true;
            return false;
        }
        true
    }

    // Commit `scratch` (with a leading comma when needed) if it fits.
    fn commit(&mut self, new_closer: Option<u8>) -> bool {
        let Some(scope) = self.scopes.last() else {
            self.truncated = true;
            return false;
        };
        if scope.clipped {
            self.truncated = true;
            return false;
        }
        let comma = usize::from(!scope.empty);
        if !self.fits(comma + self.scratch.len(), usize::from(new_closer.is_some())) {
            self.truncated = true;
            if let Some(scope) = self.scopes.last_mut() {
                if scope.closer == b']' {
                    scope.clipped = true;
                }
            }
            return false;
        }
        if comma == 1 {
            self.out.push(b',');
        }
        self.out.extend_from_slice(&self.scratch);
        if let Some(scope) = self.scopes.last_mut() {
            scope.empty = false;
        }
        if let Some(closer) = new_closer {
            self.scopes.push(Scope {
                closer,
                empty: true,
                clipped: false,
            });
        }
        true
    }

    /// Adds `"key":value` to the current object.
    pub fn field(&mut self, key: &str, value: impl Serialize) -> bool {
        self.stage(Some(key), Some(&value)) && self.commit(None)
    }

    /// Opens `"key":[` in the current object. Returns false if it did not fit,
    /// in which case elements pushed before the matching `close` are dropped.
    pub fn begin_array(&mut self, key: &str) -> bool {
        let opened = self.stage::<()>(Some(key), None) && {
            self.scratch.push(b'[');
            self.commit(Some(b']'))
        };
        if !opened {
            // keep nesting consistent for the caller's matching close()
            self.scopes.push(Scope {
                closer: 0,
                empty: true,
                clipped: true,
            });
        }
        opened
    }

    /// Appends one array element.
    pub fn element(&mut self, value: impl Serialize) -> bool {
        self.stage(None, Some(&value)) && self.commit(None)
    }

    /// Closes the innermost open array.
    pub fn close(&mut self) {
        if self.scopes.len() <= 1 {
            return;
        }
        if let Some(scope) = self.scopes.pop() {
            if scope.closer != 0 {
                self.out.push(scope.closer);
            }
        }
    }

    /// Closes everything still open and returns the text.
    pub fn finish(mut self) -> Response {
        while let Some(scope) = self.scopes.pop() {
            if scope.closer != 0 {
                self.out.push(scope.closer);
            }
        }
        // only whole UTF-8 values are ever committed
        let text = String::from_utf8(self.out)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
        Response(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Entry {
        cpu_usage: f64,
        timestamp: i64,
    }

    fn balanced(s: &str) -> bool {
        let mut depth: i32 = 0;
        let mut in_str = false;
        let mut escaped = false;
        for c in s.chars() {
            if in_str {
                match (escaped, c) {
                    (true, _) => escaped = false,
                    (false, '\\') => escaped = true,
                    (false, '"') => in_str = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => in_str = true,
                '{' | '[' => depth += 1,
                '}' | ']' => {
                    depth -= 1;
                    if depth < 0 {
                        return false;
                    }
                }
                _ => {}
            }
        }
        depth == 0 && !in_str
    }

    #[test]
    fn writes_fields_in_order() {
        let mut enc = ResponseEncoder::new(256);
        enc.field("request_type", "SuspendProcess");
        enc.field("pid", 42u32);
        enc.field("success", false);
        let resp = enc.finish();
        assert_eq!(
            resp.as_str(),
            r#"{"request_type":"SuspendProcess","pid":42,"success":false}"#
        );
    }

    #[test]
    fn escapes_only_quote_backslash_and_newline() {
        let mut enc = ResponseEncoder::new(256);
        enc.field("name", "a\"b\\c\nd\te\u{e9}");
        assert_eq!(enc.finish().as_str(), "{\"name\":\"a\\\"b\\\\c\\nd\te\u{e9}\"}");
    }

    #[test]
    fn floats_have_two_decimals() {
        let mut enc = ResponseEncoder::new(64);
        enc.field("cpu_usage", 12.3456f64);
        enc.field("load", 3.0f32);
        assert_eq!(enc.finish().as_str(), r#"{"cpu_usage":12.35,"load":3.00}"#);
    }

    #[test]
    fn control_bytes_pass_through_raw() {
        let mut out = Vec::new();
        render(&mut out, "tab\tcr\rbell\u{7}").unwrap();
        assert_eq!(out, b"\"tab\tcr\rbell\x07\"");
    }

    #[test]
    fn arrays_and_nested_objects() {
        let mut enc = ResponseEncoder::new(256);
        enc.field("pid", 7u32);
        enc.begin_array("entries");
        enc.element(Entry {
            cpu_usage: 0.5,
            timestamp: 10,
        });
        enc.element(Entry {
            cpu_usage: 1.0,
            timestamp: 11,
        });
        enc.close();
        let out = enc.finish();
        assert_eq!(
            out.as_str(),
            r#"{"pid":7,"entries":[{"cpu_usage":0.50,"timestamp":10},{"cpu_usage":1.00,"timestamp":11}]}"#
        );
        let v: serde_json::Value = serde_json::from_str(out.as_str()).unwrap();
        assert_eq!(v["entries"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn empty_array() {
        let mut enc = ResponseEncoder::new(64);
        enc.begin_array("pids");
        enc.close();
        assert_eq!(enc.finish().as_str(), r#"{"pids":[]}"#);
    }

    #[test]
    fn overflowing_array_is_clipped_but_balanced() {
        let cap = 64;
        let mut enc = ResponseEncoder::new(cap);
        enc.field("request_type", "GetProcesses");
        enc.begin_array("pids");
        let mut accepted = 0;
        for pid in 1000u32..1100 {
            if enc.element(pid) {
                accepted += 1;
            }
        }
        enc.close();
        assert!(enc.truncated());
        let out = enc.finish();
        assert!(out.len() <= cap, "{} > {cap}", out.len());
        assert!(balanced(out.as_str()), "{}", out.as_str());

        let v: serde_json::Value = serde_json::from_str(out.as_str()).unwrap();
        let pids = v["pids"].as_array().unwrap();
        assert_eq!(pids.len(), accepted);
        assert!(accepted > 0 && accepted < 100);
        // clipped arrays keep a prefix of the data
        assert_eq!(pids[0], 1000);
    }

    #[test]
    fn clipped_array_accepts_nothing_after_first_miss() {
        // exactly room for `{"a":[1234567]}`
        let mut enc = ResponseEncoder::new(15);
        enc.begin_array("a");
        assert!(enc.element(1234567u32));
        assert!(!enc.element(8901234u32));
        assert!(!enc.element(1u32));
        enc.close();
        assert_eq!(enc.finish().as_str(), r#"{"a":[1234567]}"#);
    }

    #[test]
    fn field_after_clipped_array_still_lands_if_it_fits() {
        let mut enc = ResponseEncoder::new(24);
        enc.begin_array("a");
        for i in 0..50u32 {
            enc.element(i);
        }
        enc.close();
        enc.field("z", 1u32);
        let out = enc.finish();
        assert!(out.len() <= 24);
        assert!(balanced(out.as_str()));
    }

    #[test]
    fn array_that_cannot_open_is_skipped() {
        let mut enc = ResponseEncoder::new(8);
        assert!(!enc.begin_array("entries"));
        assert!(!enc.element(1u32));
        enc.close();
        enc.field("p", 1u32);
        assert_eq!(enc.finish().as_str(), r#"{"p":1}"#);
    }

    #[test]
    fn tiny_capacity_never_overflows() {
        for cap in 0..40 {
            let mut enc = ResponseEncoder::new(cap);
            enc.field("request_type", "GetDetailedProcessDetails");
            enc.field("pid", 9u32);
            enc.begin_array("entries");
            enc.element(Entry {
                cpu_usage: 1.0,
                timestamp: 1,
            });
            enc.close();
            let out = enc.finish();
            assert!(out.len() <= cap, "cap {cap}: {}", out.as_str());
            assert!(balanced(out.as_str()), "cap {cap}: {}", out.as_str());
        }
    }
}
