//! Directive extraction and execution for model output.
//!
//! The model acts by embedding bracketed directives in its free text:
//! `[NAME]`, `[NAME: k1=v1, k2=v2]`, or the canned-reply form `[INDEX=N]`.
//! Parsing produces typed [`ParsedDirective`] values; execution replaces
//! each span with the handler's natural-language result. Whatever the
//! model wrote, no raw bracket syntax ever reaches the person chatting —
//! unknown or malformed directives collapse to an empty replacement.

mod exec;
mod handlers;

#[cfg(test)]
mod tests;

pub use exec::{DirectiveExecutor, ExecutedReply, ExecutionContext};

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

pub const ABORT_BOOKING: &str = "ABORT_BOOKING";
pub const CHECK_AVAILABILITY: &str = "CHECK_AVAILABILITY";
pub const LIST_APPOINTMENTS: &str = "LIST_APPOINTMENTS";
pub const CANCEL_APPOINTMENT: &str = "CANCEL_APPOINTMENT";
pub const BOOK_APPOINTMENT: &str = "BOOK_APPOINTMENT";

/// What a directive asks the system to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveKind {
    AbortBooking,
    CheckAvailability,
    ListAppointments,
    CancelAppointment,
    BookAppointment,
    /// `[INDEX=N]` canned-reply lookup.
    Canned(u32),
    /// Syntactically valid but not in the vocabulary. Executes to an
    /// empty replacement.
    Unknown(String),
}

impl DirectiveKind {
    fn from_name(name: &str) -> Self {
        match name {
            ABORT_BOOKING => Self::AbortBooking,
            CHECK_AVAILABILITY => Self::CheckAvailability,
            LIST_APPOINTMENTS => Self::ListAppointments,
            CANCEL_APPOINTMENT => Self::CancelAppointment,
            BOOK_APPOINTMENT => Self::BookAppointment,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// One directive extracted from model output.
///
/// `span` is the byte range of the exact substring to replace in the
/// original text. Created by parsing, consumed once by the executor.
#[derive(Debug, Clone)]
pub struct ParsedDirective {
    pub kind: DirectiveKind,
    /// Ordered key=value pairs, raw strings.
    pub params: Vec<(String, String)>,
    pub span: Range<usize>,
}

impl ParsedDirective {
    /// First value for a key, trimmed, if present and non-empty.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }
}

fn named_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([A-Z][A-Z0-9_]*)(?:\s*:\s*([^\]\n]*))?\]").expect("named directive regex")
    })
}

fn index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[INDEX\s*=\s*(\d+)\]").expect("index directive regex"))
}

/// Parse comma-separated `key=value` pairs. Values are raw strings;
/// pairs without `=` are dropped as malformed.
pub fn parse_params(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = k.trim();
            if k.is_empty() {
                return None;
            }
            Some((k.to_string(), v.trim().to_string()))
        })
        .collect()
}

/// Extract all named directives, in order of appearance.
///
/// `[INDEX=N]` is not a named directive (its `=` syntax does not match);
/// see [`parse_index_directives`].
pub fn parse_named_directives(text: &str) -> Vec<ParsedDirective> {
    named_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str();
            let params = caps
                .get(2)
                .map(|m| parse_params(m.as_str()))
                .unwrap_or_default();
            Some(ParsedDirective {
                kind: DirectiveKind::from_name(name),
                params,
                span: whole.range(),
            })
        })
        .collect()
}

/// Extract all `[INDEX=N]` directives from the *raw* model text.
///
/// Parsed before any named directive is stripped so another handler's
/// output cannot swallow an index directive that follows it.
pub fn parse_index_directives(text: &str) -> Vec<ParsedDirective> {
    index_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let n: u32 = caps.get(1)?.as_str().parse().ok()?;
            Some(ParsedDirective {
                kind: DirectiveKind::Canned(n),
                params: Vec::new(),
                span: whole.range(),
            })
        })
        .collect()
}

/// Typed classification of model output, replacing string sniffing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    /// Plain prose, nothing to execute.
    Prose,
    /// Contains a literal terminal signal — the conversation is done.
    Terminal { marker: String },
    /// Contains at least one executable directive.
    ContainsDirectives,
}

/// Classify raw model output. Terminal wins over directives: a response
/// that both books and signals completion still finishes the conversation.
pub fn classify_response(text: &str, terminal_markers: &[String]) -> ResponseKind {
    if let Some(marker) = terminal_markers
        .iter()
        .find(|m| !m.trim().is_empty() && text.contains(m.as_str()))
    {
        return ResponseKind::Terminal {
            marker: marker.clone(),
        };
    }
    if !parse_index_directives(text).is_empty() || !parse_named_directives(text).is_empty() {
        return ResponseKind::ContainsDirectives;
    }
    ResponseKind::Prose
}

/// Remove literal terminal markers from the delivered text.
pub fn strip_terminal_markers(text: &str, terminal_markers: &[String]) -> String {
    let mut out = text.to_string();
    for marker in terminal_markers {
        if !marker.trim().is_empty() {
            out = out.replace(marker.as_str(), "");
        }
    }
    out
}

/// Collapse whitespace left behind by removed directives.
///
/// Runs of spaces/tabs become one space and line edges are trimmed, but
/// line breaks survive so list-style handler output keeps one item per
/// line. Runs of blank lines collapse to a single blank line.
pub fn collapse_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let normalized = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() && lines.last().is_some_and(|l: &String| l.is_empty()) {
            continue;
        }
        lines.push(normalized);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    lines.join("\n")
}

/// Safety net: strip any directive-shaped token still present after
/// execution, so bracket syntax can never leak through an unhandled path.
pub fn strip_residual_directives(text: &str) -> String {
    let without_index = index_re().replace_all(text, "");
    named_re().replace_all(&without_index, "").into_owned()
}
