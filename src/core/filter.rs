//! Client-side filter chain for security events.
//!
//! [`SearchFilters`] holds the raw, caller-supplied criteria. [`FilterChain`]
//! is the parsed form: the free-text matcher is compiled once, the host,
//! severity and type criteria are lowercased once, and the date bounds are
//! parsed once, so matching an event does no per-event setup.
//!
//! Every criterion is optional; an absent or empty value passes everything.

use chrono::NaiveDateTime;
use regex::Regex;

use crate::core::event_record::SecurityEvent;
use crate::util::time::{parse_end_bound, parse_event_timestamp, parse_start_bound};

/// Raw search criteria as received from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SearchFilters {
    /// Free text, tried first as a regular expression.
    #[serde(default)]
    pub query: Option<String>,
    /// Case-insensitive hostname substring.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Inclusive `YYYY-MM-DD` lower bound.
    #[serde(default)]
    pub start_date: Option<String>,
    /// Inclusive `YYYY-MM-DD` upper bound (through 23:59:59).
    #[serde(default)]
    pub end_date: Option<String>,
    /// Case-insensitive exact severity.
    #[serde(default)]
    pub severity: Option<String>,
    /// Case-insensitive event-type substring.
    #[serde(default)]
    pub event_type: Option<String>,
}

impl SearchFilters {
    /// `true` if no criterion is set.
    pub fn is_empty(&self) -> bool {
        [
            &self.query,
            &self.hostname,
            &self.start_date,
            &self.end_date,
            &self.severity,
            &self.event_type,
        ]
        .into_iter()
        .all(|value| present(value).is_none())
    }
}

/// Free-text matcher.
///
/// A query that compiles as a regular expression is searched for (not fully
/// matched) in each field; anything else is matched as a literal substring.
#[derive(Debug, Clone)]
pub enum TextMatcher {
    Pattern(Regex),
    Literal(String),
}

impl TextMatcher {
    /// Compile `query`, falling back to literal matching on any regex error.
    pub fn compile(query: &str) -> Self {
        match Regex::new(query) {
            Ok(pattern) => Self::Pattern(pattern),
            Err(e) => {
                tracing::debug!("Query {:?} is not a valid pattern ({}), matching literally", query, e);
                Self::Literal(query.to_owned())
            }
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern(_))
    }

    fn matches_text(&self, text: &str) -> bool {
        match self {
            Self::Pattern(pattern) => pattern.is_match(text),
            Self::Literal(literal) => text.contains(literal.as_str()),
        }
    }

    /// `true` if any searchable field of `event` matches.
    pub fn matches(&self, event: &SecurityEvent) -> bool {
        event
            .searchable_fields()
            .iter()
            .any(|field| self.matches_text(field))
    }
}

/// Parsed, ready-to-apply form of [`SearchFilters`].
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    text: Option<TextMatcher>,
    hostname_lower: Option<String>,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    severity_lower: Option<String>,
    event_type_lower: Option<String>,
}

impl FilterChain {
    /// Parse `filters`. Unparsable dates disable their bound rather than
    /// failing.
    pub fn new(filters: &SearchFilters) -> Self {
        let start = present(&filters.start_date).and_then(|raw| {
            let bound = parse_start_bound(raw);
            if bound.is_none() {
                tracing::debug!("Ignoring unparsable start_date {:?}", raw);
            }
            bound
        });
        let end = present(&filters.end_date).and_then(|raw| {
            let bound = parse_end_bound(raw);
            if bound.is_none() {
                tracing::debug!("Ignoring unparsable end_date {:?}", raw);
            }
            bound
        });

        Self {
            text: present(&filters.query).map(TextMatcher::compile),
            hostname_lower: present(&filters.hostname).map(str::to_lowercase),
            start,
            end,
            severity_lower: present(&filters.severity).map(str::to_lowercase),
            event_type_lower: present(&filters.event_type).map(str::to_lowercase),
        }
    }

    /// The compiled free-text matcher, if a query was given.
    pub fn text_matcher(&self) -> Option<&TextMatcher> {
        self.text.as_ref()
    }

    /// Test whether the event passes **all** active criteria, in order:
    /// free text, hostname, date range, severity, event type.
    pub fn matches(&self, event: &SecurityEvent) -> bool {
        if let Some(text) = &self.text {
            if !text.matches(event) {
                return false;
            }
        }

        if let Some(hostname) = &self.hostname_lower {
            if !event.hostname.to_lowercase().contains(hostname.as_str()) {
                return false;
            }
        }

        if self.start.is_some() || self.end.is_some() {
            let at = parse_event_timestamp(&event.timestamp);
            if self.start.is_some_and(|start| at < start) {
                return false;
            }
            if self.end.is_some_and(|end| at > end) {
                return false;
            }
        }

        if let Some(severity) = &self.severity_lower {
            if event.severity.to_lowercase() != *severity {
                return false;
            }
        }

        if let Some(event_type) = &self.event_type_lower {
            if !event.event_type.to_lowercase().contains(event_type.as_str()) {
                return false;
            }
        }

        true
    }

    /// Keep only matching events, preserving order.
    pub fn apply(&self, mut events: Vec<SecurityEvent>) -> Vec<SecurityEvent> {
        events.retain(|event| self.matches(event));
        events
    }
}

/// A criterion counts only when present and non-empty.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
