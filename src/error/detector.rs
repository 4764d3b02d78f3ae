//! Network failure detector
//!
//! This module provides the heuristics the normalizer falls back to when a
//! failure does not carry its own code. It recognizes connectivity and timeout
//! failures from I/O error kinds, elapsed `tokio` timers, and regex patterns
//! over the failure's message and its nested causes.

use std::error::Error as StdError;
use std::io;

use regex::Regex;

use super::raw::RawFailure;

/// The kind of network trouble a failure indicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkSignal {
    /// The operation ran out of time.
    Timeout,
    /// The peer could not be reached or dropped the connection.
    Connectivity,
}

/// A pattern for matching network failures in text.
#[derive(Debug)]
pub struct NetworkPattern {
    /// The compiled regex pattern.
    regex: Regex,
    /// The signal to report when this pattern matches.
    signal: NetworkSignal,
    /// A human-readable description of what this pattern detects.
    description: String,
}

impl NetworkPattern {
    /// Creates a new pattern.
    ///
    /// # Panics
    /// Panics if the regex pattern is invalid.
    pub fn new(pattern: &str, signal: NetworkSignal, description: impl Into<String>) -> Self {
        Self {
            regex: Regex::new(pattern).expect("Invalid regex pattern"),
            signal,
            description: description.into(),
        }
    }

    /// Creates a new pattern with a pre-compiled regex.
    pub fn with_regex(regex: Regex, signal: NetworkSignal, description: impl Into<String>) -> Self {
        Self {
            regex,
            signal,
            description: description.into(),
        }
    }

    /// Returns the signal reported on match.
    pub fn signal(&self) -> NetworkSignal {
        self.signal
    }

    /// Returns the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Checks if this pattern matches the given text.
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Classifies unstructured failures as network-style or not.
#[derive(Debug)]
pub struct NetworkDetector {
    /// Patterns in priority order.
    patterns: Vec<NetworkPattern>,
}

impl Default for NetworkDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkDetector {
    /// Creates a detector with the default patterns.
    pub fn new() -> Self {
        Self {
            patterns: Self::default_patterns(),
        }
    }

    /// Creates a detector with custom patterns.
    pub fn with_patterns(patterns: Vec<NetworkPattern>) -> Self {
        Self { patterns }
    }

    fn default_patterns() -> Vec<NetworkPattern> {
        vec![
            // Timeouts first: "connection timed out" is a timeout, not a reset
            NetworkPattern::new(
                r"(?i)\btime[sd]?[\s\-]?out\b",
                NetworkSignal::Timeout,
                "Timed out",
            ),
            NetworkPattern::new(
                r"(?i)deadline\s*(exceeded|expired)",
                NetworkSignal::Timeout,
                "Deadline exceeded",
            ),
            NetworkPattern::new(r"(?i)\bETIMEDOUT\b", NetworkSignal::Timeout, "ETIMEDOUT"),
            NetworkPattern::new(
                r"(?i)connection\s*(refused|reset|aborted|closed|lost)",
                NetworkSignal::Connectivity,
                "Connection error",
            ),
            NetworkPattern::new(
                r"(?i)\bE(CONNREFUSED|CONNRESET|CONNABORTED|NOTFOUND|HOSTUNREACH|NETUNREACH)\b",
                NetworkSignal::Connectivity,
                "Socket error code",
            ),
            NetworkPattern::new(
                r"(?i)network\s*(error|failure|unreachable|is\s+down)",
                NetworkSignal::Connectivity,
                "Network error",
            ),
            NetworkPattern::new(
                r"(?i)failed\s+to\s+fetch|fetch\s+failed",
                NetworkSignal::Connectivity,
                "Fetch failed",
            ),
            NetworkPattern::new(
                r"(?i)\b(offline|no\s+internet|dns\s+(error|failure|lookup))\b",
                NetworkSignal::Connectivity,
                "Offline",
            ),
        ]
    }

    /// Adds a custom pattern, checked after the existing ones.
    pub fn add_pattern(&mut self, pattern: NetworkPattern) {
        self.patterns.push(pattern);
    }

    /// Returns the number of patterns configured.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Classifies a raw failure.
    ///
    /// Typed signals (I/O error kinds, elapsed timers) anywhere in the source
    /// chain win over text patterns. Returns `None` for anything that does not
    /// look like a network failure.
    pub fn detect(&self, failure: &RawFailure) -> Option<NetworkSignal> {
        if let Some(signal) = Self::typed_signal(failure) {
            return Some(signal);
        }
        failure
            .texts()
            .iter()
            .find_map(|text| self.detect_text(text))
    }

    /// Classifies a piece of text against the configured patterns.
    pub fn detect_text(&self, text: &str) -> Option<NetworkSignal> {
        self.patterns
            .iter()
            .find(|pattern| pattern.matches(text))
            .map(|pattern| pattern.signal)
    }

    fn typed_signal(failure: &RawFailure) -> Option<NetworkSignal> {
        let root: &(dyn StdError + 'static) = match failure {
            RawFailure::Error(error) => &**error,
            RawFailure::Coded(coded) => coded,
            _ => return None,
        };
        let mut current = Some(root);
        while let Some(err) = current {
            if err.is::<tokio::time::error::Elapsed>() {
                return Some(NetworkSignal::Timeout);
            }
            if let Some(io_error) = err.downcast_ref::<io::Error>() {
                if let Some(signal) = io_kind_signal(io_error.kind()) {
                    return Some(signal);
                }
            }
            current = err.source();
        }
        None
    }
}

fn io_kind_signal(kind: io::ErrorKind) -> Option<NetworkSignal> {
    match kind {
        io::ErrorKind::TimedOut => Some(NetworkSignal::Timeout),
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::AddrNotAvailable => Some(NetworkSignal::Connectivity),
        _ => None,
    }
}
