//! Human-readable task identifiers.
//!
//! An identifier encodes the assignee's role prefix, the creation month, a
//! per-bucket sequence number and the two-digit year: `DGnov00125` is the first
//! designer task of November 2025. Buckets are computed in a fixed operational
//! UTC offset so tasks created around midnight never drift between months.

use crate::types::Role;
use chrono::{DateTime, Datelike, FixedOffset, Utc};
use regex_lite::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Lowercase month abbreviations, indexed by zero-based month.
pub const MONTH_ABBRS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]{2})([a-z]{3})(\d{3})(\d{2})$").expect("identifier pattern is valid")
});

/// Counter key: one sequence per role prefix and calendar month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub role_prefix: &'static str,
    pub year: i32,
    /// Zero-based month (0 = January).
    pub month: u32,
}

impl Bucket {
    /// Bucket for a task assigned to `role` created at `at_ms`, seen from `offset`.
    ///
    /// `None` when `at_ms` lies outside the representable calendar range.
    pub fn at(role: &Role, at_ms: i64, offset: FixedOffset) -> Option<Self> {
        let local = DateTime::<Utc>::from_timestamp_millis(at_ms)?.with_timezone(&offset);
        Some(Self {
            role_prefix: role.prefix(),
            year: local.year(),
            month: local.month0(),
        })
    }

    /// Format the identifier for the given sequence number in this bucket.
    pub fn identifier(&self, counter: u32) -> TaskIdentifier {
        TaskIdentifier {
            prefix: self.role_prefix.to_string(),
            month: MONTH_ABBRS[self.month as usize % 12].to_string(),
            counter,
            year: self.year.rem_euclid(100) as u32,
        }
    }
}

/// Parsed parts of an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskIdentifier {
    pub prefix: String,
    pub month: String,
    pub counter: u32,
    /// Two-digit year.
    pub year: u32,
}

impl fmt::Display for TaskIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{:03}{:02}",
            self.prefix, self.month, self.counter, self.year
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{input}' is not a task identifier (expected two letters, month, three digits, two-digit year)")]
pub struct IdentifierError {
    pub input: String,
}

/// Split an identifier back into its parts.
pub fn parse_identifier(input: &str) -> Result<TaskIdentifier, IdentifierError> {
    let caps = IDENTIFIER_RE.captures(input).ok_or_else(|| IdentifierError {
        input: input.to_string(),
    })?;
    let number = |i: usize| -> Result<u32, IdentifierError> {
        caps[i].parse().map_err(|_| IdentifierError {
            input: input.to_string(),
        })
    };
    Ok(TaskIdentifier {
        prefix: caps[1].to_string(),
        month: caps[2].to_string(),
        counter: number(3)?,
        year: number(4)?,
    })
}

/// Build a fixed offset from minutes east of UTC.
pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}
