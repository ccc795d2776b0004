//! Parsing of `dpkg-deb --info` reports.
//!
//! Only the handful of fields needed to render a package page are
//! interpreted; every other `Key: Value` line is kept verbatim.

use std::collections::HashMap;

use lazy_regex::{regex, regex_captures};
use tracing::warn;

use crate::error::ParseWarning;

/// Synthetic key holding the maintainer's name.
pub const MAINTAINER_NAME: &str = "MaintainerName";
/// Synthetic key holding the maintainer's email address.
pub const MAINTAINER_MAIL: &str = "MaintainerMail";
/// Key holding the one-line summary.
pub const DESCRIPTION: &str = "Description";
/// Synthetic key holding everything after the summary line.
pub const LONG_DESCRIPTION: &str = "LongDescription";

/// Fields parsed from a control report.
///
/// Keys keep the position of their first occurrence while the value is the
/// one from the last occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedControl {
    order: Vec<String>,
    index: HashMap<String, String>,
    warnings: Vec<ParseWarning>,
}

impl ParsedControl {
    /// Parse the output of `dpkg-deb --info`.
    pub fn parse(output: &str) -> Self {
        let mut parsed = Self::default();

        for line in output.split('\n') {
            if let Some((_, key, value)) =
                regex_captures!(r"^\s*([-_a-zA-Z0-9]+?):\s*(.+?)\s*$", line)
            {
                parsed.insert(key, value);
            }
        }

        if let Some(maintainer) = parsed.index.get("Maintainer").cloned() {
            match regex_captures!(r"^\s*(.+?)\s*<([^>]+?)>\s*$", &maintainer) {
                Some((_, name, mail)) => {
                    parsed.set(MAINTAINER_NAME, name);
                    parsed.set(MAINTAINER_MAIL, mail);
                }
                None => {
                    warn!("error parsing name and email: {}", maintainer);
                    parsed.warnings.push(ParseWarning::Maintainer(maintainer));
                }
            }
        }

        let description = regex!(r"(?ms)^\s*Description:\s*(.+?)$(.+?)\z");
        match description.captures(output) {
            Some(caps) => {
                parsed.set(DESCRIPTION, &caps[1]);
                parsed.set(LONG_DESCRIPTION, &caps[2]);
            }
            None => {
                warn!(
                    "error parsing long description from dpkg-deb --info output:\n[begin output]\n{}[end output]",
                    output
                );
                parsed.warnings.push(ParseWarning::Description);
            }
        }

        parsed
    }

    /// Record a field seen in the report.
    fn insert(&mut self, key: &str, value: &str) {
        if !self.index.contains_key(key) {
            self.order.push(key.to_string());
        }
        self.index.insert(key.to_string(), value.to_string());
    }

    /// Set a derived value without giving it a position.
    fn set(&mut self, key: &str, value: &str) {
        self.index.insert(key.to_string(), value.to_string());
    }

    /// Look up a value, including synthetic keys.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(String::as_str)
    }

    /// Keys in the order they first appeared.
    pub fn keys(&self) -> &[String] {
        &self.order
    }

    /// Field pairs in report order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.order
            .iter()
            .filter_map(move |key| self.get(key).map(|value| (key.as_str(), value)))
    }

    /// Number of distinct keys read from the report.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no field line matched.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Problems found while parsing.
    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn maintainer_name(&self) -> Option<&str> {
        self.get(MAINTAINER_NAME)
    }

    pub fn maintainer_email(&self) -> Option<&str> {
        self.get(MAINTAINER_MAIL)
    }

    /// One-line summary, empty if there is no description.
    pub fn summary(&self) -> &str {
        if self.get(LONG_DESCRIPTION).is_some() {
            self.get(DESCRIPTION).unwrap_or_default()
        } else {
            ""
        }
    }

    /// Raw long description block, empty if there is none.
    pub fn long_description(&self) -> &str {
        self.get(LONG_DESCRIPTION).unwrap_or_default()
    }

    /// Long description split into paragraphs.
    pub fn paragraphs(&self) -> Vec<String> {
        long_description_paragraphs(self.long_description())
    }

    pub fn package(&self) -> Option<&str> {
        self.get("Package")
    }

    pub fn version(&self) -> Option<&str> {
        self.get("Version")
    }

    pub fn section(&self) -> Option<&str> {
        self.get("Section")
    }

    pub fn homepage(&self) -> Option<&str> {
        self.get("Homepage")
    }
}

/// The commonly used fields of a package, pulled out of a [`ParsedControl`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebInfo {
    pub name: String,
    pub summary: String,
    pub description: String,
    pub section: String,
    pub version: String,
    pub homepage: String,
}

impl From<&ParsedControl> for DebInfo {
    fn from(parsed: &ParsedControl) -> Self {
        let owned = |value: Option<&str>| value.unwrap_or_default().to_string();
        Self {
            name: owned(parsed.package()),
            summary: parsed.summary().to_string(),
            description: parsed.long_description().to_string(),
            section: owned(parsed.section()),
            version: owned(parsed.version()),
            homepage: owned(parsed.homepage()),
        }
    }
}

/// Split a Debian long description into paragraphs.
///
/// A line holding only `.` separates paragraphs; the remaining lines of a
/// paragraph are trimmed and joined with single spaces. Blank lines are
/// ignored and paragraphs left empty are dropped, so consecutive `.` lines
/// never produce an empty paragraph.
pub fn long_description_paragraphs(input: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    for line in input.split('\n') {
        let trimmed = line.trim();
        if trimmed == "." {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else if !trimmed.is_empty() {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(trimmed);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    paragraphs
}
