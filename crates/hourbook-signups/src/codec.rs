//! Event artifact codec.
//!
//! An artifact carries three anchors that are both the human-readable
//! announcement and the machine-readable record:
//!
//! ```text
//! Event: Dota - OG vs Envy
//! Time: <t:1700000000:F> (<t:1700000000:R>)
//! Hours: 3 hours
//! ```
//!
//! This module is the only place that parses artifact text.

use hourbook_core::error::{HourbookError, Result};
use hourbook_core::types::{Category, EventRecord};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static NAME_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Event: \w+ - (.+?)(?:\n|$)").expect("Invalid name anchor regex")
});

static TIME_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<t:([^:>]+):F>").expect("Invalid time anchor regex"));

/// Both timestamp renderings (absolute and relative).
static ANY_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<t:[^:>]+:([FR])>").expect("Invalid timestamp regex"));

static HOURS_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Hours: ([0-9]+) hours").expect("Invalid hours anchor regex"));

/// Substrings an event name may not contain.
const RESERVED: [&str; 3] = ["Event: ", "<t:", "Hours: "];

/// Render the three anchor lines.
pub fn encode(record: &EventRecord) -> String {
    format!(
        "Event: {} - {}\nTime: <t:{t}:F> (<t:{t}:R>)\nHours: {} hours",
        record.category,
        record.name,
        record.duration_hours,
        t = record.scheduled_time,
    )
}

/// Parse an event back out of artifact text.
///
/// The category is the first token, in priority order, found on the
/// event line; a name mentioning a stronger category than its own is
/// therefore not representable (see [`validate`]).
pub fn decode(text: &str) -> Result<EventRecord> {
    let name_caps = NAME_ANCHOR
        .captures(text)
        .ok_or_else(|| HourbookError::parse("name", "event line not found"))?;
    let event_line = name_caps.get(0).map_or("", |m| m.as_str());
    let name = name_caps.get(1).map_or("", |m| m.as_str());

    let category = detect_category(event_line)
        .ok_or_else(|| HourbookError::parse("category", "no known category on the event line"))?;

    let time = TIME_ANCHOR
        .captures(text)
        .ok_or_else(|| HourbookError::parse("time", "timestamp not found"))?[1]
        .parse::<i64>()
        .map_err(|e| HourbookError::parse("time", format!("not a unix timestamp: {e}")))?;

    let hours = HOURS_ANCHOR
        .captures(text)
        .ok_or_else(|| HourbookError::parse("hours", "hours line not found"))?[1]
        .parse::<u32>()
        .map_err(|e| HourbookError::parse("hours", format!("not a whole number of hours: {e}")))?;

    Ok(EventRecord::new(category, name, time, hours))
}

/// Category of the artifact's event line, if it has one.
pub fn category_of(text: &str) -> Option<Category> {
    NAME_ANCHOR
        .find(text)
        .and_then(|line| detect_category(line.as_str()))
}

/// First category token present in `text`, in priority order.
pub fn detect_category(text: &str) -> Option<Category> {
    Category::ALL.into_iter().find(|c| text.contains(c.token()))
}

/// Reject records that would not decode back to themselves.
pub fn validate(record: &EventRecord) -> Result<()> {
    validate_name(&record.name, Some(record.category))
}

/// Name checks shared by creation and edits. `category` enables the
/// priority collision check.
pub fn validate_name(name: &str, category: Option<Category>) -> Result<()> {
    if name.trim().is_empty() {
        return Err(HourbookError::InvalidRecord("event name is empty".into()));
    }
    if name != name.trim() {
        return Err(HourbookError::InvalidRecord(
            "event name has surrounding whitespace".into(),
        ));
    }
    if name.chars().any(char::is_control) {
        return Err(HourbookError::InvalidRecord(
            "event name must be a single line".into(),
        ));
    }
    if let Some(reserved) = RESERVED.iter().find(|r| name.contains(*r)) {
        return Err(HourbookError::InvalidRecord(format!(
            "event name must not contain '{}'",
            reserved.trim()
        )));
    }
    if let Some(own) = category
        && let Some(stronger) = detect_category(name).filter(|c| *c < own)
    {
        return Err(HourbookError::InvalidRecord(format!(
            "a {own} event name must not mention {stronger}"
        )));
    }
    Ok(())
}

/// Replace the anchored name, returning the new text and the old name.
pub fn replace_name(text: &str, name: &str) -> Result<(String, String)> {
    let caps = NAME_ANCHOR
        .captures(text)
        .ok_or_else(|| HourbookError::parse("name", "event line not found"))?;
    let Some(old) = caps.get(1) else {
        return Err(HourbookError::parse("name", "event line not found"));
    };
    let mut out = String::with_capacity(text.len() + name.len());
    out.push_str(&text[..old.start()]);
    out.push_str(name);
    out.push_str(&text[old.end()..]);
    Ok((out, old.as_str().to_string()))
}

/// Replace both timestamp renderings, returning the new text and the old
/// absolute timestamp.
pub fn replace_time(text: &str, time: i64) -> Result<(String, String)> {
    let old = TIME_ANCHOR
        .captures(text)
        .ok_or_else(|| HourbookError::parse("time", "timestamp not found"))?[1]
        .to_string();
    let out = ANY_TIMESTAMP.replace_all(text, |caps: &Captures| format!("<t:{time}:{}>", &caps[1]));
    Ok((out.into_owned(), old))
}

/// Replace the hours line, returning the new text and the old value.
pub fn replace_hours(text: &str, hours: u32) -> Result<(String, String)> {
    let old = HOURS_ANCHOR
        .captures(text)
        .ok_or_else(|| HourbookError::parse("hours", "hours line not found"))?[1]
        .to_string();
    let out = HOURS_ANCHOR.replace(text, format!("Hours: {hours} hours").as_str());
    Ok((out.into_owned(), old))
}
