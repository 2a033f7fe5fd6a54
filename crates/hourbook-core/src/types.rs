//! Event data model and platform message shapes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{HourbookError, Result};

/// Platform identity of a member (or of the bot itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl UserId {
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

/// Where a message lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel: ChannelId,
    pub id: MessageId,
}

impl MessageRef {
    pub fn new(channel: u64, id: u64) -> Self {
        Self {
            channel: ChannelId(channel),
            id: MessageId(id),
        }
    }
}

// ─── Event model ──────────────────────────────────────

/// Event category. Declaration order is the codec's decode priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Dota,
    #[serde(rename = "CS")]
    Cs,
    #[serde(rename = "MLBB")]
    Mlbb,
    #[serde(rename = "HoK")]
    Hok,
    Other,
}

impl Category {
    /// All categories in decode priority order.
    pub const ALL: [Category; 5] = [
        Category::Dota,
        Category::Cs,
        Category::Mlbb,
        Category::Hok,
        Category::Other,
    ];

    /// Token written into (and searched for in) artifact text.
    pub fn token(&self) -> &'static str {
        match self {
            Category::Dota => "Dota",
            Category::Cs => "CS",
            Category::Mlbb => "MLBB",
            Category::Hok => "HoK",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Category {
    type Err = HourbookError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.token().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HourbookError::parse("category", format!("unknown category '{s}'")))
    }
}

/// One sign-up event as announced in an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub category: Category,
    pub name: String,
    /// Unix seconds.
    pub scheduled_time: i64,
    pub duration_hours: u32,
}

impl EventRecord {
    pub fn new(category: Category, name: &str, scheduled_time: i64, duration_hours: u32) -> Self {
        Self {
            category,
            name: name.trim().to_string(),
            scheduled_time,
            duration_hours,
        }
    }
}

/// A persisted assignment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: i64,
    pub record: EventRecord,
    pub assignee: UserId,
    pub artifact: Option<MessageId>,
}

/// How a persisted event is located for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKey {
    /// The row written for this announcement.
    Artifact(MessageId),
    /// One row with this exact record and no announcement attached.
    Record(EventRecord),
}

/// Half-open unix-seconds range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: i64,
    pub end: i64,
}

impl DateRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: i64) -> bool {
        t >= self.start && t < self.end
    }
}

/// One row of a ranked prediction scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedScore {
    pub position: u32,
    pub member: UserId,
    pub score: i64,
}

/// Report partitioning dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportDimension {
    ByIdentity,
    ByCategory,
}

impl FromStr for ReportDimension {
    type Err = HourbookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gardener" | "identity" => Ok(Self::ByIdentity),
            "game" | "category" => Ok(Self::ByCategory),
            other => Err(HourbookError::parse(
                "report_option",
                format!("expected 'gardener' or 'game', got '{other}'"),
            )),
        }
    }
}

// ─── Platform messages ──────────────────────────────────────

/// A reaction marker and who applied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub marker: String,
    pub count: u32,
}

/// A message as read back from the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub reference: MessageRef,
    pub author: UserId,
    pub content: String,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl Message {
    /// Whether any reaction with this marker is present.
    pub fn has_marker(&self, marker: &str) -> bool {
        self.reactions
            .iter()
            .any(|r| marker_name(&r.marker) == marker_name(marker) && r.count > 0)
    }
}

/// Markers may be configured as `name:id`; comparison uses the name part.
pub fn marker_name(marker: &str) -> &str {
    marker.split(':').next().unwrap_or(marker)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

/// Interactive component attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Component {
    Button {
        custom_id: String,
        label: String,
        style: ButtonStyle,
        disabled: bool,
    },
    /// Options whose values are member identities.
    UserSelect {
        custom_id: String,
        placeholder: String,
        options: Vec<(UserId, String)>,
    },
    StringSelect {
        custom_id: String,
        placeholder: String,
        options: Vec<SelectOption>,
    },
}

impl Component {
    pub fn button(custom_id: impl Into<String>, label: &str, style: ButtonStyle) -> Self {
        Component::Button {
            custom_id: custom_id.into(),
            label: label.to_string(),
            style,
            disabled: false,
        }
    }

    pub fn custom_id(&self) -> &str {
        match self {
            Component::Button { custom_id, .. }
            | Component::UserSelect { custom_id, .. }
            | Component::StringSelect { custom_id, .. } => custom_id,
        }
    }
}

/// Content to create or replace a message with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(default)]
    pub components: Vec<Component>,
    /// Visible to the requester only.
    #[serde(default)]
    pub ephemeral: bool,
    /// Role ids allowed to be pinged by this message.
    #[serde(default)]
    pub mention_roles: Vec<u64>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
            ..Default::default()
        }
    }

    pub fn with_components(mut self, components: Vec<Component>) -> Self {
        self.components = components;
        self
    }
}

/// A text input or select inside a modal form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModalField {
    Text {
        custom_id: String,
        label: String,
        placeholder: String,
        required: bool,
    },
    Select {
        custom_id: String,
        label: String,
        options: Vec<SelectOption>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modal {
    pub custom_id: String,
    pub title: String,
    pub fields: Vec<ModalField>,
}

/// Where a platform scheduled event takes place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    Voice(ChannelId),
    Stage(ChannelId),
    External(String),
}

/// A platform-level scheduled event mirroring an announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub name: String,
    pub start_time: i64,
    pub venue: Venue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_priority_order() {
        let tokens: Vec<_> = Category::ALL.iter().map(|c| c.token()).collect();
        assert_eq!(tokens, vec!["Dota", "CS", "MLBB", "HoK", "Other"]);
        assert!(Category::Dota < Category::Other);
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("cs".parse::<Category>().unwrap(), Category::Cs);
        assert_eq!("HoK".parse::<Category>().unwrap(), Category::Hok);
        assert!("Valorant".parse::<Category>().is_err());
    }

    #[test]
    fn test_date_range_half_open() {
        let range = DateRange::new(100, 200);
        assert!(range.contains(100));
        assert!(range.contains(199));
        assert!(!range.contains(200));
    }

    #[test]
    fn test_has_marker_matches_name_part() {
        let msg = Message {
            reference: MessageRef::new(1, 2),
            author: UserId(9),
            content: String::new(),
            reactions: vec![Reaction {
                marker: "OGwecoo".into(),
                count: 1,
            }],
        };
        assert!(msg.has_marker("OGwecoo:787697278190223370"));
        assert!(!msg.has_marker("OGpeepoYes"));
    }

    #[test]
    fn test_report_dimension_from_str() {
        assert_eq!("gardener".parse::<ReportDimension>().unwrap(), ReportDimension::ByIdentity);
        assert_eq!("game".parse::<ReportDimension>().unwrap(), ReportDimension::ByCategory);
        assert!("team".parse::<ReportDimension>().is_err());
    }
}
