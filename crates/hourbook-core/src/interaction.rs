//! Typed interactions, decoded once at the platform boundary.
//!
//! The platform delivers loosely-typed payloads (string custom ids, string
//! select values, string command options). [`RawInteraction`] mirrors that
//! wire shape; [`RawInteraction::decode`] turns it into an [`Interaction`]
//! whose payload is a closed sum, so nothing past the boundary re-parses
//! strings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{HourbookError, Result};
use crate::types::{
    Category, ChannelId, Message, MessageId, MessageRef, Modal, OutgoingMessage, ReportDimension,
    UserId,
};

/// Date format used by every command option.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// A user interaction delivered by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    /// Platform interaction id, used to respond.
    pub id: String,
    pub user: UserId,
    pub channel: ChannelId,
    /// Message the component belongs to, when there is one.
    pub message: Option<MessageRef>,
    pub kind: InteractionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionKind {
    Command(Command),
    Button { custom_id: String },
    StringSelect { custom_id: String, values: Vec<String> },
    UserSelect { custom_id: String, users: Vec<UserId> },
    ModalSubmit { custom_id: String, fields: BTreeMap<String, String> },
}

impl Interaction {
    /// Custom id of the component or modal, if this is not a command.
    pub fn custom_id(&self) -> Option<&str> {
        match &self.kind {
            InteractionKind::Command(_) => None,
            InteractionKind::Button { custom_id }
            | InteractionKind::StringSelect { custom_id, .. }
            | InteractionKind::UserSelect { custom_id, .. }
            | InteractionKind::ModalSubmit { custom_id, .. } => Some(custom_id),
        }
    }
}

/// Application commands understood by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open the announcement modal.
    Event,
    /// Record an event for a known gardener without a sign-up roll.
    Manual { gardener: UserId },
    Edit {
        message: MessageId,
        name: Option<String>,
        time: Option<i64>,
        hours: Option<u32>,
    },
    RollGardener { target: Message },
    CancelSignup { target: Message },
    Report {
        start: NaiveDate,
        end: Option<NaiveDate>,
        dimension: ReportDimension,
    },
    /// Leaderboard for one game (`None` is global), or one member's rank in it.
    Show {
        game: Option<Category>,
        user: Option<UserId>,
    },
    /// Credit prediction points to each listed member on one game's board.
    AddScore {
        game: Category,
        members: Vec<UserId>,
        points: i64,
    },
    /// Clear one game's board (`None` clears every board) after confirmation.
    ResetScores { game: Option<Category> },
}

/// How a handler answers an interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionResponse {
    /// New reply in the interaction's channel.
    Message(OutgoingMessage),
    /// Replace the message the component is attached to.
    Update(OutgoingMessage),
    Modal(Modal),
}

// ─── Wire shape ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInteraction {
    pub id: String,
    pub user: u64,
    pub channel: u64,
    #[serde(default)]
    pub message: Option<MessageRef>,
    #[serde(flatten)]
    pub data: RawData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawData {
    Command {
        name: String,
        #[serde(default)]
        options: BTreeMap<String, String>,
        #[serde(default)]
        target: Option<Message>,
    },
    Button {
        custom_id: String,
    },
    StringSelect {
        custom_id: String,
        values: Vec<String>,
    },
    UserSelect {
        custom_id: String,
        values: Vec<String>,
    },
    ModalSubmit {
        custom_id: String,
        #[serde(default)]
        fields: BTreeMap<String, String>,
    },
}

impl RawInteraction {
    pub fn decode(self) -> Result<Interaction> {
        let kind = match self.data {
            RawData::Command {
                name,
                options,
                target,
            } => InteractionKind::Command(decode_command(&name, &options, target)?),
            RawData::Button { custom_id } => InteractionKind::Button { custom_id },
            RawData::StringSelect { custom_id, values } => {
                InteractionKind::StringSelect { custom_id, values }
            }
            RawData::UserSelect { custom_id, values } => {
                let users = values
                    .iter()
                    .map(|v| parse_user_id("values", v))
                    .collect::<Result<Vec<_>>>()?;
                InteractionKind::UserSelect { custom_id, users }
            }
            RawData::ModalSubmit { custom_id, fields } => {
                InteractionKind::ModalSubmit { custom_id, fields }
            }
        };
        Ok(Interaction {
            id: self.id,
            user: UserId(self.user),
            channel: ChannelId(self.channel),
            message: self.message,
            kind,
        })
    }
}

fn decode_command(
    name: &str,
    options: &BTreeMap<String, String>,
    target: Option<Message>,
) -> Result<Command> {
    let opt = |key: &str| options.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
    let required = |key: &'static str| {
        opt(key).ok_or_else(|| HourbookError::parse(key, "option is required"))
    };

    match name.trim().to_lowercase().as_str() {
        "event" => Ok(Command::Event),
        "manual" => Ok(Command::Manual {
            gardener: parse_user_id("gardener", required("gardener")?)?,
        }),
        "edit" => Ok(Command::Edit {
            message: MessageId(
                required("message_id")?
                    .parse()
                    .map_err(|e| HourbookError::parse("message_id", format!("{e}")))?,
            ),
            name: opt("new_name").map(String::from),
            time: opt("new_time")
                .map(|v| {
                    v.parse::<i64>()
                        .map_err(|e| HourbookError::parse("new_time", format!("{e}")))
                })
                .transpose()?,
            hours: opt("new_duration")
                .map(|v| {
                    v.parse::<u32>()
                        .map_err(|e| HourbookError::parse("new_duration", format!("{e}")))
                })
                .transpose()?,
        }),
        "roll gardener" => Ok(Command::RollGardener {
            target: target.ok_or_else(|| HourbookError::parse("target", "no target message"))?,
        }),
        "cancel signup" => Ok(Command::CancelSignup {
            target: target.ok_or_else(|| HourbookError::parse("target", "no target message"))?,
        }),
        "report" => Ok(Command::Report {
            start: parse_date("start_date", required("start_date")?)?,
            end: opt("end_date")
                .map(|v| parse_date("end_date", v))
                .transpose()?,
            dimension: required("report_option")?.parse()?,
        }),
        "show" => Ok(Command::Show {
            game: parse_board(opt("game"))?,
            user: opt("user").map(|v| parse_user_id("user", v)).transpose()?,
        }),
        "add" => Ok(Command::AddScore {
            game: required("game")?.parse()?,
            members: parse_members(required("members")?)?,
            points: match opt("points") {
                None => 1,
                Some(v) => match v.parse::<i64>() {
                    Ok(0) => return Err(HourbookError::parse("points", "must not be zero")),
                    Ok(points) => points,
                    Err(e) => return Err(HourbookError::parse("points", format!("{e}"))),
                },
            },
        }),
        "reset" => Ok(Command::ResetScores {
            game: parse_board(opt("game"))?,
        }),
        other => Err(HourbookError::parse("command", format!("unknown command '{other}'"))),
    }
}

/// Parse a `DD-MM-YYYY` date option.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        HourbookError::parse(field, format!("'{value}' is not a DD-MM-YYYY date"))
    })
}

/// A board option: a category, or `None` for absent / `global`.
fn parse_board(value: Option<&str>) -> Result<Option<Category>> {
    match value {
        None => Ok(None),
        Some(g) if g.eq_ignore_ascii_case("global") => Ok(None),
        Some(g) => Ok(Some(g.parse()?)),
    }
}

/// Member ids or mentions separated by commas or whitespace.
fn parse_members(value: &str) -> Result<Vec<UserId>> {
    let members = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|v| !v.is_empty())
        .map(|v| parse_user_id("members", v))
        .collect::<Result<Vec<_>>>()?;
    if members.is_empty() {
        return Err(HourbookError::parse("members", "no members given"));
    }
    Ok(members)
}

fn parse_user_id(field: &'static str, value: &str) -> Result<UserId> {
    let value = value.trim();
    let bare = value
        .strip_prefix("<@")
        .and_then(|v| v.strip_suffix('>'))
        .map(|v| v.trim_start_matches('!'))
        .unwrap_or(value);
    bare.replace('_', "")
        .parse::<u64>()
        .map(UserId)
        .map_err(|_| HourbookError::parse(field, format!("'{value}' is not a member id")))
}
